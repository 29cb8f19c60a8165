//! Loader error types.

use std::path::PathBuf;

/// Result type alias for snapshot loading and writing.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Broad class of a [`SnapshotError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Cannot open, read, or map the file
    Io,
    /// Container header unrecognized or inconsistent
    Format,
    /// No recognized magic number
    Classification,
    /// Instruction region misaligned
    Alignment,
    /// Payload shorter than its header declares
    Truncation,
    /// Container carries no payload
    NoPayload,
}

/// Errors that can occur while locating, classifying, or mapping a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Container or payload header is malformed
    #[error("malformed {what}: {reason}")]
    Format { what: &'static str, reason: String },

    /// Payload prefix matches no known magic number
    #[error("unrecognized snapshot magic {prefix:02x?}")]
    Classification { prefix: Vec<u8> },

    /// Instruction region does not start on a code-alignment boundary
    #[error("{region} starts at {address:#x}, not aligned to {alignment} bytes")]
    Alignment {
        region: &'static str,
        address: usize,
        alignment: usize,
    },

    /// A region or header extends past the end of the payload
    #[error("{what} needs {needed} bytes but only {available} are present")]
    Truncation {
        what: &'static str,
        needed: u64,
        available: u64,
    },

    /// The container has no appended or embedded payload
    #[error("no app snapshot found in {}", path.display())]
    NoPayload { path: PathBuf },
}

impl SnapshotError {
    pub(crate) fn format(what: &'static str, reason: impl Into<String>) -> Self {
        SnapshotError::Format {
            what,
            reason: reason.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SnapshotError::Io(_) => ErrorKind::Io,
            SnapshotError::Format { .. } => ErrorKind::Format,
            SnapshotError::Classification { .. } => ErrorKind::Classification,
            SnapshotError::Alignment { .. } => ErrorKind::Alignment,
            SnapshotError::Truncation { .. } => ErrorKind::Truncation,
            SnapshotError::NoPayload { .. } => ErrorKind::NoPayload,
        }
    }
}
