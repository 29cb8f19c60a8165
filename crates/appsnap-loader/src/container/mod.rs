//! Native executable containers
//!
//! A snapshot can ride inside a host executable in one of two ways:
//! - **Section**: a dedicated, well-known section holds the payload
//! - **Appended**: the payload follows the last byte the container's own
//!   tables describe, starting at the next [`APP_SNAPSHOT_PAGE_SIZE`]
//!   boundary and running to end-of-file
//!
//! Each format module scans its header tables into a [`ContainerScan`];
//! [`locate_payload`] turns that into a [`PayloadLocation`]. The parsers are
//! plain byte readers and work on every host.

pub mod elf;
pub mod macho;
pub mod pe;

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

use crate::bytes::round_up;
use crate::error::{Result, SnapshotError};
use crate::layout::APP_SNAPSHOT_PAGE_SIZE;

/// Bytes a probe reads from the front of a file.
const PROBE_LEN: usize = 64;

/// Container format of a native executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    MachO,
    Pe,
    Elf,
}

impl ContainerFormat {
    /// The format executables use on the host this crate was built for.
    pub fn host() -> ContainerFormat {
        if cfg!(target_vendor = "apple") {
            ContainerFormat::MachO
        } else if cfg!(windows) {
            ContainerFormat::Pe
        } else {
            ContainerFormat::Elf
        }
    }

    /// Name of the section a payload may be embedded in.
    pub fn snapshot_section_name(self) -> &'static str {
        match self {
            ContainerFormat::MachO => macho::SNAPSHOT_SECTION_NAME,
            ContainerFormat::Pe => pe::SNAPSHOT_SECTION_NAME,
            ContainerFormat::Elf => elf::SNAPSHOT_SECTION_NAME,
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerFormat::MachO => "Mach-O",
            ContainerFormat::Pe => "PE",
            ContainerFormat::Elf => "ELF",
        };
        f.write_str(name)
    }
}

/// How a payload is embedded in its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embedding {
    Appended,
    Section,
}

/// What a format scanner learned from the container's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContainerScan {
    /// One past the last byte described by any header, table, or section
    pub end: u64,
    /// `(file offset, size)` of the snapshot section, if present
    pub section: Option<(u64, u64)>,
}

impl ContainerScan {
    pub(crate) fn cover(&mut self, offset: u64, size: u64) {
        if let Some(end) = offset.checked_add(size) {
            self.end = self.end.max(end);
        }
    }
}

/// Where the payload sits inside its container file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLocation {
    pub format: ContainerFormat,
    pub embedding: Embedding,
    pub offset: u64,
    pub length: u64,
}

/// Recognize a container from the first bytes of a file.
///
/// PE files need the DOS stub's `e_lfanew` target too, so `header` should
/// cover at least [`PROBE_LEN`] bytes; a PE whose signature lies further out
/// is confirmed by [`probe_file`].
pub fn sniff(header: &[u8]) -> Option<ContainerFormat> {
    if macho::is_macho(header) {
        Some(ContainerFormat::MachO)
    } else if elf::is_elf(header) {
        Some(ContainerFormat::Elf)
    } else if pe::has_dos_stub(header) {
        Some(ContainerFormat::Pe)
    } else {
        None
    }
}

/// Open `path` read-only and report its container format.
///
/// Fails closed: any I/O error reads as "not a container".
pub fn probe_file(path: &Path) -> Option<ContainerFormat> {
    let mut file = File::open(path).ok()?;
    probe(&mut file)
}

/// [`probe_file`] over an already open file, read from the start.
pub(crate) fn probe(file: &mut File) -> Option<ContainerFormat> {
    let mut header = Vec::with_capacity(PROBE_LEN);
    file.seek(SeekFrom::Start(0)).ok()?;
    (&mut *file).take(PROBE_LEN as u64).read_to_end(&mut header).ok()?;

    match sniff(&header)? {
        ContainerFormat::Pe => pe::has_pe_signature(file, &header).then_some(ContainerFormat::Pe),
        other => Some(other),
    }
}

/// Find the payload inside a container of the given format.
pub fn locate_payload(path: &Path, file: &mut File, format: ContainerFormat) -> Result<PayloadLocation> {
    let file_len = file.metadata()?.len();
    let scan = scan(file, file_len, format)?;
    debug!(
        "{} container: tables end at {}, file is {} bytes, section {:?}",
        format, scan.end, file_len, scan.section
    );
    resolve(path, format, scan, file_len)
}

/// Run the scanner for `format` over the whole file.
pub(crate) fn scan(file: &mut File, file_len: u64, format: ContainerFormat) -> Result<ContainerScan> {
    match format {
        ContainerFormat::MachO => macho::scan(file, file_len),
        ContainerFormat::Pe => pe::scan(file, file_len),
        ContainerFormat::Elf => elf::scan(file, file_len),
    }
}

fn resolve(
    path: &Path,
    format: ContainerFormat,
    scan: ContainerScan,
    file_len: u64,
) -> Result<PayloadLocation> {
    if let Some((offset, length)) = scan.section {
        return Ok(PayloadLocation {
            format,
            embedding: Embedding::Section,
            offset,
            length,
        });
    }

    let offset = round_up(scan.end, APP_SNAPSHOT_PAGE_SIZE)
        .ok_or_else(|| SnapshotError::format("container", "section table end overflows"))?;
    if offset >= file_len {
        return Err(SnapshotError::NoPayload {
            path: path.to_path_buf(),
        });
    }
    Ok(PayloadLocation {
        format,
        embedding: Embedding::Appended,
        offset,
        length: file_len - offset,
    })
}

/// Read `len` bytes at `offset`, which must lie inside the file.
pub(crate) fn read_range(
    file: &mut File,
    file_len: u64,
    offset: u64,
    len: u64,
    what: &'static str,
) -> Result<Vec<u8>> {
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= file_len)
        .ok_or_else(|| {
            SnapshotError::format(
                what,
                format!("{} bytes at offset {} exceed file length {}", len, offset, file_len),
            )
        })?;
    debug_assert!(end <= file_len);

    let mut buf = vec![0u8; len as usize];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Validate a section's file range against the file length.
pub(crate) fn checked_section(
    what: &'static str,
    offset: u64,
    size: u64,
    file_len: u64,
) -> Result<(u64, u64)> {
    match offset.checked_add(size) {
        Some(end) if end <= file_len && size > 0 => Ok((offset, size)),
        _ => Err(SnapshotError::format(
            what,
            format!(
                "snapshot section ({} bytes at {}) lies outside the {}-byte file",
                size, offset, file_len
            ),
        )),
    }
}
