//! Kernel lists
//!
//! A kernel list is a text file starting with `#@dill` followed by one
//! Kernel file path per line. Relative paths resolve against the directory
//! holding the list. Concatenated Kernel files form a valid Kernel program,
//! so resolving a list yields an ordinary in-memory Kernel handle.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::app_snapshot::AppSnapshot;
use crate::error::{Result, SnapshotError};
use crate::loader::read_app_snapshot_from_bytes;
use crate::magic::MagicNumber;

/// Paths named by a kernel list, in order.
pub fn parse_kernel_list(bytes: &[u8], base_dir: &Path) -> Result<Vec<PathBuf>> {
    if MagicNumber::sniff(bytes) != MagicNumber::KernelList {
        return Err(SnapshotError::Classification {
            prefix: bytes.iter().take(8).copied().collect(),
        });
    }
    let text = std::str::from_utf8(&bytes[MagicNumber::KernelList.prefix_len()..])
        .map_err(|e| SnapshotError::format("kernel list", e.to_string()))?;

    let paths: Vec<PathBuf> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| base_dir.join(line))
        .collect();
    if paths.is_empty() {
        return Err(SnapshotError::format("kernel list", "names no kernel files"));
    }
    Ok(paths)
}

/// Read a kernel list and concatenate the Kernel files it names.
pub fn read_kernel_list(path: &Path) -> Result<AppSnapshot> {
    let list = fs::read(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut program = Vec::new();
    for entry in parse_kernel_list(&list, base_dir)? {
        let bytes = fs::read(&entry)?;
        if MagicNumber::sniff(&bytes) != MagicNumber::Kernel {
            return Err(SnapshotError::format(
                "kernel list",
                format!("{} is not a Kernel file", entry.display()),
            ));
        }
        debug!("kernel list entry {} ({} bytes)", entry.display(), bytes.len());
        program.extend_from_slice(&bytes);
    }
    read_app_snapshot_from_bytes(&program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_resolves_relative_paths() {
        let paths = parse_kernel_list(b"#@dill\na.dill\n\n  /abs/b.dill \n", Path::new("/lists")).unwrap();
        assert_eq!(
            paths,
            vec![PathBuf::from("/lists/a.dill"), PathBuf::from("/abs/b.dill")]
        );
    }

    #[test]
    fn test_parse_rejects_empty_and_foreign() {
        assert_eq!(
            parse_kernel_list(b"#@dill\n\n", Path::new(".")).unwrap_err().kind(),
            ErrorKind::Format
        );
        assert_eq!(
            parse_kernel_list(b"a.dill\n", Path::new(".")).unwrap_err().kind(),
            ErrorKind::Classification
        );
    }

    #[test]
    fn test_read_concatenates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.dill"), [0x90, 0xab, 0xcd, 0xef, 1, 2]).unwrap();
        fs::write(dir.path().join("b.dill"), [0x90, 0xab, 0xcd, 0xef, 3]).unwrap();
        let list = dir.path().join("app.dills");
        fs::write(&list, "#@dill\na.dill\nb.dill\n").unwrap();

        let snapshot = read_kernel_list(&list).unwrap();
        assert!(snapshot.is_kernel());
        let buffers = snapshot.set_buffers();
        assert_eq!(
            buffers.as_slice(crate::layout::Region::IsolateData),
            Some(&[1, 2, 0x90, 0xab, 0xcd, 0xef, 3][..])
        );
    }

    #[test]
    fn test_read_rejects_non_kernel_entry() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.dill"), b"plain text").unwrap();
        let list = dir.path().join("app.dills");
        fs::write(&list, "#@dill\na.dill\n").unwrap();
        assert_eq!(read_kernel_list(&list).unwrap_err().kind(), ErrorKind::Format);
    }
}
