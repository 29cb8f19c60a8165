//! PE (Portable Executable) container scanning

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use super::{checked_section, read_range, ContainerScan};
use crate::bytes::{le_u16, le_u32, padded_name};
use crate::error::{Result, SnapshotError};

/// Section that may hold an embedded snapshot.
pub const SNAPSHOT_SECTION_NAME: &str = ".appsnap";

const DOS_MAGIC: &[u8; 2] = b"MZ";
const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
const E_LFANEW_OFFSET: usize = 0x3c;
const COFF_HEADER_SIZE: u64 = 20;
const SECTION_HEADER_SIZE: u64 = 40;
const COFF_SYMBOL_SIZE: u64 = 18;

const PE32_MAGIC: u16 = 0x10b;
const PE32_PLUS_MAGIC: u16 = 0x20b;
/// Index of the certificate table in the data directories. Its "address"
/// is a file offset, and signing tools append it after the last section.
const SECURITY_DIRECTORY: u64 = 4;

/// Whether `header` starts with a DOS stub pointing somewhere plausible.
pub fn has_dos_stub(header: &[u8]) -> bool {
    header.starts_with(DOS_MAGIC) && le_u32(header, E_LFANEW_OFFSET).is_some()
}

/// Confirm the `PE\0\0` signature at `e_lfanew`.
pub(crate) fn has_pe_signature(file: &mut File, header: &[u8]) -> bool {
    let Some(e_lfanew) = le_u32(header, E_LFANEW_OFFSET) else {
        return false;
    };
    let mut signature = [0u8; 4];
    file.seek(SeekFrom::Start(e_lfanew as u64)).is_ok()
        && file.read_exact(&mut signature).is_ok()
        && &signature == PE_SIGNATURE
}

/// Walk the section table of a PE image.
pub fn scan(file: &mut File, file_len: u64) -> Result<ContainerScan> {
    let dos = read_range(file, file_len, 0, 64, "PE DOS header")?;
    if !has_dos_stub(&dos) {
        return Err(SnapshotError::format("PE DOS header", "missing MZ signature"));
    }
    let e_lfanew = le_u32(&dos, E_LFANEW_OFFSET).unwrap_or(0) as u64;

    let nt = read_range(file, file_len, e_lfanew, 4 + COFF_HEADER_SIZE, "PE headers")?;
    if &nt[..4] != PE_SIGNATURE {
        return Err(SnapshotError::format("PE headers", "missing PE signature"));
    }
    let nsections = le_u16(&nt, 6).unwrap_or(0) as u64;
    let pointer_to_symbols = le_u32(&nt, 12).unwrap_or(0) as u64;
    let nsymbols = le_u32(&nt, 16).unwrap_or(0) as u64;
    let optional_size = le_u16(&nt, 20).unwrap_or(0) as u64;

    let optional_offset = e_lfanew + 4 + COFF_HEADER_SIZE;
    let optional = read_range(file, file_len, optional_offset, optional_size, "PE optional header")?;
    let table_offset = optional_offset + optional_size;
    let table = read_range(
        file,
        file_len,
        table_offset,
        nsections * SECTION_HEADER_SIZE,
        "PE section table",
    )?;

    let mut scan = ContainerScan::default();
    scan.cover(table_offset, table.len() as u64);
    if pointer_to_symbols != 0 {
        scan.cover(pointer_to_symbols, nsymbols * COFF_SYMBOL_SIZE);
    }
    if let Some((offset, size)) = certificate_table(&optional) {
        scan.cover(offset, size);
    }

    for i in 0..nsections as usize {
        let at = i * SECTION_HEADER_SIZE as usize;
        let name = padded_name(&table, at, 8).unwrap_or_default();
        let raw_size = le_u32(&table, at + 16).unwrap_or(0) as u64;
        let raw_pointer = le_u32(&table, at + 20).unwrap_or(0) as u64;
        if raw_size == 0 {
            continue;
        }
        scan.cover(raw_pointer, raw_size);
        if name == SNAPSHOT_SECTION_NAME.as_bytes() {
            scan.section = Some(checked_section("PE section", raw_pointer, raw_size, file_len)?);
        }
    }
    Ok(scan)
}

/// `(file offset, size)` of the certificate table, if the image has one.
fn certificate_table(optional: &[u8]) -> Option<(u64, u64)> {
    let directories = match le_u16(optional, 0)? {
        PE32_MAGIC => 96,
        PE32_PLUS_MAGIC => 112,
        _ => return None,
    };
    let count = le_u32(optional, directories - 4)? as u64;
    if count <= SECURITY_DIRECTORY {
        return None;
    }
    let at = directories + (SECURITY_DIRECTORY as usize) * 8;
    let offset = le_u32(optional, at)? as u64;
    let size = le_u32(optional, at + 4)? as u64;
    (size > 0).then_some((offset, size))
}
