//! Mach-O container scanning
//!
//! Only 64-bit little-endian images are scanned; the probe also recognizes
//! 32-bit and byte-swapped headers so they can be rejected with a clear
//! error instead of being treated as bare payloads.

use std::fs::File;

use super::{checked_section, read_range, ContainerScan};
use crate::bytes::{le_u32, le_u64, padded_name};
use crate::error::{Result, SnapshotError};

/// Section (in any segment) that may hold an embedded snapshot.
pub const SNAPSHOT_SECTION_NAME: &str = "__app_snapshot";

pub const MH_MAGIC: u32 = 0xfeed_face;
pub const MH_MAGIC_64: u32 = 0xfeed_facf;
pub const MH_CIGAM: u32 = 0xcefa_edfe;
pub const MH_CIGAM_64: u32 = 0xcffa_edfe;

pub const LC_SYMTAB: u32 = 0x2;
pub const LC_SEGMENT_64: u32 = 0x19;
pub const LC_CODE_SIGNATURE: u32 = 0x1d;

pub const HEADER_SIZE: usize = 32;
pub const SEGMENT_COMMAND_SIZE: usize = 72;
pub const SECTION_SIZE: usize = 80;

const S_ZEROFILL: u32 = 0x1;
const SECTION_TYPE_MASK: u32 = 0xff;

pub fn is_macho(header: &[u8]) -> bool {
    matches!(
        le_u32(header, 0),
        Some(MH_MAGIC | MH_MAGIC_64 | MH_CIGAM | MH_CIGAM_64)
    )
}

/// Walk the load commands of a 64-bit Mach-O.
pub fn scan(file: &mut File, file_len: u64) -> Result<ContainerScan> {
    let header = read_range(file, file_len, 0, HEADER_SIZE as u64, "Mach-O header")?;
    match le_u32(&header, 0) {
        Some(MH_MAGIC_64) => {}
        Some(MH_MAGIC | MH_CIGAM | MH_CIGAM_64) => {
            return Err(SnapshotError::format(
                "Mach-O header",
                "only 64-bit little-endian images are supported",
            ))
        }
        _ => return Err(SnapshotError::format("Mach-O header", "bad magic")),
    }
    let ncmds = le_u32(&header, 16).unwrap_or(0);
    let sizeofcmds = le_u32(&header, 20).unwrap_or(0) as u64;

    let commands = read_range(file, file_len, HEADER_SIZE as u64, sizeofcmds, "Mach-O load commands")?;
    scan_commands(&commands, ncmds, file_len)
}

fn scan_commands(commands: &[u8], ncmds: u32, file_len: u64) -> Result<ContainerScan> {
    let mut scan = ContainerScan::default();
    scan.cover(0, HEADER_SIZE as u64 + commands.len() as u64);

    let mut pos = 0usize;
    for index in 0..ncmds {
        let (cmd, cmdsize) = match (le_u32(commands, pos), le_u32(commands, pos + 4)) {
            (Some(cmd), Some(size)) => (cmd, size as usize),
            _ => {
                return Err(SnapshotError::format(
                    "Mach-O load commands",
                    format!("command {} runs past sizeofcmds", index),
                ))
            }
        };
        if cmdsize < 8 || pos + cmdsize > commands.len() {
            return Err(SnapshotError::format(
                "Mach-O load commands",
                format!("command {} has bad size {}", index, cmdsize),
            ));
        }
        let command = &commands[pos..pos + cmdsize];

        match cmd {
            LC_SEGMENT_64 => scan_segment(command, file_len, &mut scan)?,
            LC_CODE_SIGNATURE => {
                let dataoff = le_u32(command, 8).unwrap_or(0) as u64;
                let datasize = le_u32(command, 12).unwrap_or(0) as u64;
                scan.cover(dataoff, datasize);
            }
            LC_SYMTAB => {
                let stroff = le_u32(command, 16).unwrap_or(0) as u64;
                let strsize = le_u32(command, 20).unwrap_or(0) as u64;
                scan.cover(stroff, strsize);
            }
            _ => {}
        }
        pos += cmdsize;
    }
    Ok(scan)
}

fn scan_segment(command: &[u8], file_len: u64, scan: &mut ContainerScan) -> Result<()> {
    let truncated = || SnapshotError::format("Mach-O segment", "segment command truncated");
    let fileoff = le_u64(command, 40).ok_or_else(truncated)?;
    let filesize = le_u64(command, 48).ok_or_else(truncated)?;
    let nsects = le_u32(command, 64).ok_or_else(truncated)? as usize;
    scan.cover(fileoff, filesize);

    for i in 0..nsects {
        let at = SEGMENT_COMMAND_SIZE + i * SECTION_SIZE;
        if at + SECTION_SIZE > command.len() {
            return Err(SnapshotError::format(
                "Mach-O segment",
                format!("section {} lies outside its segment command", i),
            ));
        }
        let sectname = padded_name(command, at, 16).unwrap_or_default();
        let size = le_u64(command, at + 40).unwrap_or(0);
        let offset = le_u32(command, at + 48).unwrap_or(0) as u64;
        let flags = le_u32(command, at + 64).unwrap_or(0);

        if flags & SECTION_TYPE_MASK == S_ZEROFILL {
            continue;
        }
        if sectname == SNAPSHOT_SECTION_NAME.as_bytes() {
            scan.section = Some(checked_section("Mach-O section", offset, size, file_len)?);
        }
    }
    Ok(())
}
