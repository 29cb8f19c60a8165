//! ELF container scanning (64-bit little-endian)

use std::fs::File;

use super::{checked_section, read_range, ContainerScan};
use crate::bytes::{c_str, le_u16, le_u32, le_u64};
use crate::error::{Result, SnapshotError};

/// Section that may hold an embedded snapshot.
pub const SNAPSHOT_SECTION_NAME: &str = ".app_snapshot";

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
pub const HEADER_SIZE: u64 = 64;
const PHDR_SIZE: u64 = 56;
const SHDR_SIZE: u64 = 64;
const SHT_NOBITS: u32 = 8;

pub fn is_elf(header: &[u8]) -> bool {
    header.starts_with(ELF_MAGIC)
}

/// Section header fields the scanner needs.
struct SectionHeader {
    name: u32,
    kind: u32,
    offset: u64,
    size: u64,
}

/// Walk the program and section header tables of a 64-bit ELF.
pub fn scan(file: &mut File, file_len: u64) -> Result<ContainerScan> {
    let header = read_range(file, file_len, 0, HEADER_SIZE, "ELF header")?;
    if !is_elf(&header) {
        return Err(SnapshotError::format("ELF header", "bad magic"));
    }
    if header[4] != ELFCLASS64 || header[5] != ELFDATA2LSB {
        return Err(SnapshotError::format(
            "ELF header",
            "only 64-bit little-endian images are supported",
        ));
    }

    let phoff = le_u64(&header, 32).unwrap_or(0);
    let shoff = le_u64(&header, 40).unwrap_or(0);
    let phentsize = le_u16(&header, 54).unwrap_or(0) as u64;
    let phnum = le_u16(&header, 56).unwrap_or(0) as u64;
    let shentsize = le_u16(&header, 58).unwrap_or(0) as u64;
    let shnum = le_u16(&header, 60).unwrap_or(0) as u64;
    let shstrndx = le_u16(&header, 62).unwrap_or(0) as usize;

    let mut scan = ContainerScan::default();
    scan.cover(0, HEADER_SIZE);

    if phnum > 0 {
        if phentsize < PHDR_SIZE {
            return Err(SnapshotError::format("ELF program headers", "entry size too small"));
        }
        let table = read_range(file, file_len, phoff, phnum * phentsize, "ELF program headers")?;
        scan.cover(phoff, table.len() as u64);
        for i in 0..phnum as usize {
            let at = i * phentsize as usize;
            let offset = le_u64(&table, at + 8).unwrap_or(0);
            let filesz = le_u64(&table, at + 32).unwrap_or(0);
            scan.cover(offset, filesz);
        }
    }

    if shnum > 0 {
        if shentsize < SHDR_SIZE {
            return Err(SnapshotError::format("ELF section headers", "entry size too small"));
        }
        let table = read_range(file, file_len, shoff, shnum * shentsize, "ELF section headers")?;
        scan.cover(shoff, table.len() as u64);

        let sections: Vec<SectionHeader> = (0..shnum as usize)
            .map(|i| {
                let at = i * shentsize as usize;
                SectionHeader {
                    name: le_u32(&table, at).unwrap_or(0),
                    kind: le_u32(&table, at + 4).unwrap_or(0),
                    offset: le_u64(&table, at + 24).unwrap_or(0),
                    size: le_u64(&table, at + 32).unwrap_or(0),
                }
            })
            .collect();

        for section in sections.iter().filter(|s| s.kind != SHT_NOBITS) {
            scan.cover(section.offset, section.size);
        }

        if let Some(strtab) = sections.get(shstrndx).filter(|s| s.kind != SHT_NOBITS) {
            let names = read_range(file, file_len, strtab.offset, strtab.size, "ELF section names")?;
            let found = sections.iter().find(|s| {
                s.kind != SHT_NOBITS
                    && c_str(&names, s.name as usize) == Some(SNAPSHOT_SECTION_NAME.as_bytes())
            });
            if let Some(section) = found {
                scan.section = Some(checked_section("ELF section", section.offset, section.size, file_len)?);
            }
        }
    }

    Ok(scan)
}
