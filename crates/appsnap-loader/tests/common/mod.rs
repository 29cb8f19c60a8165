//! Byte builders for synthetic host executables.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

const MH_MAGIC_64: u32 = 0xfeed_facf;
const LC_SEGMENT_64: u32 = 0x19;
const SEGMENT_COMMAND_SIZE: usize = 72;
const SECTION_SIZE: usize = 80;

/// A 64-bit Mach-O of `total_len` bytes whose only segment spans the file,
/// optionally declaring an `__app_snapshot` section at `(offset, size)`.
pub fn macho(total_len: usize, section: Option<(u32, u64)>) -> Vec<u8> {
    let nsects = section.is_some() as usize;
    let segment_size = SEGMENT_COMMAND_SIZE + nsects * SECTION_SIZE;
    let mut out = Vec::with_capacity(total_len);

    for word in [MH_MAGIC_64, 0x0100_000c, 0, 2, 1, segment_size as u32, 0, 0] {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(&LC_SEGMENT_64.to_le_bytes());
    out.extend_from_slice(&(segment_size as u32).to_le_bytes());
    out.extend_from_slice(&name16(b"__TEXT"));
    for quad in [0u64, total_len as u64, 0, total_len as u64] {
        out.extend_from_slice(&quad.to_le_bytes());
    }
    for word in [5u32, 5, nsects as u32, 0] {
        out.extend_from_slice(&word.to_le_bytes());
    }

    if let Some((offset, size)) = section {
        out.extend_from_slice(&name16(b"__app_snapshot"));
        out.extend_from_slice(&name16(b"__TEXT"));
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&[0u8; 28]);
    }

    out.resize(total_len, 0);
    out
}

/// A 64-bit little-endian ELF of `total_len` bytes with one PT_LOAD over the
/// whole file and no section headers.
pub fn elf(total_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(b"\x7fELF\x02\x01\x01\0");
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&0x3eu16.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&64u64.to_le_bytes()); // phoff
    out.extend_from_slice(&0u64.to_le_bytes()); // shoff
    out.extend_from_slice(&0u32.to_le_bytes());
    for half in [64u16, 56, 1, 64, 0, 0] {
        out.extend_from_slice(&half.to_le_bytes());
    }
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&5u32.to_le_bytes());
    for quad in [0u64, 0, 0, total_len as u64, total_len as u64, 0x1000] {
        out.extend_from_slice(&quad.to_le_bytes());
    }
    out.resize(total_len, 0);
    out
}

fn name16(name: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..name.len()].copy_from_slice(name);
    out
}

/// A Kernel payload: magic followed by `program`.
pub fn kernel(program: &[u8]) -> Vec<u8> {
    let mut out = vec![0x90, 0xab, 0xcd, 0xef];
    out.extend_from_slice(program);
    out
}

pub fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn uri(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}
