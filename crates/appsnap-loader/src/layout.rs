//! Region directory of AppJIT and AOT payloads
//!
//! ```text
//! ┌──────────────────────────────┐ 0
//! │  magic (8 bytes)             │
//! ├──────────────────────────────┤ 8
//! │  vm_data              off,len│  ← u64 LE pairs, offsets from payload start
//! │  vm_instructions      off,len│
//! │  isolate_data         off,len│
//! │  isolate_instructions off,len│
//! ├──────────────────────────────┤ 72
//! │  region bytes ...            │
//! └──────────────────────────────┘
//! ```
//!
//! A zero-length entry means the region is absent.

use crate::bytes::le_u64;
use crate::error::{Result, SnapshotError};
use crate::magic::MagicNumber;

/// Size of the magic slot plus the four region entries.
pub const DIRECTORY_SIZE: usize = 8 + 4 * 16;

/// Required start alignment of instruction regions in memory.
pub const CODE_ALIGNMENT: usize = 16;

/// Granularity of region placement and of appended payloads.
///
/// The largest page size of any supported host, so a payload written on one
/// host maps without copying on all of them.
pub const APP_SNAPSHOT_PAGE_SIZE: u64 = 16 * 1024;

/// One of the four buffers a snapshot hands to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    VmData,
    VmInstructions,
    IsolateData,
    IsolateInstructions,
}

impl Region {
    /// Directory order.
    pub const ALL: [Region; 4] = [
        Region::VmData,
        Region::VmInstructions,
        Region::IsolateData,
        Region::IsolateInstructions,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Region::VmData => "vm data",
            Region::VmInstructions => "vm instructions",
            Region::IsolateData => "isolate data",
            Region::IsolateInstructions => "isolate instructions",
        }
    }

    pub fn is_instructions(self) -> bool {
        matches!(self, Region::VmInstructions | Region::IsolateInstructions)
    }
}

/// `(offset, length)` of one region, relative to the payload start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionEntry {
    pub offset: u64,
    pub length: u64,
}

impl RegionEntry {
    pub const ABSENT: RegionEntry = RegionEntry {
        offset: 0,
        length: 0,
    };

    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    pub fn is_absent(&self) -> bool {
        self.length == 0
    }
}

/// Decoded payload header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionDirectory {
    pub magic: MagicNumber,
    pub regions: [RegionEntry; 4],
}

impl RegionDirectory {
    pub fn new(magic: MagicNumber) -> Self {
        Self {
            magic,
            regions: [RegionEntry::ABSENT; 4],
        }
    }

    pub fn get(&self, region: Region) -> RegionEntry {
        self.regions[region.index()]
    }

    pub fn set(&mut self, region: Region, entry: RegionEntry) {
        self.regions[region.index()] = entry;
    }

    /// Decode the directory at the start of `payload`.
    ///
    /// Only the header is read; call [`validate`](Self::validate) to check
    /// the entries against the payload length.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let magic = MagicNumber::sniff(payload);
        if !magic.has_region_directory() {
            return Err(SnapshotError::Classification {
                prefix: payload.iter().take(8).copied().collect(),
            });
        }
        if payload.len() < DIRECTORY_SIZE {
            return Err(SnapshotError::Truncation {
                what: "region directory",
                needed: DIRECTORY_SIZE as u64,
                available: payload.len() as u64,
            });
        }

        let mut directory = Self::new(magic);
        for region in Region::ALL {
            let at = 8 + region.index() * 16;
            // Length checked above
            let offset = le_u64(payload, at).unwrap_or(0);
            let length = le_u64(payload, at + 8).unwrap_or(0);
            directory.set(region, RegionEntry::new(offset, length));
        }
        Ok(directory)
    }

    /// Encode magic and entries into the fixed-size header.
    pub fn encode(&self) -> [u8; DIRECTORY_SIZE] {
        let mut out = [0u8; DIRECTORY_SIZE];
        let magic = self.magic.bytes();
        out[..magic.len()].copy_from_slice(magic);
        for region in Region::ALL {
            let entry = self.get(region);
            let at = 8 + region.index() * 16;
            out[at..at + 8].copy_from_slice(&entry.offset.to_le_bytes());
            out[at + 8..at + 16].copy_from_slice(&entry.length.to_le_bytes());
        }
        out
    }

    /// Check every present region lies after the header and inside the payload.
    pub fn validate(&self, payload_len: u64) -> Result<()> {
        for region in Region::ALL {
            let entry = self.get(region);
            if entry.is_absent() {
                continue;
            }
            if entry.offset < DIRECTORY_SIZE as u64 {
                return Err(SnapshotError::format(
                    "region directory",
                    format!(
                        "{} at offset {} overlaps the {}-byte header",
                        region.name(),
                        entry.offset,
                        DIRECTORY_SIZE
                    ),
                ));
            }
            let end = entry.offset.checked_add(entry.length).ok_or_else(|| {
                SnapshotError::format("region directory", format!("{} overflows", region.name()))
            })?;
            if end > payload_len {
                return Err(SnapshotError::Truncation {
                    what: region.name(),
                    needed: end,
                    available: payload_len,
                });
            }
        }
        Ok(())
    }
}
