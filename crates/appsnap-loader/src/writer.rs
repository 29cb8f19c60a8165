//! Snapshot writing
//!
//! Payloads are written with their region directory first and every region
//! starting on an [`APP_SNAPSHOT_PAGE_SIZE`] boundary, so any region maps
//! page-aligned on every supported host.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use crate::bytes::round_up;
use crate::container::{self, Embedding, PayloadLocation};
use crate::error::{Result, SnapshotError};
use crate::layout::{Region, RegionDirectory, RegionEntry, APP_SNAPSHOT_PAGE_SIZE, DIRECTORY_SIZE};
use crate::magic::MagicNumber;

/// Assembles an AppJIT or AOT payload region by region.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    magic: MagicNumber,
    regions: [Vec<u8>; 4],
}

impl SnapshotBuilder {
    /// Start a payload of `magic`, which must use the region directory.
    pub fn new(magic: MagicNumber) -> Result<Self> {
        if !magic.has_region_directory() {
            return Err(SnapshotError::format(
                "snapshot builder",
                format!("{:?} payloads have no region directory", magic),
            ));
        }
        Ok(Self {
            magic,
            regions: Default::default(),
        })
    }

    /// Set the contents of one region; empty contents leave it absent.
    pub fn region(mut self, region: Region, bytes: impl Into<Vec<u8>>) -> Self {
        self.regions[region.index()] = bytes.into();
        self
    }

    /// Lay the payload out in memory.
    pub fn build(&self) -> Vec<u8> {
        let mut directory = RegionDirectory::new(self.magic);
        let mut out = vec![0u8; DIRECTORY_SIZE];

        for region in Region::ALL {
            let bytes = &self.regions[region.index()];
            if bytes.is_empty() {
                continue;
            }
            // A Vec length always rounds within u64
            let offset = round_up(out.len() as u64, APP_SNAPSHOT_PAGE_SIZE).unwrap_or(u64::MAX);
            out.resize(offset as usize, 0);
            out.extend_from_slice(bytes);
            directory.set(region, RegionEntry::new(offset, bytes.len() as u64));
        }

        out[..DIRECTORY_SIZE].copy_from_slice(&directory.encode());
        out
    }

    /// Build and write to `path`, replacing any existing file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let payload = self.build();
        fs::write(path, &payload)?;
        info!("wrote {:?} snapshot to {} ({} bytes)", self.magic, path.display(), payload.len());
        Ok(())
    }
}

/// Write a bare AppJIT payload holding the isolate regions.
pub fn write_app_snapshot(path: &Path, isolate_data: &[u8], isolate_instructions: &[u8]) -> Result<()> {
    SnapshotBuilder::new(MagicNumber::AppJit)?
        .region(Region::IsolateData, isolate_data)
        .region(Region::IsolateInstructions, isolate_instructions)
        .write_to(path)
}

/// Copy the container at `container_path` to `out_path` with `payload`
/// appended at the next [`APP_SNAPSHOT_PAGE_SIZE`] boundary past the
/// container's described bytes. Gzip payloads are accepted as-is; the
/// loader inflates them.
pub fn append_app_snapshot(container_path: &Path, payload: &[u8], out_path: &Path) -> Result<PayloadLocation> {
    let magic = MagicNumber::sniff(payload);
    if !magic.is_loadable() && magic != MagicNumber::Gzip {
        return Err(SnapshotError::Classification {
            prefix: payload.iter().take(8).copied().collect(),
        });
    }

    let mut file = File::open(container_path)?;
    let format = container::probe(&mut file)
        .ok_or_else(|| SnapshotError::format("container", "not a Mach-O, PE or ELF executable"))?;
    let file_len = file.metadata()?.len();
    let scan = container::scan(&mut file, file_len, format)?;
    if scan.section.is_some() {
        return Err(SnapshotError::format(
            "container",
            format!("already has a {} section", format.snapshot_section_name()),
        ));
    }

    let offset = round_up(scan.end, APP_SNAPSHOT_PAGE_SIZE)
        .ok_or_else(|| SnapshotError::format("container", "section table end overflows"))?;
    if file_len > offset {
        return Err(SnapshotError::format(
            "container",
            format!("{} trailing bytes past its last section", file_len - scan.end),
        ));
    }
    debug!("appending {} bytes to {} container at {}", payload.len(), format, offset);

    let mut image = fs::read(container_path)?;
    image.resize(offset as usize, 0);
    image.extend_from_slice(payload);

    let mut out = File::create(out_path)?;
    out.write_all(&image)?;
    out.sync_all()?;
    info!("appended snapshot to {} at offset {}", out_path.display(), offset);

    Ok(PayloadLocation {
        format,
        embedding: Embedding::Appended,
        offset,
        length: payload.len() as u64,
    })
}
