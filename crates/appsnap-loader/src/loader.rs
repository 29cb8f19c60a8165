//! Snapshot loader
//!
//! Resolves an input to a payload and hands it to [`AppSnapshot`]:
//! 1. Turn the URI into a path (optionally percent-decoding it)
//! 2. Probe for a native container; locate the section or appended payload
//! 3. Sniff the payload's magic, rejecting unknown prefixes before mapping
//! 4. Inflate gzip transport, otherwise map (or copy) the payload range
//! 5. Classify and validate the region views

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use percent_encoding::percent_decode_str;
use tracing::{debug, info, warn};
use url::Url;

use crate::app_snapshot::{AppSnapshot, SnapshotLayout};
use crate::container::{self, ContainerFormat, Embedding};
use crate::error::{ErrorKind, Result, SnapshotError};
use crate::magic::{MagicNumber, MAX_MAGIC_LEN};
use crate::memory::{AnonymousMemory, Backing};
use crate::options::LoadOptions;

/// Turn a loader input into a filesystem path.
///
/// With `decode` set, `file:` URIs are converted with their percent escapes
/// resolved and any other input is percent-decoded as a plain path. Without
/// it the input is used verbatim.
pub fn uri_to_path(uri: &str, decode: bool) -> Result<PathBuf> {
    if !decode {
        return Ok(PathBuf::from(uri));
    }
    if uri.starts_with("file:") {
        let url = Url::parse(uri).map_err(|e| SnapshotError::format("snapshot URI", e.to_string()))?;
        return url
            .to_file_path()
            .map_err(|()| SnapshotError::format("snapshot URI", format!("{} is not a local file", uri)));
    }
    let decoded = percent_decode_str(uri)
        .decode_utf8()
        .map_err(|e| SnapshotError::format("snapshot URI", e.to_string()))?;
    Ok(PathBuf::from(decoded.into_owned()))
}

/// Load the snapshot named by `uri`.
///
/// A file that probes as a Mach-O, PE or ELF container is searched for an
/// embedded payload; anything else is read as a bare payload.
pub fn read_app_snapshot(uri: &str, options: &LoadOptions) -> Result<AppSnapshot> {
    let path = uri_to_path(uri, options.decode_uri)?;
    let mut file = File::open(&path)?;

    let snapshot = match container::probe(&mut file) {
        Some(format) => {
            debug!("{} probes as {}", path.display(), format);
            read_embedded(&path, &mut file, format, options)?
        }
        None => {
            let file_len = file.metadata()?.len();
            load_range(&mut file, SnapshotLayout::BareFile, 0, file_len, options)?
        }
    };
    info!("loaded {:?} snapshot from {} ({})", snapshot.magic(), path.display(), snapshot.layout());
    Ok(snapshot)
}

/// [`read_app_snapshot`], reporting failure as `None`.
pub fn try_read_app_snapshot(uri: &str, options: &LoadOptions) -> Option<AppSnapshot> {
    read_app_snapshot(uri, options)
        .map_err(|e| log_rejection(uri, &e))
        .ok()
}

/// Load the payload embedded in a container of the host's executable format.
pub fn read_appended_app_snapshot(path: &Path, options: &LoadOptions) -> Result<AppSnapshot> {
    read_appended_from(path, ContainerFormat::host(), options)
}

/// Load the payload embedded in a container of an explicit format.
pub fn read_appended_from(
    path: &Path,
    format: ContainerFormat,
    options: &LoadOptions,
) -> Result<AppSnapshot> {
    let mut file = File::open(path)?;
    let snapshot = read_embedded(path, &mut file, format, options)?;
    info!("loaded {:?} snapshot {} in {}", snapshot.magic(), snapshot.layout(), path.display());
    Ok(snapshot)
}

/// [`read_appended_app_snapshot`] with options from the environment,
/// reporting failure as `None`.
pub fn try_read_appended_app_snapshot(path: &Path) -> Option<AppSnapshot> {
    read_appended_app_snapshot(path, &LoadOptions::from_env())
        .map_err(|e| log_rejection(&path.display().to_string(), &e))
        .ok()
}

/// Load a payload already in memory; the bytes are copied.
pub fn read_app_snapshot_from_bytes(bytes: &[u8]) -> Result<AppSnapshot> {
    let magic = MagicNumber::sniff(bytes);
    let memory = match magic {
        MagicNumber::Gzip => inflate(bytes)?,
        MagicNumber::Unknown => return Err(unrecognized(bytes)),
        _ => AnonymousMemory::copy_from(bytes)?,
    };
    AppSnapshot::new(SnapshotLayout::InMemory, Backing::Anonymous(memory))
}

fn read_embedded(
    path: &Path,
    file: &mut File,
    format: ContainerFormat,
    options: &LoadOptions,
) -> Result<AppSnapshot> {
    let location = container::locate_payload(path, file, format)?;
    debug!(
        "payload of {} at {} ({} bytes, {:?})",
        path.display(),
        location.offset,
        location.length,
        location.embedding
    );
    let layout = match location.embedding {
        Embedding::Appended => SnapshotLayout::Appended(format),
        Embedding::Section => SnapshotLayout::Section(format),
    };
    load_range(file, layout, location.offset, location.length, options)
}

/// Sniff, then map or copy `len` bytes at `offset` and classify them.
fn load_range(
    file: &mut File,
    layout: SnapshotLayout,
    offset: u64,
    len: u64,
    options: &LoadOptions,
) -> Result<AppSnapshot> {
    let mut window = Vec::with_capacity(MAX_MAGIC_LEN);
    file.seek(SeekFrom::Start(offset))?;
    (&mut *file)
        .take(len.min(MAX_MAGIC_LEN as u64))
        .read_to_end(&mut window)?;

    match MagicNumber::sniff(&window) {
        MagicNumber::Unknown => Err(unrecognized(&window)),
        MagicNumber::Gzip => {
            debug!("payload is gzip-compressed, inflating into memory");
            let compressed = container::read_range(file, offset + len, offset, len, "gzip payload")?;
            let memory = inflate(&compressed)?;
            AppSnapshot::new(SnapshotLayout::InMemory, Backing::Anonymous(memory))
        }
        _ => {
            let len = usize::try_from(len)
                .map_err(|_| SnapshotError::format("payload", "too large for this host"))?;
            let backing = Backing::load(file, offset, len, options.force_load_in_memory)?;
            AppSnapshot::new(layout, backing)
        }
    }
}

fn inflate(compressed: &[u8]) -> Result<AnonymousMemory> {
    let mut inflated = Vec::new();
    GzDecoder::new(compressed).read_to_end(&mut inflated)?;
    if inflated.is_empty() {
        return Err(SnapshotError::Truncation {
            what: "inflated payload",
            needed: 1,
            available: 0,
        });
    }
    Ok(AnonymousMemory::copy_from(&inflated)?)
}

fn unrecognized(window: &[u8]) -> SnapshotError {
    SnapshotError::Classification {
        prefix: window.iter().take(MAX_MAGIC_LEN).copied().collect(),
    }
}

fn log_rejection(input: &str, err: &SnapshotError) {
    match err.kind() {
        ErrorKind::Io => warn!("cannot read app snapshot {}: {}", input, err),
        _ => debug!("no app snapshot in {}: {}", input, err),
    }
}
