//! The loaded snapshot handle
//!
//! An [`AppSnapshot`] owns the memory its payload lives in and the four
//! region views carved out of it. Views are validated once, at
//! construction; afterwards the handle is read-only and
//! [`AppSnapshot::set_buffers`] only publishes what is already there.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{fence, Ordering};

use appsnap_platform::tsan;
use tracing::debug;

use crate::container::ContainerFormat;
use crate::error::{Result, SnapshotError};
use crate::layout::{Region, RegionDirectory, CODE_ALIGNMENT};
use crate::magic::{MagicNumber, MAX_MAGIC_LEN};
use crate::memory::Backing;

/// Where the payload of a handle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotLayout {
    /// The file is the payload
    BareFile,
    /// Payload follows the container's last described byte
    Appended(ContainerFormat),
    /// Payload lives in the container's snapshot section
    Section(ContainerFormat),
    /// Payload was handed over as bytes (or inflated from gzip)
    InMemory,
}

impl fmt::Display for SnapshotLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotLayout::BareFile => f.write_str("bare file"),
            SnapshotLayout::Appended(format) => write!(f, "appended to {}", format),
            SnapshotLayout::Section(format) => write!(f, "{} section", format),
            SnapshotLayout::InMemory => f.write_str("in memory"),
        }
    }
}

/// `(start, length)` of a view inside the backing bytes.
type Span = (usize, usize);

/// A classified, validated snapshot payload.
///
/// Not `Clone`: the handle is the sole owner of its mapping or allocation,
/// and dropping it releases the memory every view points into.
pub struct AppSnapshot {
    magic: MagicNumber,
    layout: SnapshotLayout,
    backing: Backing,
    views: [Option<Span>; 4],
}

impl AppSnapshot {
    /// Classify and validate `backing`, which holds exactly one payload.
    pub(crate) fn new(layout: SnapshotLayout, backing: Backing) -> Result<Self> {
        let bytes = backing.as_bytes();
        let magic = MagicNumber::sniff(bytes);
        let views = match magic {
            MagicNumber::Kernel | MagicNumber::KernelList => kernel_views(magic, bytes)?,
            m if m.has_region_directory() => directory_views(bytes)?,
            _ => {
                return Err(SnapshotError::Classification {
                    prefix: bytes.iter().take(MAX_MAGIC_LEN).copied().collect(),
                })
            }
        };

        let snapshot = Self {
            magic,
            layout,
            backing,
            views,
        };
        snapshot.check_alignment()?;
        debug!(
            "classified {:?} payload ({}, {} bytes)",
            snapshot.magic,
            snapshot.layout,
            snapshot.payload_len()
        );
        Ok(snapshot)
    }

    fn check_alignment(&self) -> Result<()> {
        let base = self.backing.as_bytes().as_ptr() as usize;
        for region in Region::ALL.into_iter().filter(|r| r.is_instructions()) {
            if let Some((start, _)) = self.views[region.index()] {
                let address = base + start;
                if address % CODE_ALIGNMENT != 0 {
                    return Err(SnapshotError::Alignment {
                        region: region.name(),
                        address,
                        alignment: CODE_ALIGNMENT,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn magic(&self) -> MagicNumber {
        self.magic
    }

    pub fn layout(&self) -> SnapshotLayout {
        self.layout
    }

    /// Length of the whole payload, header included.
    pub fn payload_len(&self) -> usize {
        self.backing.as_bytes().len()
    }

    /// Whether the views point into a mapping of the source file.
    pub fn is_file_backed(&self) -> bool {
        self.backing.is_file_backed()
    }

    pub fn is_jit(&self) -> bool {
        self.magic == MagicNumber::AppJit
    }

    pub fn is_aot(&self) -> bool {
        self.magic.is_aot()
    }

    pub fn is_jit_or_aot(&self) -> bool {
        self.is_jit() || self.is_aot()
    }

    pub fn is_kernel(&self) -> bool {
        self.magic == MagicNumber::Kernel
    }

    pub fn is_kernel_list(&self) -> bool {
        self.magic == MagicNumber::KernelList
    }

    /// Publish the four region views.
    ///
    /// Issues a release fence (and the sanitizer release hook) so a thread
    /// that later calls [`SnapshotBuffers::acquire`] on a copy of the result
    /// observes the fully initialized memory. Every call returns the same
    /// pointers.
    pub fn set_buffers(&self) -> SnapshotBuffers<'_> {
        let bytes = self.backing.as_bytes();
        fence(Ordering::Release);
        tsan::release(bytes.as_ptr());

        let mut views = [None; 4];
        for (slot, span) in views.iter_mut().zip(self.views.iter()) {
            *slot = span.map(|(start, len)| &bytes[start..start + len]);
        }
        SnapshotBuffers {
            views,
            anchor: bytes.as_ptr() as usize,
            _owner: PhantomData,
        }
    }
}

impl fmt::Debug for AppSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppSnapshot")
            .field("magic", &self.magic)
            .field("layout", &self.layout)
            .field("payload_len", &self.payload_len())
            .field("file_backed", &self.is_file_backed())
            .finish()
    }
}

/// Kernel and kernel-list payloads expose one view past the magic.
fn kernel_views(magic: MagicNumber, bytes: &[u8]) -> Result<[Option<Span>; 4]> {
    let start = magic.prefix_len();
    if bytes.len() <= start {
        return Err(SnapshotError::Truncation {
            what: "kernel program",
            needed: start as u64 + 1,
            available: bytes.len() as u64,
        });
    }
    let mut views = [None; 4];
    views[Region::IsolateData.index()] = Some((start, bytes.len() - start));
    Ok(views)
}

fn directory_views(bytes: &[u8]) -> Result<[Option<Span>; 4]> {
    let directory = RegionDirectory::decode(bytes)?;
    if directory.magic.is_aot() && Some(directory.magic) != MagicNumber::host_aot() {
        return Err(SnapshotError::format(
            "AOT payload",
            format!("{:?} does not match this host's architecture", directory.magic),
        ));
    }
    directory.validate(bytes.len() as u64)?;

    let mut views = [None; 4];
    for region in Region::ALL {
        let entry = directory.get(region);
        if !entry.is_absent() {
            // validate() bounded both by the payload length
            views[region.index()] = Some((entry.offset as usize, entry.length as usize));
        }
    }
    Ok(views)
}

/// A `(pointer, length)` pair as the runtime bootstrap consumes it.
///
/// Absent regions are `(null, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferView {
    pub ptr: *const u8,
    pub len: usize,
}

impl BufferView {
    pub const NULL: BufferView = BufferView {
        ptr: std::ptr::null(),
        len: 0,
    };

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

/// The region views of one [`AppSnapshot`], valid while it lives.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotBuffers<'a> {
    views: [Option<&'a [u8]>; 4],
    anchor: usize,
    _owner: PhantomData<&'a AppSnapshot>,
}

impl<'a> SnapshotBuffers<'a> {
    /// Consumer half of [`AppSnapshot::set_buffers`]; call once on the
    /// receiving thread before touching the bytes.
    pub fn acquire(&self) {
        tsan::acquire(self.anchor as *const u8);
        fence(Ordering::Acquire);
    }

    pub fn as_slice(&self, region: Region) -> Option<&'a [u8]> {
        self.views[region.index()]
    }

    pub fn view(&self, region: Region) -> BufferView {
        match self.views[region.index()] {
            Some(bytes) => BufferView {
                ptr: bytes.as_ptr(),
                len: bytes.len(),
            },
            None => BufferView::NULL,
        }
    }

    pub fn vm_data(&self) -> BufferView {
        self.view(Region::VmData)
    }

    pub fn vm_instructions(&self) -> BufferView {
        self.view(Region::VmInstructions)
    }

    pub fn isolate_data(&self) -> BufferView {
        self.view(Region::IsolateData)
    }

    pub fn isolate_instructions(&self) -> BufferView {
        self.view(Region::IsolateInstructions)
    }
}
