//! Application snapshot loader
//!
//! Finds, classifies and maps the precompiled program image a runtime boots
//! from. The image may be a bare file or ride inside a native executable
//! (Mach-O, PE or ELF), either in a named section or appended after the
//! container's last byte.
//!
//! # Architecture
//!
//! ```text
//! uri ─► loader ─► container probe ─► payload range ─► magic sniff
//!                                                          │
//!                         AppSnapshot ◄── region views ◄── memory (mmap / copy)
//! ```
//!
//! - **magic**: prefix classification
//! - **container**: Mach-O / PE / ELF scanners
//! - **layout**: the four-region directory of AppJIT and AOT payloads
//! - **memory**: file mappings and sealed anonymous copies
//! - **app_snapshot**: the handle and its published buffers
//! - **loader** / **writer** / **kernel_list** / **generate**: entry points,
//!   gathered on [`Snapshot`]

pub mod app_snapshot;
mod bytes;
pub mod container;
pub mod error;
pub mod generate;
pub mod kernel_list;
pub mod layout;
pub mod loader;
pub mod magic;
pub mod memory;
pub mod options;
pub mod snapshot;
pub mod writer;

pub use app_snapshot::{AppSnapshot, BufferView, SnapshotBuffers, SnapshotLayout};
pub use container::{ContainerFormat, Embedding, PayloadLocation};
pub use error::{ErrorKind, Result, SnapshotError};
pub use generate::{JitImage, SnapshotGenerator};
pub use layout::{Region, RegionDirectory, RegionEntry, APP_SNAPSHOT_PAGE_SIZE, CODE_ALIGNMENT};
pub use magic::{is_aot_magic_number, MagicNumber};
pub use options::LoadOptions;
pub use snapshot::Snapshot;
pub use writer::SnapshotBuilder;
