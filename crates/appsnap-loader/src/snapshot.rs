//! Public facade
//!
//! [`Snapshot`] gathers the entry points the runtime bootstrap uses; each
//! forwards to the module that implements it.

use std::path::Path;

use crate::app_snapshot::AppSnapshot;
use crate::container::PayloadLocation;
use crate::error::Result;
use crate::generate::{self, SnapshotGenerator};
use crate::options::LoadOptions;
use crate::{kernel_list, loader, writer};

/// Namespace for snapshot reading, writing and generation.
pub enum Snapshot {}

impl Snapshot {
    pub fn generate_kernel<G: SnapshotGenerator + ?Sized>(
        generator: &mut G,
        out_path: &Path,
        script: &str,
        package_config: Option<&Path>,
    ) -> Result<()> {
        generate::generate_kernel(generator, out_path, script, package_config)
    }

    pub fn generate_app_jit<G: SnapshotGenerator + ?Sized>(generator: &mut G, out_path: &Path) -> Result<()> {
        generate::generate_app_jit(generator, out_path)
    }

    pub fn generate_app_aot_as_assembly<G: SnapshotGenerator + ?Sized>(
        generator: &mut G,
        out_path: &Path,
    ) -> Result<()> {
        generate::generate_app_aot_as_assembly(generator, out_path)
    }

    /// Whether `path` is a Mach-O executable.
    #[cfg(target_vendor = "apple")]
    pub fn is_macho_formatted_binary(path: &Path) -> bool {
        crate::container::probe_file(path) == Some(crate::container::ContainerFormat::MachO)
    }

    /// Whether `path` is a PE executable.
    #[cfg(windows)]
    pub fn is_pe_formatted_binary(path: &Path) -> bool {
        crate::container::probe_file(path) == Some(crate::container::ContainerFormat::Pe)
    }

    /// Load the payload embedded in a host-format executable, if any.
    pub fn try_read_appended_app_snapshot(path: &Path) -> Option<AppSnapshot> {
        loader::try_read_appended_app_snapshot(path)
    }

    pub fn read_appended_app_snapshot(path: &Path, options: &LoadOptions) -> Result<AppSnapshot> {
        loader::read_appended_app_snapshot(path, options)
    }

    /// Principal loader; `None` when no snapshot could be loaded.
    pub fn try_read_app_snapshot(uri: &str, options: &LoadOptions) -> Option<AppSnapshot> {
        loader::try_read_app_snapshot(uri, options)
    }

    pub fn read_app_snapshot(uri: &str, options: &LoadOptions) -> Result<AppSnapshot> {
        loader::read_app_snapshot(uri, options)
    }

    pub fn read_app_snapshot_from_bytes(bytes: &[u8]) -> Result<AppSnapshot> {
        loader::read_app_snapshot_from_bytes(bytes)
    }

    pub fn read_kernel_list(path: &Path) -> Result<AppSnapshot> {
        kernel_list::read_kernel_list(path)
    }

    pub fn write_app_snapshot(path: &Path, isolate_data: &[u8], isolate_instructions: &[u8]) -> Result<()> {
        writer::write_app_snapshot(path, isolate_data, isolate_instructions)
    }

    pub fn append_app_snapshot(container_path: &Path, payload: &[u8], out_path: &Path) -> Result<PayloadLocation> {
        writer::append_app_snapshot(container_path, payload, out_path)
    }
}
