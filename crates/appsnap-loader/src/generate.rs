//! Snapshot generation boundary
//!
//! Producing Kernel, AppJIT or AOT output needs a front end and a compiler;
//! both live outside this crate behind [`SnapshotGenerator`]. The functions
//! here own everything around them: output files, and checking that what
//! comes back is the kind of payload that was asked for.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{Result, SnapshotError};
use crate::magic::MagicNumber;
use crate::writer::write_app_snapshot;

/// Isolate regions of a warmed JIT image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JitImage {
    pub isolate_data: Vec<u8>,
    pub isolate_instructions: Vec<u8>,
}

/// A front end / compiler able to emit snapshots.
pub trait SnapshotGenerator {
    /// Lower `script` to a Kernel program, resolving packages through
    /// `package_config` when given.
    fn kernel(&mut self, script: &str, package_config: Option<&Path>) -> io::Result<Vec<u8>>;

    /// Serialize the current warmed JIT state.
    fn app_jit(&mut self) -> io::Result<JitImage>;

    /// Emit AOT assembly for the loaded program.
    fn aot_assembly(&mut self, out: &mut dyn Write) -> io::Result<()>;
}

/// Compile `script` to Kernel and write it to `out_path`.
pub fn generate_kernel<G: SnapshotGenerator + ?Sized>(
    generator: &mut G,
    out_path: &Path,
    script: &str,
    package_config: Option<&Path>,
) -> Result<()> {
    let program = generator.kernel(script, package_config)?;
    match MagicNumber::sniff(&program) {
        MagicNumber::Kernel | MagicNumber::KernelList => {}
        other => {
            return Err(SnapshotError::format(
                "generated kernel",
                format!("front end produced a {:?} payload", other),
            ))
        }
    }
    fs::write(out_path, &program)?;
    info!("wrote kernel for {} to {}", script, out_path.display());
    Ok(())
}

/// Write the generator's JIT state as an AppJIT snapshot.
pub fn generate_app_jit<G: SnapshotGenerator + ?Sized>(generator: &mut G, out_path: &Path) -> Result<()> {
    let image = generator.app_jit()?;
    write_app_snapshot(out_path, &image.isolate_data, &image.isolate_instructions)
}

/// Write the generator's AOT assembly to `out_path`.
pub fn generate_app_aot_as_assembly<G: SnapshotGenerator + ?Sized>(
    generator: &mut G,
    out_path: &Path,
) -> Result<()> {
    let mut out = BufWriter::new(File::create(out_path)?);
    generator.aot_assembly(&mut out)?;
    out.flush()?;
    info!("wrote AOT assembly to {}", out_path.display());
    Ok(())
}
