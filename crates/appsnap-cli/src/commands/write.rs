//! `appsnap write`: Write a bare AppJIT snapshot.

use std::path::Path;

use anyhow::Context;
use appsnap_loader::Snapshot;
use termcolor::ColorChoice;

use crate::output::StyledOutput;

pub fn execute(
    output: &Path,
    isolate_data: &Path,
    isolate_instructions: Option<&Path>,
    color: ColorChoice,
) -> anyhow::Result<()> {
    let data = std::fs::read(isolate_data)
        .with_context(|| format!("cannot read {}", isolate_data.display()))?;
    let instructions = match isolate_instructions {
        Some(path) => std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?,
        None => Vec::new(),
    };

    Snapshot::write_app_snapshot(output, &data, &instructions)
        .with_context(|| format!("cannot write {}", output.display()))?;

    let mut out = StyledOutput::new(color);
    out.success("Wrote");
    out.plain(&format!(" {}", output.display()));
    out.newline();
    Ok(())
}
