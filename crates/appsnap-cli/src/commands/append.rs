//! `appsnap append`: Append a snapshot to a host executable.

use std::path::Path;

use anyhow::Context;
use appsnap_loader::Snapshot;
use termcolor::ColorChoice;
use tracing::info;

use crate::output::StyledOutput;

pub fn execute(container: &Path, payload: &Path, output: &Path, color: ColorChoice) -> anyhow::Result<()> {
    let bytes = std::fs::read(payload).with_context(|| format!("cannot read {}", payload.display()))?;
    let location = Snapshot::append_app_snapshot(container, &bytes, output)
        .with_context(|| format!("cannot append to {}", container.display()))?;
    info!("bundled payload {} into {}", payload.display(), output.display());

    let mut out = StyledOutput::new(color);
    out.success("Appended");
    out.plain(&format!(
        " {} bytes to {} {} at offset {}",
        location.length,
        location.format,
        output.display(),
        location.offset
    ));
    out.newline();
    Ok(())
}
