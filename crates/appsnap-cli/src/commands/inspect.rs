//! `appsnap inspect`: Load a snapshot and describe it.

use anyhow::Context;
use appsnap_loader::{LoadOptions, Region, Snapshot};
use termcolor::ColorChoice;
use tracing::debug;

use crate::output::StyledOutput;

pub fn execute(uri: &str, options: &LoadOptions, color: ColorChoice) -> anyhow::Result<()> {
    let snapshot = Snapshot::read_app_snapshot(uri, options)
        .with_context(|| format!("no app snapshot loaded from {}", uri))?;
    let buffers = snapshot.set_buffers();
    debug!("published buffers of {} snapshot", snapshot.layout());

    let mut out = StyledOutput::new(color);
    out.success(&format!("{:?}", snapshot.magic()));
    out.plain(&format!(" snapshot ({})", snapshot.layout()));
    out.newline();
    out.field("payload", &format!("{} bytes", snapshot.payload_len()));
    out.field(
        "backing",
        if snapshot.is_file_backed() {
            "file mapping"
        } else {
            "anonymous memory"
        },
    );
    for region in Region::ALL {
        let view = buffers.view(region);
        let value = if view.is_null() {
            "absent".to_string()
        } else {
            format!("{} bytes at {:p}", view.len, view.ptr)
        };
        out.field(region.name(), &value);
    }
    Ok(())
}
