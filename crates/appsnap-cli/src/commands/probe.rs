//! `appsnap probe`: Report a file's container format and payload location.

use std::fs::File;
use std::path::Path;

use appsnap_loader::container::{locate_payload, probe_file};
use termcolor::ColorChoice;
use tracing::debug;

use crate::output::StyledOutput;

pub fn execute(path: &Path, color: ColorChoice) -> anyhow::Result<()> {
    let mut out = StyledOutput::new(color);
    let Some(format) = probe_file(path) else {
        debug!("{} has no container signature", path.display());
        out.warning("not a container");
        out.plain(&format!(": {}", path.display()));
        out.newline();
        return Ok(());
    };

    out.info(&format.to_string());
    out.plain(&format!(" executable: {}", path.display()));
    out.newline();

    let mut file = File::open(path)?;
    match locate_payload(path, &mut file, format) {
        Ok(location) => {
            out.field("embedding", &format!("{:?}", location.embedding));
            out.field("payload offset", &location.offset.to_string());
            out.field("payload length", &location.length.to_string());
        }
        Err(e) => out.field("payload", &e.to_string()),
    }
    Ok(())
}
