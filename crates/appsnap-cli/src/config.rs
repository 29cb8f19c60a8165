//! Load options from `--config`, the environment and flags.
//!
//! Priority: flags > config file > environment > defaults.

use std::path::Path;

use anyhow::Context;
use appsnap_loader::LoadOptions;

pub fn load_options(config: Option<&Path>, in_memory: bool, no_decode: bool) -> anyhow::Result<LoadOptions> {
    let base = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read config {}", path.display()))?;
            parse_options(&text).with_context(|| format!("invalid config {}", path.display()))?
        }
        None => LoadOptions::from_env(),
    };
    Ok(apply_flags(base, in_memory, no_decode))
}

fn parse_options(text: &str) -> Result<LoadOptions, toml::de::Error> {
    toml::from_str(text)
}

fn apply_flags(mut options: LoadOptions, in_memory: bool, no_decode: bool) -> LoadOptions {
    if in_memory {
        options.force_load_in_memory = true;
    }
    if no_decode {
        options.decode_uri = false;
    }
    options
}
