//! Load options

use serde::{Deserialize, Serialize};

/// Environment variable that forces in-memory loading when set to a truthy
/// value (`1`, `true`, `yes`, `on`).
pub const FORCE_LOAD_FROM_MEMORY_ENV: &str = "APPSNAP_FORCE_LOAD_FROM_MEMORY";

/// How [`read_app_snapshot`](crate::Snapshot::read_app_snapshot) treats its
/// input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadOptions {
    /// Copy the payload into anonymous memory instead of mapping the file.
    /// Needed on hosts that refuse to execute file-backed pages.
    pub force_load_in_memory: bool,

    /// Percent-decode the input before treating it as a path.
    pub decode_uri: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            force_load_in_memory: false,
            decode_uri: true,
        }
    }
}

impl LoadOptions {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_value(std::env::var(FORCE_LOAD_FROM_MEMORY_ENV).ok().as_deref())
    }

    fn with_env_value(mut self, value: Option<&str>) -> Self {
        if let Some(value) = value {
            if is_truthy(value) {
                self.force_load_in_memory = true;
            }
        }
        self
    }

    pub fn in_memory(mut self, force: bool) -> Self {
        self.force_load_in_memory = force;
        self
    }

    pub fn decode(mut self, decode: bool) -> Self {
        self.decode_uri = decode;
        self
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = LoadOptions::default();
        assert!(!options.force_load_in_memory);
        assert!(options.decode_uri);
    }

    #[test]
    fn test_env_value() {
        assert!(LoadOptions::default().with_env_value(Some("1")).force_load_in_memory);
        assert!(LoadOptions::default().with_env_value(Some(" TRUE ")).force_load_in_memory);
        assert!(!LoadOptions::default().with_env_value(Some("0")).force_load_in_memory);
        assert!(!LoadOptions::default().with_env_value(None).force_load_in_memory);
    }

    #[test]
    fn test_from_toml() {
        let options: LoadOptions = toml::from_str("force_load_in_memory = true").unwrap();
        assert!(options.force_load_in_memory);
        assert!(options.decode_uri);

        assert!(toml::from_str::<LoadOptions>("decode = false").is_err());
    }

    #[test]
    fn test_builders() {
        let options = LoadOptions::default().in_memory(true).decode(false);
        assert_eq!(
            options,
            LoadOptions {
                force_load_in_memory: true,
                decode_uri: false
            }
        );
    }
}
