//! JSON configuration loading.
//!
//! Thin wrapper around `serde_json` that turns file-not-found and malformed
//! JSON into a single `ConfigError` so callers have one error type to handle
//! all the way from "file on disk" to "ready-to-use `PreparedConfig`".

use std::fs::File;
use std::io::Read as _;
use std::path::Path;

use crate::config::types::RawConfig;
use crate::error::ConfigError;

/// Load a `RawConfig` from a JSON file on disk.
pub fn load_config_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let mut file = File::open(path)
        .map_err(|e| ConfigError::from_issues(vec![format!("cannot open {}: {e}", path.display())]))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| ConfigError::from_issues(vec![format!("cannot read {}: {e}", path.display())]))?;
    load_config_str(&contents)
}

/// Load a `RawConfig` from an in-memory JSON string.
pub fn load_config_str(contents: &str) -> Result<RawConfig, ConfigError> {
    serde_json::from_str(contents)
        .map_err(|e| ConfigError::from_issues(vec![format!("malformed configuration: {e}")]))
}
