//! Generic YAML config load/save. Lives in the binary crate: the server
//! config is only ever read by `main`, never by library code (spec.md §1
//! "no daemonization or process-supervision glue").

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Loads `T` from `path`. A missing file yields `T::default()`; a file
/// that fails to parse logs a warning and also falls back to defaults
/// rather than refusing to start.
pub fn load_config<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        log::info!("no config at {path:?}, using defaults");
        return T::default();
    }
    match std::fs::read_to_string(path).and_then(|s| {
        serde_yaml::from_str(&s).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("failed to load config from {path:?}: {e}, using defaults");
            T::default()
        }
    }
}

pub fn save_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }
    let yaml = serde_yaml::to_string(config).context("serializing config")?;
    std::fs::write(path, yaml).with_context(|| format!("writing config to {path:?}"))
}

/// `$XDG_CONFIG_HOME/auris/config.yaml`, falling back to `~/.config`.
pub fn default_config_path() -> std::path::PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("auris")
        .join("config.yaml")
}
