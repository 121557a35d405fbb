// src/config/loader.rs

use std::fs;
use std::path::Path;

use tracing::info;

use crate::config::model::{builtin_tasks, ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls, plus the
///   built-in task set when no task is declared).
/// - Checks for unknown `after` references, cycles, malformed patterns and
///   overlapping destinations.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    from_raw(raw_config)
}

/// Like [`load_and_validate`], but a missing file yields the built-in
/// configuration instead of an error.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    if path.exists() {
        load_and_validate(path)
    } else {
        info!(?path, "config file not found; using built-in task set");
        from_raw(RawConfigFile::default())
    }
}

fn from_raw(mut raw: RawConfigFile) -> Result<ConfigFile> {
    if raw.task.is_empty() {
        raw.task = builtin_tasks();
    }
    ConfigFile::try_from(raw)
}
