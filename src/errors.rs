// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Two families live here:
//! - [`SitepipeError`]: setup-time and task-scoped failures. Anything raised
//!   while loading config is fatal at startup.
//! - [`FileError`] and friends: file-scoped failures raised while building a
//!   single source. These are logged and skipped; they never abort a task.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SitepipeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A transform stage rejected one source file.
///
/// Carries enough context (stage, file, cause) for a human to act on it.
#[derive(Error, Debug)]
#[error("stage '{stage}' failed on {}: {cause:#}", file.display())]
pub struct TransformError {
    pub stage: &'static str,
    pub file: PathBuf,
    pub cause: anyhow::Error,
}

/// A filesystem watch could not be established or reported an error.
#[derive(Error, Debug)]
#[error("watch error on {}: {cause}", path.display())]
pub struct WatchError {
    pub path: PathBuf,
    pub cause: String,
}

/// File-scoped failure while building one source.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("reading {}: {cause:#}", path.display())]
    Read { path: PathBuf, cause: anyhow::Error },

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("writing {}: {cause:#}", path.display())]
    Write { path: PathBuf, cause: anyhow::Error },
}

impl FileError {
    /// Path of the file this error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            FileError::Read { path, .. } | FileError::Write { path, .. } => path,
            FileError::Transform(err) => &err.file,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SitepipeError>;
