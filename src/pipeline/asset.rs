// src/pipeline/asset.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// In-memory representation of one file moving through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Source file this asset was produced from.
    pub source: PathBuf,
    /// Output path relative to the task's destination directory.
    pub rel_path: PathBuf,
    pub content: Vec<u8>,
    /// Other files read while producing this asset (includes, imports).
    pub dependencies: BTreeSet<PathBuf>,
    /// Globs whose match list shaped this asset (`@import "dir/*.scss"`).
    pub globs: BTreeSet<GlobDependency>,
}

/// A glob evaluated relative to `dir` while transforming a file.
///
/// Adding or removing a matching file changes the output even though no
/// file the asset read has changed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GlobDependency {
    pub dir: PathBuf,
    pub pattern: String,
}

impl Asset {
    pub fn new(source: impl Into<PathBuf>, rel_path: impl Into<PathBuf>, content: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            rel_path: rel_path.into(),
            content,
            dependencies: BTreeSet::new(),
            globs: BTreeSet::new(),
        }
    }

    /// Content as UTF-8 text.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.content)
            .with_context(|| format!("{} is not valid UTF-8", self.source.display()))
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_rel_path(mut self, rel_path: impl Into<PathBuf>) -> Self {
        self.rel_path = rel_path.into();
        self
    }

    /// Directory of the source file; relative references resolve against it.
    pub fn source_dir(&self) -> &Path {
        self.source.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Lower-cased extension of the output path.
    pub fn extension(&self) -> Option<String> {
        self.rel_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}
