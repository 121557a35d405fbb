// src/fileset.rs

//! Source pattern resolution.
//!
//! A task's `sources` are glob patterns relative to the source root; a leading
//! `!` turns a pattern into an exclusion. Partial patterns mark files that are
//! never emitted on their own but stay readable (and watched) as
//! dependencies of other files.
//!
//! Resolution is deterministic: files come back sorted by path.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::config::TaskConfig;
use crate::errors::{Result, SitepipeError};
use crate::fs::FileSystem;

/// Characters that make a path segment a glob rather than a literal.
const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// A file discovered by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Path as seen by the filesystem (source root joined with the match).
    pub path: PathBuf,
    /// Path relative to the task base directory; mirrors into the output.
    pub rel: PathBuf,
}

/// Result of resolving a task's patterns.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    /// Files to build, sorted by path.
    pub files: Vec<SourceFile>,
    /// Matching partial files, sorted by path. Never emitted.
    pub partials: Vec<SourceFile>,
}

impl FileSet {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Compile a single glob pattern. `*` never crosses a `/`.
pub fn compile_pattern(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| SitepipeError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn build_globset(patterns: &[&str]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_pattern(pat)?);
    }
    let set = builder
        .build()
        .with_context(|| format!("building globset from {patterns:?}"))?;
    Ok(Some(set))
}

/// Compiled pattern set for one task.
#[derive(Clone)]
pub struct FileSetSpec {
    source_root: PathBuf,
    base: PathBuf,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    partials: Option<GlobSet>,
}

impl fmt::Debug for FileSetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSetSpec")
            .field("source_root", &self.source_root)
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl FileSetSpec {
    /// Compile `sources` (with `!` exclusions) and `partials`, all relative to
    /// `source_root`.
    pub fn new(
        source_root: impl Into<PathBuf>,
        sources: &[String],
        partials: &[String],
    ) -> Result<Self> {
        let source_root = source_root.into();

        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for pattern in sources {
            match pattern.strip_prefix('!') {
                Some(body) => negative.push(body),
                None => positive.push(pattern.as_str()),
            }
        }
        let partial_refs: Vec<&str> = partials.iter().map(String::as_str).collect();

        let base = source_root.join(common_glob_base(&positive));

        Ok(Self {
            include: build_globset(&positive)?,
            exclude: build_globset(&negative)?,
            partials: build_globset(&partial_refs)?,
            source_root,
            base,
        })
    }

    /// Compile the pattern set of a configured task.
    pub fn from_task(source_root: &Path, task: &TaskConfig) -> Result<Self> {
        Self::new(source_root, &task.sources, &task.effective_partials())
    }

    /// Directory all positive patterns live under; output paths are
    /// relative to it.
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Whether `path` belongs to this task at all (emitted or partial).
    ///
    /// Used by the watcher: editing a partial must re-run its owner.
    pub fn matches(&self, path: &Path) -> bool {
        match self.rel_to_root(path) {
            Some(rel) => self.is_selected(&rel),
            None => false,
        }
    }

    /// Whether `path` is a partial of this task.
    pub fn is_partial(&self, path: &Path) -> bool {
        match (self.rel_to_root(path), &self.partials) {
            (Some(rel), Some(partials)) => self.is_selected(&rel) && partials.is_match(&rel),
            _ => false,
        }
    }

    fn is_selected(&self, rel: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .is_some_and(|set| set.is_match(rel));
        let excluded = self.exclude.as_ref().is_some_and(|set| set.is_match(rel));
        included && !excluded
    }

    fn rel_to_root(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.source_root).ok()?;
        Some(rel.to_string_lossy().replace('\\', "/"))
    }

    /// Walk the base directory and classify every matching file.
    ///
    /// A missing base directory resolves to an empty set. Linked directories
    /// are followed, but each real directory is walked once, so a link back
    /// up the tree cannot loop.
    pub fn resolve(&self, fs: &dyn FileSystem) -> anyhow::Result<FileSet> {
        let mut set = FileSet::default();
        if !fs.is_dir(&self.base) {
            return Ok(set);
        }

        let mut visited = HashSet::new();
        let mut stack = vec![self.base.clone()];
        while let Some(dir) = stack.pop() {
            let real = fs.canonicalize(&dir).unwrap_or_else(|_| dir.clone());
            if !visited.insert(real) {
                debug!(dir = ?dir, "directory already walked, skipping");
                continue;
            }

            let mut entries = fs.read_dir(&dir)?;
            entries.sort();
            // Reversed so the stack pops siblings in path order.
            for path in entries.into_iter().rev() {
                if fs.is_dir(&path) {
                    stack.push(path);
                    continue;
                }
                if !fs.is_file(&path) || !self.matches(&path) {
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&self.base) else {
                    continue;
                };
                let file = SourceFile {
                    rel: rel.to_path_buf(),
                    path: path.clone(),
                };
                if self.is_partial(&path) {
                    set.partials.push(file);
                } else {
                    set.files.push(file);
                }
            }
        }

        set.files.sort();
        set.partials.sort();
        Ok(set)
    }
}

/// Files matched by a single glob below `dir`, as sorted `/`-separated
/// paths relative to it. `skip` (the importing file) is never listed.
pub fn glob_matches(
    fs: &dyn FileSystem,
    dir: &Path,
    pattern: &str,
    skip: &Path,
) -> anyhow::Result<Vec<String>> {
    let spec = FileSetSpec::new(dir, &[pattern.to_string()], &[])
        .with_context(|| format!("import glob '{pattern}'"))?;
    let set = spec.resolve(fs)?;

    Ok(set
        .files
        .iter()
        .filter(|f| f.path != skip)
        .filter_map(|f| f.path.strip_prefix(dir).ok())
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .collect())
}

/// Longest leading run of literal segments shared by every pattern.
fn common_glob_base(patterns: &[&str]) -> PathBuf {
    let mut common: Option<Vec<&str>> = None;

    for pattern in patterns {
        let segments: Vec<&str> = pattern.split('/').collect();
        // The last segment names files, never a directory.
        let dirs = &segments[..segments.len().saturating_sub(1)];
        let literal: Vec<&str> = dirs
            .iter()
            .take_while(|seg| !seg.contains(GLOB_META) && !seg.is_empty())
            .copied()
            .collect();

        common = Some(match common {
            None => literal,
            Some(prev) => prev
                .iter()
                .zip(literal.iter())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| *a)
                .collect(),
        });
    }

    common
        .unwrap_or_default()
        .into_iter()
        .filter(|seg| *seg != ".")
        .collect()
}
