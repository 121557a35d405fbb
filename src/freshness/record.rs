// src/freshness/record.rs

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fs::FileSystem;

/// Relative path (from the project root) to the directory holding persisted
/// build records, one JSON file per task:
///
/// `<root>/.sitepipe/records/<task>.json`
pub const RECORD_DIR: &str = ".sitepipe/records";

/// What was true about one source the last time it built successfully.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Content hash of the source as it was read for that build.
    pub hash: String,
    /// Files pulled in while transforming (includes, imports) and their hashes.
    #[serde(default)]
    pub dependencies: BTreeMap<PathBuf, String>,
    /// Every output written for this source.
    #[serde(default)]
    pub outputs: Vec<PathBuf>,
    /// Globs the source expanded, with a signature of their match list.
    #[serde(default)]
    pub globs: Vec<GlobRecord>,
}

/// One glob evaluated while building a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobRecord {
    pub dir: PathBuf,
    pub pattern: String,
    /// See [`glob_signature`](crate::freshness::signature::glob_signature).
    pub signature: String,
}

/// Per-task map from source path to its last successful build.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildRecord {
    entries: BTreeMap<PathBuf, RecordEntry>,
}

impl BuildRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source: &Path) -> Option<&RecordEntry> {
        self.entries.get(source)
    }

    pub fn insert(&mut self, source: PathBuf, entry: RecordEntry) {
        self.entries.insert(source, entry);
    }

    /// Drop entries for which `keep` returns false; returns how many went.
    pub fn retain(&mut self, mut keep: impl FnMut(&Path) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|source, _| keep(source));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Abstract storage for per-task build records.
pub trait RecordStore: Send + Sync {
    fn load(&self, task: &str) -> Result<BuildRecord>;
    fn save(&mut self, task: &str, record: &BuildRecord) -> Result<()>;
    /// Remove records for tasks that are not in the `active_tasks` list.
    fn prune(&mut self, active_tasks: &[&str]) -> Result<()>;
}

/// Stores records in memory only (lost on restart).
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    map: HashMap<String, BuildRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn load(&self, task: &str) -> Result<BuildRecord> {
        Ok(self.map.get(task).cloned().unwrap_or_default())
    }

    fn save(&mut self, task: &str, record: &BuildRecord) -> Result<()> {
        self.map.insert(task.to_string(), record.clone());
        debug!(task = %task, entries = record.len(), "stored build record (memory)");
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) -> Result<()> {
        let initial_len = self.map.len();
        self.map.retain(|k, _| active_tasks.contains(&k.as_str()));
        if self.map.len() < initial_len {
            info!(
                removed = initial_len - self.map.len(),
                "pruned stale build records (memory)"
            );
        }
        Ok(())
    }
}

/// Stores records as JSON under `<root>/.sitepipe/records/`.
#[derive(Debug)]
pub struct FileRecordStore {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileRecordStore {
    pub fn new(root: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        Self { root, fs }
    }

    fn dir(&self) -> PathBuf {
        self.root.join(RECORD_DIR)
    }

    fn path_for(&self, task: &str) -> PathBuf {
        self.dir().join(format!("{task}.json"))
    }
}

impl RecordStore for FileRecordStore {
    fn load(&self, task: &str) -> Result<BuildRecord> {
        let path = self.path_for(task);
        if !self.fs.exists(&path) {
            return Ok(BuildRecord::default());
        }
        let bytes = self.fs.read(&path)?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing build record at {:?}", path))
    }

    fn save(&mut self, task: &str, record: &BuildRecord) -> Result<()> {
        let path = self.path_for(task);
        let json = serde_json::to_vec_pretty(record)?;
        self.fs
            .write(&path, &json)
            .with_context(|| format!("writing build record at {:?}", path))?;
        debug!(task = %task, entries = record.len(), "stored build record (file)");
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) -> Result<()> {
        let dir = self.dir();
        if !self.fs.is_dir(&dir) {
            return Ok(());
        }

        let mut removed = 0usize;
        for path in self.fs.read_dir(&dir)? {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            let is_record = path.extension().is_some_and(|ext| ext == "json");
            if is_record && !active_tasks.contains(&stem) {
                self.fs.remove_file(&path)?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "pruned stale build records (file)");
        }
        Ok(())
    }
}
