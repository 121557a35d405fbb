// src/exec/context.rs

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::config::model::{ConfigFile, TaskConfig};
use crate::freshness::{BuildRecord, FileRecordStore, HashCache, MemoryRecordStore, RecordStore};
use crate::fs::FileSystem;
use crate::reload::ReloadBroadcaster;
use crate::types::RecordStorageMode;

/// Everything a running task needs, shared by all tasks of the process.
///
/// `source_root` and `output_root` are resolved against the project root
/// (the directory holding the config file).
pub struct BuildContext {
    fs: Arc<dyn FileSystem>,
    config: ConfigFile,
    project_root: PathBuf,
    source_root: PathBuf,
    output_root: PathBuf,
    production: bool,
    records: Mutex<Box<dyn RecordStore>>,
    hashes: HashCache,
    broadcaster: ReloadBroadcaster,
    cleaned: AtomicBool,
}

impl std::fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildContext")
            .field("source_root", &self.source_root)
            .field("output_root", &self.output_root)
            .field("production", &self.production)
            .finish_non_exhaustive()
    }
}

impl BuildContext {
    pub fn new(fs: Arc<dyn FileSystem>, config: ConfigFile, project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let settings = config.settings();
        let source_root = project_root.join(&settings.source_dir);
        let output_root = project_root.join(&settings.output_dir);
        let production = settings.production;

        let records: Box<dyn RecordStore> = match settings.record_storage {
            RecordStorageMode::File => Box::new(FileRecordStore::new(project_root.clone(), fs.clone())),
            RecordStorageMode::Memory => Box::new(MemoryRecordStore::new()),
        };

        Self {
            fs,
            config,
            project_root,
            source_root,
            output_root,
            production,
            records: Mutex::new(records),
            hashes: HashCache::new(),
            broadcaster: ReloadBroadcaster::new(),
            cleaned: AtomicBool::new(false),
        }
    }

    /// Force optimized output regardless of `[config].production`.
    pub fn with_production(mut self, production: bool) -> Self {
        self.production |= production;
        self
    }

    /// Treat the output directory as already cleaned for this process
    /// (`build --no-clean`, `watch`).
    pub fn skip_clean(self) -> Self {
        self.cleaned.store(true, Ordering::SeqCst);
        self
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.config.tasks().get(name)
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn production(&self) -> bool {
        self.production
    }

    pub fn hashes(&self) -> &HashCache {
        &self.hashes
    }

    pub fn broadcaster(&self) -> &ReloadBroadcaster {
        &self.broadcaster
    }

    /// Claim the once-per-process clean. Returns `false` if it already ran.
    pub(crate) fn claim_clean(&self) -> bool {
        !self.cleaned.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn release_clean(&self) {
        self.cleaned.store(false, Ordering::SeqCst);
    }

    /// Load a task's record. A record that cannot be read starts empty, which
    /// only costs a full rebuild of that task.
    pub fn load_record(&self, task: &str) -> BuildRecord {
        let store = self.records.lock().unwrap_or_else(|e| e.into_inner());
        store.load(task).unwrap_or_else(|err| {
            warn!(task = %task, error = %err, "could not load build record; rebuilding from scratch");
            BuildRecord::default()
        })
    }

    pub fn save_record(&self, task: &str, record: &BuildRecord) {
        let mut store = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(err) = store.save(task, record) {
            warn!(task = %task, error = %err, "could not save build record");
        }
    }

    /// Drop stored records of tasks that are no longer configured.
    pub fn prune_records(&self) {
        let names: Vec<&str> = self.config.tasks().keys().map(String::as_str).collect();
        let mut store = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(err) = store.prune(&names) {
            warn!(error = %err, "failed to prune stale build records");
        }
    }
}
