// src/freshness/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use anyhow::Result;
use tracing::debug;

use crate::freshness::signature::hash_file;
use crate::fs::FileSystem;

/// In-memory cache of file hashes, keyed by path and validated by mtime.
///
/// A file is only re-read when its modification time differs from the one
/// recorded alongside the cached hash.
#[derive(Debug, Default)]
pub struct HashCache {
    hashes: Mutex<HashMap<PathBuf, (SystemTime, String)>>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the hash for a file, computing and caching it if necessary.
    pub fn get_or_compute(&self, fs: &dyn FileSystem, path: &Path) -> Result<String> {
        let modified = fs.modified(path)?;

        {
            let hashes = self.hashes.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((mtime, hash)) = hashes.get(path) {
                if *mtime == modified {
                    return Ok(hash.clone());
                }
            }
        }

        debug!("cache miss: computing hash for {:?}", path);
        let hash = hash_file(fs, path)?;
        self.hashes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_path_buf(), (modified, hash.clone()));
        Ok(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
