// src/freshness/detector.rs

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::freshness::cache::HashCache;
use crate::freshness::record::{BuildRecord, GlobRecord};
use crate::freshness::signature::glob_signature;
use crate::fs::FileSystem;

/// Decides whether a source needs rebuilding.
///
/// Querying never mutates the record: a source is only recorded as built by
/// the task runner, after its outputs were written.
pub struct ChangeDetector<'a> {
    fs: &'a dyn FileSystem,
    record: &'a BuildRecord,
    cache: &'a HashCache,
    /// Files that may have been pulled into any source (the task's partials).
    /// Consulted only when a source has no record entry.
    fallback_inputs: &'a [PathBuf],
}

impl<'a> ChangeDetector<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        record: &'a BuildRecord,
        cache: &'a HashCache,
        fallback_inputs: &'a [PathBuf],
    ) -> Self {
        Self {
            fs,
            record,
            cache,
            fallback_inputs,
        }
    }

    /// `true` if `dest` is missing, or `source` (or anything it depends on)
    /// changed since it was last built into `dest`.
    ///
    /// Any error while inspecting the files counts as "changed".
    pub fn should_process(&self, source: &Path, dest: &Path) -> bool {
        if !self.fs.exists(dest) {
            trace!(?source, ?dest, "destination missing");
            return true;
        }

        match self.record.get(source) {
            Some(entry) => {
                if entry.outputs.iter().any(|out| !self.fs.exists(out)) {
                    debug!(?source, "a recorded output is missing");
                    return true;
                }
                if self.hash_differs(source, &entry.hash) {
                    debug!(?source, "source content changed");
                    return true;
                }
                if entry
                    .dependencies
                    .iter()
                    .any(|(dep, hash)| self.hash_differs(dep, hash))
                {
                    return true;
                }
                entry.globs.iter().any(|glob| self.glob_differs(source, glob))
            }
            None => self.newer_than(source, dest)
                || self
                    .fallback_inputs
                    .iter()
                    .any(|input| self.newer_than(input, dest)),
        }
    }

    fn hash_differs(&self, path: &Path, recorded: &str) -> bool {
        if !self.fs.is_file(path) {
            return true;
        }
        match self.cache.get_or_compute(self.fs, path) {
            Ok(current) => current != recorded,
            Err(err) => {
                debug!(?path, error = %err, "hashing failed; treating as changed");
                true
            }
        }
    }

    fn glob_differs(&self, source: &Path, glob: &GlobRecord) -> bool {
        match glob_signature(self.fs, &glob.dir, &glob.pattern, source) {
            Ok(current) if current == glob.signature => false,
            Ok(_) => {
                debug!(?source, pattern = %glob.pattern, "glob matches changed");
                true
            }
            Err(err) => {
                debug!(?source, pattern = %glob.pattern, error = %err, "glob failed; treating as changed");
                true
            }
        }
    }

    fn newer_than(&self, input: &Path, dest: &Path) -> bool {
        match (self.fs.modified(input), self.fs.modified(dest)) {
            (Ok(src), Ok(out)) => src > out,
            _ => true,
        }
    }
}
