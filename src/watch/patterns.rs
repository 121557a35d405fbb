// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::model::ConfigFile;
use crate::engine::TaskName;
use crate::errors::Result;
use crate::fileset::FileSetSpec;

/// Which paths a task owns, for watching purposes.
///
/// A task owns everything its source patterns select, partials included:
/// editing a partial must re-run the task whose files include it.
#[derive(Clone)]
pub struct TaskWatchProfile {
    name: TaskName,
    spec: FileSetSpec,
}

impl fmt::Debug for TaskWatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskWatchProfile")
            .field("name", &self.name)
            .field("base", &self.spec.base())
            .finish()
    }
}

impl TaskWatchProfile {
    pub fn new(name: impl Into<TaskName>, spec: FileSetSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory to watch for this task.
    pub fn base(&self) -> &Path {
        self.spec.base()
    }

    pub fn source_root(&self) -> &Path {
        self.spec.source_root()
    }

    /// `path` must be absolute and under the same source root the profile
    /// was built with.
    pub fn matches(&self, path: &Path) -> bool {
        self.spec.matches(path)
    }
}

/// One profile per configured task, in task-name order.
///
/// `source_root` should be canonical, since notify reports canonical paths.
pub fn build_profiles_from_config(cfg: &ConfigFile, source_root: &Path) -> Result<Vec<TaskWatchProfile>> {
    cfg.tasks()
        .iter()
        .map(|(name, task)| {
            let spec = FileSetSpec::from_task(source_root, task)?;
            Ok(TaskWatchProfile::new(name.clone(), spec))
        })
        .collect()
}

/// Directories to register with the OS watcher: every task base, minus those
/// already covered by a recursive watch on an ancestor.
pub fn watch_roots(profiles: &[TaskWatchProfile]) -> Vec<PathBuf> {
    let mut bases: Vec<PathBuf> = profiles.iter().map(|p| p.base().to_path_buf()).collect();
    bases.sort();
    bases.dedup();

    let mut roots: Vec<PathBuf> = Vec::new();
    for base in bases {
        if !roots.iter().any(|root| base.starts_with(root)) {
            roots.push(base);
        }
    }
    roots
}

/// Names of the tasks owning `path`.
pub fn owners_of<'a>(profiles: &'a [TaskWatchProfile], path: &Path) -> Vec<&'a str> {
    profiles
        .iter()
        .filter(|p| p.matches(path))
        .map(TaskWatchProfile::name)
        .collect()
}
