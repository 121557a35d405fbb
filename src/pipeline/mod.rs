// src/pipeline/mod.rs

//! Transform pipeline.
//!
//! Each task kind maps to an ordered chain of [`Stage`]s (see [`chain`]).
//! A [`Pipeline`] runs one source file through its chain and isolates
//! failures to that file; the task runner decides what to write.

pub mod asset;
pub mod bundle;
pub mod chain;
pub mod command;
pub mod images;
pub mod include;
pub mod runner;
pub mod stage;
pub mod styles;

use std::path::{Component, Path, PathBuf};

pub use asset::{Asset, GlobDependency};
pub use bundle::concat_assets;
pub use chain::{pipeline_for, primary_output};
pub use runner::Pipeline;
pub use stage::{Stage, StageContext};

/// Join `rel` onto `dir`, resolving `.` and `..` lexically.
pub(crate) fn join_normalized(dir: &Path, rel: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in dir.join(rel).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
