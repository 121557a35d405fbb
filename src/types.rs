// src/types.rs

use std::str::FromStr;

use serde::Deserialize;

use crate::reload::ReloadKind;

/// Behaviour when a new trigger arrives while a run is already in progress.
///
/// - `Queue`: remember the trigger and start a new run when the current one
///   finishes (default behaviour).
/// - `Cancel`: drop any previously queued run and only keep the latest
///   trigger. The running tasks are never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    #[default]
    Queue,
    Cancel,
}

impl FromStr for TriggerWhileRunningBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(TriggerWhileRunningBehaviour::Queue),
            "cancel" => Ok(TriggerWhileRunningBehaviour::Cancel),
            other => Err(format!(
                "invalid triggered_while_running_behaviour: {other} (expected \"queue\" or \"cancel\")"
            )),
        }
    }
}

/// Where build records are kept between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordStorageMode {
    /// Store records under `.sitepipe/records/` next to the config file.
    File,
    /// Store records in memory only (lost on restart).
    #[default]
    Memory,
}

/// What a task does with its sources.
///
/// The kind selects the transform chain and the live-reload notice kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// HTML pages with `@@include(...)` expansion.
    Html,
    /// Stylesheets: import expansion, optional preprocessor, media grouping.
    Styles,
    /// Raster images: webp variant plus a re-encoded original.
    Images,
    /// Plain copy (fonts, downloadable files, ...).
    Copy,
    /// Scripts, optionally concatenated into a single bundle.
    Scripts,
}

impl TaskKind {
    /// Partial patterns used when a task does not declare its own.
    ///
    /// Files matching these are never emitted but can be pulled in by
    /// includes/imports.
    pub fn default_partials(self) -> Vec<String> {
        match self {
            TaskKind::Html | TaskKind::Styles => vec!["**/_*".to_string()],
            TaskKind::Images | TaskKind::Copy | TaskKind::Scripts => Vec::new(),
        }
    }

    /// Which kind of reload a change produced by this task requires.
    pub fn reload_kind(self) -> ReloadKind {
        match self {
            TaskKind::Html | TaskKind::Scripts => ReloadKind::Full,
            TaskKind::Styles => ReloadKind::Css,
            TaskKind::Images | TaskKind::Copy => ReloadKind::Asset,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Html => "html",
            TaskKind::Styles => "styles",
            TaskKind::Images => "images",
            TaskKind::Copy => "copy",
            TaskKind::Scripts => "scripts",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
