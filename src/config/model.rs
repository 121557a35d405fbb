// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{RecordStorageMode, TaskKind, TriggerWhileRunningBehaviour};

/// Name of the implicit root task that wipes the output directory.
///
/// Every configured task depends on it; it cannot be declared in config.
pub const CLEAN_TASK: &str = "clean";

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// source_dir = "src"
/// output_dir = "docs"
/// server_port = 3000
///
/// [task.styles]
/// kind = "styles"
/// sources = ["scss/**/*.scss"]
/// dest = "css"
/// ```
///
/// All sections are optional. A file without any `[task.<name>]` section
/// gets the built-in task set (see [`builtin_tasks`]).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see
/// `config::validate`), so holders can rely on: known `after` references, an
/// acyclic task graph, compilable patterns and non-overlapping destinations.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, task: BTreeMap<String, TaskConfig>) -> Self {
        Self { config, task }
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn settings(&self) -> &ConfigSection {
        &self.config
    }
}

/// `[config]` section: global build and dev-server behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Emit optimized variants (stronger image compression).
    #[serde(default)]
    pub production: bool,

    /// Source root; task patterns are relative to it.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Output root; wiped by `clean`, task `dest` values are relative to it.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// HTTP port of the dev server; live reload listens on `server_port + 1`.
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    #[serde(default = "default_true")]
    pub open_browser_on_start: bool,

    /// `"queue"` (default) or `"cancel"`: whether a task re-triggered while
    /// running gets up to `queue_length` extra runs or at most one.
    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// Maximum number of queued runs kept per task in `queue` mode.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    /// `"memory"` (default) or `"file"`.
    #[serde(default)]
    pub record_storage: RecordStorageMode,

    /// Quiet period after the last filesystem event before a task re-runs.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("src")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("docs")
}

fn default_server_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_queue_length() -> usize {
    1
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            production: false,
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
            server_port: default_server_port(),
            open_browser_on_start: default_true(),
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            queue_length: default_queue_length(),
            record_storage: RecordStorageMode::default(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub kind: TaskKind,

    /// Glob patterns relative to `source_dir`. A leading `!` excludes.
    pub sources: Vec<String>,

    /// Patterns for files that are never emitted but may be included.
    ///
    /// If `None`, the kind's default applies (`**/_*` for html and styles).
    #[serde(default)]
    pub partials: Option<Vec<String>>,

    /// Subdirectory of `output_dir` this task writes into.
    #[serde(default)]
    pub dest: String,

    /// Concatenate all outputs into this single file (scripts).
    #[serde(default)]
    pub bundle: Option<String>,

    /// External command each file's content is piped through (stdin to
    /// stdout), e.g. `"sass --stdin"`.
    #[serde(default)]
    pub preprocess: Option<String>,

    /// Tasks that must finish before this one starts, in addition to `clean`.
    #[serde(default)]
    pub after: Vec<String>,
}

impl TaskConfig {
    pub fn new(kind: TaskKind, sources: &[&str], dest: &str) -> Self {
        Self {
            kind,
            sources: sources.iter().map(|s| s.to_string()).collect(),
            partials: None,
            dest: dest.to_string(),
            bundle: None,
            preprocess: None,
            after: Vec::new(),
        }
    }

    /// Partial patterns after applying the kind default.
    pub fn effective_partials(&self) -> Vec<String> {
        self.partials
            .clone()
            .unwrap_or_else(|| self.kind.default_partials())
    }
}

/// The task set used when the config declares none: the classic
/// `html / styles / images / fonts / files / scripts` layout.
pub fn builtin_tasks() -> BTreeMap<String, TaskConfig> {
    let mut tasks = BTreeMap::new();
    tasks.insert(
        "html".to_string(),
        TaskConfig::new(TaskKind::Html, &["html/**/*.html"], ""),
    );
    tasks.insert(
        "styles".to_string(),
        TaskConfig::new(TaskKind::Styles, &["scss/**/*.scss"], "css"),
    );
    tasks.insert(
        "images".to_string(),
        TaskConfig::new(TaskKind::Images, &["images/**/*"], "images"),
    );
    tasks.insert(
        "fonts".to_string(),
        TaskConfig::new(TaskKind::Copy, &["fonts/**/*"], "fonts"),
    );
    tasks.insert(
        "files".to_string(),
        TaskConfig::new(TaskKind::Copy, &["files/**/*"], "files"),
    );
    let mut scripts = TaskConfig::new(TaskKind::Scripts, &["js/*.js"], "js");
    scripts.bundle = Some("app.js".to_string());
    tasks.insert("scripts".to_string(), scripts);
    tasks
}
