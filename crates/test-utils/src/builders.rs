#![allow(dead_code)]

use sitepipe::config::{ConfigFile, RawConfigFile, TaskConfig};
use sitepipe::types::{RecordStorageMode, TaskKind, TriggerWhileRunningBehaviour};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn source_dir(mut self, dir: &str) -> Self {
        self.config.config.source_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: &str) -> Self {
        self.config.config.output_dir = dir.into();
        self
    }

    pub fn production(mut self, val: bool) -> Self {
        self.config.config.production = val;
        self
    }

    pub fn record_storage(mut self, mode: RecordStorageMode) -> Self {
        self.config.config.record_storage = mode;
        self
    }

    pub fn behaviour(mut self, behaviour: TriggerWhileRunningBehaviour, queue_length: usize) -> Self {
        self.config.config.triggered_while_running_behaviour = behaviour;
        self.config.config.queue_length = queue_length;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(kind: TaskKind, source: &str) -> Self {
        Self {
            task: TaskConfig::new(kind, &[source], ""),
        }
    }

    pub fn source(mut self, pattern: &str) -> Self {
        self.task.sources.push(pattern.to_string());
        self
    }

    pub fn partial(mut self, pattern: &str) -> Self {
        self.task
            .partials
            .get_or_insert_with(Vec::new)
            .push(pattern.to_string());
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.task.dest = dest.to_string();
        self
    }

    pub fn bundle(mut self, name: &str) -> Self {
        self.task.bundle = Some(name.to_string());
        self
    }

    pub fn preprocess(mut self, cmd: &str) -> Self {
        self.task.preprocess = Some(cmd.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
