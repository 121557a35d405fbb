// src/config/validate.rs

use std::collections::BTreeMap;
use std::path::{Component, Path};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, CLEAN_TASK};
use crate::errors::{Result, SitepipeError};
use crate::fileset::compile_pattern;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SitepipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_names(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    validate_patterns(cfg)?;
    validate_destinations(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(SitepipeError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.queue_length == 0 {
        return Err(SitepipeError::ConfigError(
            "[config].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.config.server_port == u16::MAX {
        return Err(SitepipeError::ConfigError(
            "[config].server_port must leave room for the live-reload port (port + 1)"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_task_names(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.contains_key(CLEAN_TASK) {
        return Err(SitepipeError::ConfigError(format!(
            "task name '{CLEAN_TASK}' is reserved for the output cleaning step"
        )));
    }

    for (name, task) in cfg.task.iter() {
        if task.sources.is_empty() {
            return Err(SitepipeError::ConfigError(format!(
                "task '{}' must declare at least one entry in `sources`",
                name
            )));
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(SitepipeError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            // `clean` is always an implicit dependency; naming it is harmless.
            if dep != CLEAN_TASK && !cfg.task.contains_key(dep) {
                return Err(SitepipeError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task
    // For:
    //   [task.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    graph.add_node(CLEAN_TASK);
    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
        graph.add_edge(CLEAN_TASK, name.as_str(), ());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(SitepipeError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                node
            )))
        }
    }
}

fn validate_patterns(cfg: &RawConfigFile) -> Result<()> {
    for task in cfg.task.values() {
        for pattern in task.sources.iter().chain(task.effective_partials().iter()) {
            let body = pattern.strip_prefix('!').unwrap_or(pattern);
            compile_pattern(body)?;
        }
    }
    Ok(())
}

/// Each task owns its own output subtree. Two tasks writing into the same
/// `dest`, one `dest` nested inside another, or a `dest` escaping the output
/// root is rejected. The output root itself (empty `dest`) may hold other
/// tasks' subtrees.
fn validate_destinations(cfg: &RawConfigFile) -> Result<()> {
    let mut owners: BTreeMap<String, &str> = BTreeMap::new();

    for (name, task) in cfg.task.iter() {
        let dest = Path::new(&task.dest);
        let escapes = dest
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SitepipeError::ConfigError(format!(
                "task '{}' has dest '{}' outside of the output directory",
                name, task.dest
            )));
        }

        let key = normalize_dest(&task.dest);
        if let Some(other) = owners.insert(key, name.as_str()) {
            return Err(SitepipeError::ConfigError(format!(
                "tasks '{}' and '{}' write to the same dest '{}'",
                other, name, task.dest
            )));
        }
    }

    for (outer, outer_task) in owners.iter().filter(|(key, _)| !key.is_empty()) {
        let prefix = format!("{outer}/");
        if let Some((inner, inner_task)) = owners.iter().find(|(key, _)| key.starts_with(&prefix)) {
            return Err(SitepipeError::ConfigError(format!(
                "dest '{}' of task '{}' overlaps dest '{}' of task '{}'",
                inner, inner_task, outer, outer_task
            )));
        }
    }
    Ok(())
}

fn normalize_dest(dest: &str) -> String {
    dest.split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}
