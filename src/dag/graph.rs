// src/dag/graph.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, CLEAN_TASK};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies: tasks that must finish before this one can run.
    deps: Vec<String>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<String>,
}

/// In-memory task graph keyed by task name.
///
/// Always contains the implicit [`CLEAN_TASK`] root, which every configured
/// task depends on. Acyclicity is checked in `config::validate`; here we only
/// keep adjacency for scheduling.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: BTreeMap<String, DagNode>,
}

impl DagGraph {
    /// Build the graph from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut nodes: BTreeMap<String, DagNode> = BTreeMap::new();
        nodes.insert(CLEAN_TASK.to_string(), DagNode::default());

        for (name, task) in cfg.task.iter() {
            let mut deps = vec![CLEAN_TASK.to_string()];
            deps.extend(task.after.iter().filter(|d| *d != CLEAN_TASK).cloned());
            nodes.insert(
                name.clone(),
                DagNode {
                    deps,
                    dependents: Vec::new(),
                },
            );
        }

        let edges: Vec<(String, String)> = nodes
            .iter()
            .flat_map(|(name, node)| node.deps.iter().map(move |dep| (dep.clone(), name.clone())))
            .collect();
        for (dep, dependent) in edges {
            if let Some(dep_node) = nodes.get_mut(&dep) {
                dep_node.dependents.push(dependent);
            }
        }

        Self { nodes }
    }

    /// All task names, `clean` included, in name order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Immediate dependencies of a task (`clean` plus its `after` list).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}
