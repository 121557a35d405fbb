// src/dag/state_manager.rs

//! Per-run state management for tasks in the scheduler.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::dag::DagGraph;
use crate::engine::TaskName;

/// Manages per-run state transitions for tasks.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut BTreeMap<TaskName, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        tasks: &'a mut BTreeMap<TaskName, TaskInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            graph,
            tasks,
            current_run_id,
        }
    }

    /// Include a triggered task and all its downstream dependents in this run.
    ///
    /// - Tasks not yet in the run are marked `Pending`; tasks already in the
    ///   run keep their state.
    /// - Upstream dependencies that are not in the run and have never
    ///   succeeded are pulled in as well (with their own dependents), since
    ///   nothing else would ever satisfy them.
    pub fn mark_task_and_dependents_pending(&mut self, root: &str) {
        let mut stack: Vec<TaskName> = vec![root.to_string()];
        let mut visited: HashSet<TaskName> = HashSet::new();

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }

            let Some(info) = self.tasks.get_mut(&name) else {
                warn!(task = %name, "node in DAG not present in tasks map");
                continue;
            };
            if info.run_state.is_none() {
                info.run_state = Some(RunState::Pending);
                debug!(task = %info.name, "marked Pending for this run");
            }

            stack.extend(self.graph.dependents_of(&name).iter().cloned());

            for dep in self.graph.dependencies_of(&name) {
                let never_built = self
                    .tasks
                    .get(dep)
                    .is_some_and(|d| d.run_state.is_none() && d.last_successful_run.is_none());
                if never_built {
                    debug!(task = %name, dep = %dep, "pulling never-built dependency into run");
                    stack.push(dep.clone());
                }
            }
        }
    }

    /// Whether all dependencies of `info` are satisfied for the current run.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        ReadOnlyStateManager::new(self.tasks).deps_satisfied_for_info(info)
    }

    /// Mark every `Pending`/`Running` dependent (transitively) of a failed
    /// task as `Failed` for this run.
    ///
    /// Returns the newly failed tasks, excluding `failed_task` itself.
    pub fn mark_dependents_failed(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut stack: Vec<TaskName> = self
            .graph
            .dependents_of(failed_task)
            .iter()
            .cloned()
            .collect();

        let mut newly_failed = Vec::new();

        while let Some(name) = stack.pop() {
            if let Some(info) = self.tasks.get_mut(&name)
                && matches!(info.run_state, Some(RunState::Pending) | Some(RunState::Running))
            {
                info.run_state = Some(RunState::Failed);
                if let Some(run_id) = self.current_run_id {
                    info.last_failed_run = Some(run_id);
                }
                debug!(task = %info.name, "dependency failed; marking Failed");
                newly_failed.push(info.name.clone());
                stack.extend(self.graph.dependents_of(&name).iter().cloned());
            }
        }

        newly_failed
    }

    /// Mark ready `Pending` tasks as `Running` and return them.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let candidates: Vec<TaskName> = self
            .tasks
            .values()
            .filter(|info| {
                info.run_state == Some(RunState::Pending) && self.deps_satisfied_for_info(info)
            })
            .map(|info| info.name.clone())
            .collect();

        let mut ready = Vec::with_capacity(candidates.len());
        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                let is_rebuild = info.last_successful_run.is_some() || info.last_failed_run.is_some();
                info!(
                    task = %info.name,
                    run_id = self.current_run_id,
                    rebuild = is_rebuild,
                    "scheduling task"
                );

                info.run_state = Some(RunState::Running);
                ready.push(ScheduledTask::from_task_info(
                    info,
                    self.current_run_id.unwrap_or(0),
                ));
            }
        }

        ready
    }

    /// No task is `Pending` or `Running`.
    pub fn all_tasks_terminal(&self) -> bool {
        !self.tasks.values().any(|info| {
            matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            )
        })
    }
}

/// Read-only view used when only shared access to the tasks map is available.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a BTreeMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a BTreeMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// A dependency is satisfied if it succeeded in this run, or it is not
    /// part of this run and succeeded in an earlier one.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep_name| {
            let Some(dep) = self.tasks.get(dep_name) else {
                warn!(task = %info.name, dep = %dep_name, "dependency missing from tasks map");
                return false;
            };
            match dep.run_state {
                Some(RunState::Succeeded) => true,
                Some(RunState::Failed | RunState::Pending | RunState::Running) => false,
                None => dep.last_successful_run.is_some(),
            }
        })
    }
}
