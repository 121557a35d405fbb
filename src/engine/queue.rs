// src/engine/queue.rs

use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::engine::TaskName;
use crate::types::TriggerWhileRunningBehaviour;

/// Triggers that arrive for tasks already taking part in the active run.
///
/// - Each entry is the trigger set of one future run, oldest first.
/// - A task appears at most once per batch, so a batch never loses a task:
///   re-triggering only decides how many extra runs a task gets.
/// - `Queue`: every re-trigger asks for one more run of that task, up to
///   `max_runs` (`queue_length`) queued runs per task.
/// - `Cancel`: a re-trigger supersedes the task's earlier queued entry, so
///   each task has at most one queued run. Other tasks are untouched.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: TriggerWhileRunningBehaviour,
    max_runs: usize,
    runs: VecDeque<BTreeSet<TaskName>>,
}

impl TriggerQueue {
    /// `max_runs` is clamped to at least 1.
    pub fn new(behaviour: TriggerWhileRunningBehaviour, max_runs: usize) -> Self {
        Self {
            behaviour,
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Number of queued runs currently holding `task`.
    pub fn queued_runs_of(&self, task: &str) -> usize {
        self.runs.iter().filter(|batch| batch.contains(task)).count()
    }

    /// Record a trigger for a task that is already in the active run.
    pub fn record_trigger(&mut self, task: &str) {
        let limit = match self.behaviour {
            TriggerWhileRunningBehaviour::Queue => self.max_runs,
            TriggerWhileRunningBehaviour::Cancel => 1,
        };

        let queued = self.queued_runs_of(task);
        if queued >= limit {
            debug!(
                task = %task,
                queued,
                limit,
                behaviour = ?self.behaviour,
                "trigger coalesced into an already queued run"
            );
            return;
        }

        // First batch that does not hold the task yet; batches hold every
        // earlier trigger of it, so runs of a task stay consecutive.
        match self.runs.iter_mut().find(|batch| !batch.contains(task)) {
            Some(batch) => {
                batch.insert(task.to_string());
            }
            None => self.runs.push_back(BTreeSet::from([task.to_string()])),
        }
        debug!(task = %task, queued = queued + 1, "queued trigger for a later run");
    }

    /// Take the trigger set of the next queued run, sorted by name.
    pub fn pop_next_run(&mut self) -> Vec<TaskName> {
        let next = self.runs.pop_front().unwrap_or_default();
        if !next.is_empty() {
            debug!(tasks = next.len(), remaining = self.runs.len(), "took queued run");
        }
        next.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn distinct_tasks_share_one_run() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Queue, 1);
        q.record_trigger("styles");
        q.record_trigger("html");
        q.record_trigger("styles");
        assert_eq!(q.pop_next_run(), names(&["html", "styles"]));
        assert!(q.is_empty());
    }

    #[test]
    fn queue_length_bounds_extra_runs_per_task() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Queue, 2);
        q.record_trigger("styles");
        q.record_trigger("styles");
        q.record_trigger("styles");
        q.record_trigger("html");

        assert_eq!(q.queued_runs_of("styles"), 2);
        assert_eq!(q.pop_next_run(), names(&["html", "styles"]));
        assert_eq!(q.pop_next_run(), names(&["styles"]));
        assert!(q.pop_next_run().is_empty());
    }

    #[test]
    fn cancel_mode_never_drops_other_tasks() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Cancel, 3);
        q.record_trigger("styles");
        q.record_trigger("html");
        q.record_trigger("styles");
        q.record_trigger("html");

        assert_eq!(q.queued_runs_of("styles"), 1);
        assert_eq!(q.pop_next_run(), names(&["html", "styles"]));
        assert!(q.is_empty());
    }

    #[test]
    fn zero_length_is_clamped() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Queue, 0);
        q.record_trigger("images");
        assert!(!q.is_empty());
    }
}
