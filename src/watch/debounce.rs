// src/watch/debounce.rs

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::engine::TaskName;
use crate::watch::event_handler::WatchEvent;

#[derive(Debug)]
struct Burst {
    last: Instant,
    events: usize,
}

/// Per-task quiet-period debouncer.
///
/// Each task's events are coalesced until no new event for that task has
/// arrived for `quiet`; the task is then reported once. Tasks settle
/// independently of each other.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: BTreeMap<TaskName, Burst>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, event: &WatchEvent, now: Instant) {
        let burst = self
            .pending
            .entry(event.task.clone())
            .or_insert(Burst { last: now, events: 0 });
        burst.last = now;
        burst.events += 1;
    }

    /// Earliest instant at which some task settles.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|b| b.last + self.quiet).min()
    }

    /// Remove and return every task whose burst has settled by `now`.
    pub fn take_ready(&mut self, now: Instant) -> Vec<TaskName> {
        let ready: Vec<TaskName> = self
            .pending
            .iter()
            .filter(|(_, b)| now >= b.last + self.quiet)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &ready {
            if let Some(burst) = self.pending.remove(name) {
                debug!(task = %name, events = burst.events, "change burst settled");
            }
        }
        ready
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
