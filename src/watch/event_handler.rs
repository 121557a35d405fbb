// src/watch/event_handler.rs

//! Turning raw notify events into per-task [`WatchEvent`]s.

use std::path::PathBuf;

use notify::event::ModifyKind;
use notify::{Event, EventKind};
use tracing::trace;

use crate::engine::TaskName;
use crate::watch::path_utils::{is_temp_file, under_root};
use crate::watch::patterns::TaskWatchProfile;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Deleted,
}

/// A filesystem change attributed to the task that owns the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub task: TaskName,
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

/// Map a notify event kind; `None` for events that cannot change content
/// (access, metadata-only, ...).
pub fn classify(kind: &EventKind) -> Option<WatchEventKind> {
    match kind {
        EventKind::Create(_) => Some(WatchEventKind::Created),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) | EventKind::Any => Some(WatchEventKind::Modified),
        EventKind::Remove(_) => Some(WatchEventKind::Deleted),
        _ => None,
    }
}

/// One `WatchEvent` per (path, owning task) pair in `event`.
///
/// Editor temp files and paths no task owns produce nothing.
pub fn watch_events(profiles: &[TaskWatchProfile], event: &Event) -> Vec<WatchEvent> {
    let Some(kind) = classify(&event.kind) else {
        trace!(kind = ?event.kind, "ignoring non-content event");
        return Vec::new();
    };

    let mut out = Vec::new();
    for path in &event.paths {
        if is_temp_file(path) {
            trace!(?path, "ignoring editor temp file");
            continue;
        }
        for profile in profiles {
            let Some(path) = under_root(profile.source_root(), path) else {
                continue;
            };
            if profile.matches(&path) {
                out.push(WatchEvent {
                    task: profile.name().to_string(),
                    path,
                    kind,
                });
            }
        }
    }
    out
}
