// src/watch/watcher.rs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant as TokioInstant};
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, TriggerReason};
use crate::errors::WatchError;
use crate::watch::debounce::Debouncer;
use crate::watch::event_handler::watch_events;
use crate::watch::patterns::{watch_roots, TaskWatchProfile};

/// Keeps the OS watcher alive. Dropping it stops watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl WatcherHandle {
    /// Directories actually being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

/// Watch every task's base directory and send a debounced
/// `TaskTriggered { reason: FileWatch }` for the owning task of each change.
///
/// A base directory that cannot be watched is reported as a [`WatchError`]
/// and skipped; the remaining directories are still watched.
pub fn spawn_watcher(
    profiles: Vec<TaskWatchProfile>,
    quiet: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            // The receiver only goes away when the watcher loop ends.
            let _ = event_tx.send(res);
        },
        Config::default(),
    )?;

    let mut roots = Vec::new();
    for root in watch_roots(&profiles) {
        match watcher.watch(&root, RecursiveMode::Recursive) {
            Ok(()) => {
                debug!(root = ?root, "watching");
                roots.push(root);
            }
            Err(err) => {
                let err = WatchError {
                    path: root,
                    cause: err.to_string(),
                };
                warn!(error = %err, "directory not watched");
            }
        }
    }
    info!(roots = roots.len(), "file watcher started");

    tokio::spawn(async move {
        let mut debouncer = Debouncer::new(quiet);

        loop {
            let deadline = debouncer.next_deadline().map(TokioInstant::from_std);

            tokio::select! {
                received = event_rx.recv() => match received {
                    Some(Ok(event)) => {
                        let now = std::time::Instant::now();
                        for watch_event in watch_events(&profiles, &event) {
                            debug!(task = %watch_event.task, path = ?watch_event.path, kind = ?watch_event.kind, "source changed");
                            debouncer.push(&watch_event, now);
                        }
                    }
                    Some(Err(err)) => {
                        let err = WatchError {
                            path: err.paths.first().cloned().unwrap_or_default(),
                            cause: err.to_string(),
                        };
                        warn!(error = %err, "watch backend reported an error");
                    }
                    None => break,
                },
                _ = async {
                    if let Some(deadline) = deadline {
                        sleep_until(deadline).await;
                    }
                }, if deadline.is_some() => {}
            }

            for task in debouncer.take_ready(std::time::Instant::now()) {
                info!(task = %task, "sources changed; triggering task");
                let sent = runtime_tx
                    .send(RuntimeEvent::TaskTriggered {
                        task,
                        reason: TriggerReason::FileWatch,
                    })
                    .await;
                if sent.is_err() {
                    debug!("runtime gone; stopping watcher loop");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        roots,
    })
}
