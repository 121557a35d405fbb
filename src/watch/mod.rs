// src/watch/mod.rs

//! File watching.
//!
//! This module:
//! - maps each task's source patterns (partials included) to the task
//!   ([`patterns`]);
//! - turns notify events into per-task [`WatchEvent`]s, dropping editor temp
//!   files and metadata-only changes ([`event_handler`]);
//! - debounces them per task ([`debounce`]) and feeds one trigger per settled
//!   burst into the runtime ([`watcher`]).
//!
//! It does not know about the task graph; dependents are pulled in by the
//! scheduler.

pub mod debounce;
pub mod event_handler;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use debounce::Debouncer;
pub use event_handler::{watch_events, WatchEvent, WatchEventKind};
pub use patterns::{build_profiles_from_config, owners_of, watch_roots, TaskWatchProfile};
pub use watcher::{spawn_watcher, WatcherHandle};
