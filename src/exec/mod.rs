// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`context`] holds the shared build state (filesystem, roots, records,
//!   hash cache, reload broadcaster).
//! - [`clean`] wipes the output root once per process.
//! - [`build`] runs one task pass: resolve, filter, transform, write, record.
//! - [`task_runner`] runs a scheduled task on the blocking pool and reports
//!   its outcome to the runtime.
//! - [`executor_loop`] owns the background loop spawning task runners.
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`.

pub mod backend;
pub mod build;
pub mod clean;
pub mod context;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use build::{build_task, notices_for, plan_task, TaskPlan, TaskReport};
pub use clean::clean_output;
pub use context::BuildContext;
pub use executor_loop::spawn_executor;
