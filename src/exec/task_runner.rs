// src/exec/task_runner.rs

//! Runs one scheduled task on the blocking pool and reports back.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::CLEAN_TASK;
use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::build::build_task;
use crate::exec::clean::clean_output;
use crate::exec::context::BuildContext;

/// Execute a scheduled task and always emit exactly one `TaskCompleted`.
///
/// All per-file work happens inside the blocking section, so every write
/// (and every reload notice) is done before the completion is sent.
pub async fn run_task(task: ScheduledTask, ctx: Arc<BuildContext>, runtime_tx: mpsc::Sender<RuntimeEvent>) {
    let name = task.name.clone();
    let run_id = task.run_id;

    let outcome = match execute(&name, ctx).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(task = %name, run_id, error = %format!("{err:#}"), "task failed");
            TaskOutcome::Failed
        }
    };

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: name.clone(),
            outcome,
        })
        .await
        .is_err()
    {
        debug!(task = %name, run_id, "runtime gone; dropping completion");
    }
}

async fn execute(name: &str, ctx: Arc<BuildContext>) -> Result<TaskOutcome> {
    let owned = name.to_string();
    let outcome = tokio::task::spawn_blocking(move || -> Result<TaskOutcome> {
        if owned == CLEAN_TASK {
            clean_output(&ctx)?;
            return Ok(TaskOutcome::Success);
        }

        let report = build_task(&ctx, &owned)?;
        if report.is_failure() {
            info!(task = %owned, failed = report.failed, "every attempted file failed");
            Ok(TaskOutcome::Failed)
        } else {
            Ok(TaskOutcome::Success)
        }
    })
    .await
    .with_context(|| format!("joining task '{name}'"))??;

    Ok(outcome)
}
