// src/exec/executor_loop.rs

//! Background loop that turns scheduled tasks into running Tokio tasks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::exec::context::BuildContext;
use crate::exec::task_runner::run_task;

/// Spawn the background executor loop.
///
/// Each scheduled task runs in its own Tokio task. Per task name there is
/// never more than one pass in flight: a new pass for a task that is still
/// running waits for the previous one to finish first.
pub fn spawn_executor(
    ctx: Arc<BuildContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        info!("executor loop started");
        let mut active: HashMap<String, JoinHandle<()>> = HashMap::new();

        while let Some(task) = rx.recv().await {
            active.retain(|_, handle| !handle.is_finished());

            let previous = active.remove(&task.name);
            if previous.is_some() {
                debug!(task = %task.name, run_id = task.run_id, "previous pass still running; chaining");
            }

            let name = task.name.clone();
            let ctx = Arc::clone(&ctx);
            let rt_tx = runtime_tx.clone();
            let handle = tokio::spawn(async move {
                if let Some(previous) = previous {
                    let _ = previous.await;
                }
                run_task(task, ctx, rt_tx).await;
            });
            active.insert(name, handle);
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}
