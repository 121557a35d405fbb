// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::dag::{ScheduledTask, Scheduler, TaskRunState};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RunReport, RuntimeOptions, TaskName, TaskOutcome, TriggerReason};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Request that the loop exits (one-shot builds once idle).
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Handle a task trigger event.
///
/// - Idle scheduler: start a new run seeded with this trigger plus anything
///   already queued.
/// - Active run, task not part of it: merge it into the active run.
/// - Active run, task still `Pending`: nothing to do, it has not read its
///   sources yet.
/// - Active run, task running or finished: record it for a future run
///   according to the queue behaviour.
pub fn handle_task_trigger(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    options: &RuntimeOptions,
    task: TaskName,
    reason: TriggerReason,
) -> CoreStep {
    debug!(task = %task, ?reason, "task triggered");

    if scheduler.is_idle() {
        let mut triggers: BTreeSet<TaskName> = queue.pop_next_run().into_iter().collect();
        triggers.insert(task);
        let step = start_new_run_from_triggers(scheduler, triggers.into_iter().collect());
        return exit_if_idle(scheduler, queue, options, step.commands);
    }

    let mut commands = Vec::new();
    match scheduler.run_state_of(&task) {
        None => {
            debug!(task = %task, "trigger for unknown task; ignoring");
        }
        Some(TaskRunState::Idle) => {
            let newly_ready = scheduler.handle_trigger(&task);
            if !newly_ready.is_empty() {
                commands.push(CoreCommand::DispatchTasks(newly_ready));
            }
        }
        Some(TaskRunState::Pending) => {
            debug!(task = %task, "task already pending in this run; trigger absorbed");
        }
        Some(TaskRunState::Running | TaskRunState::Succeeded | TaskRunState::Failed) => {
            queue.record_trigger(&task);
        }
    }

    CoreStep::running(commands)
}

/// Handle a task completion event and fold its result into `report`.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    options: &RuntimeOptions,
    report: &mut RunReport,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let was_running = scheduler.run_state_of(&task) == Some(TaskRunState::Running);
    let step = scheduler.step_completion(&task, outcome);

    if was_running && outcome == TaskOutcome::Success {
        report.record_success(&task);
    }
    for failed in &step.newly_failed {
        report.record_failure(failed);
    }

    let mut commands = Vec::new();
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }
    if step.run_just_finished {
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "build run finished"
        );
    }

    commands.extend(maybe_start_queued_run(scheduler, queue));
    exit_if_idle(scheduler, queue, options, commands)
}

/// Seed a new run from a set of root triggers.
pub fn start_new_run_from_triggers(
    scheduler: &mut Scheduler,
    triggers: Vec<TaskName>,
) -> CoreStep {
    if triggers.is_empty() {
        return CoreStep::running(Vec::new());
    }

    scheduler.start_new_run();

    let mut all_ready = Vec::new();
    for task in triggers {
        all_ready.extend(scheduler.handle_trigger(&task));
    }

    let mut commands = Vec::new();
    if !all_ready.is_empty() {
        commands.push(CoreCommand::DispatchTasks(all_ready));
    }
    CoreStep::running(commands)
}

/// If the scheduler is idle and there are queued triggers, start a new run.
fn maybe_start_queued_run(scheduler: &mut Scheduler, queue: &mut TriggerQueue) -> Vec<CoreCommand> {
    if !scheduler.is_idle() {
        return Vec::new();
    }

    let triggers = queue.pop_next_run();
    if triggers.is_empty() {
        return Vec::new();
    }

    debug!(?triggers, "starting queued run");
    start_new_run_from_triggers(scheduler, triggers).commands
}

fn exit_if_idle(
    scheduler: &Scheduler,
    queue: &TriggerQueue,
    options: &RuntimeOptions,
    mut commands: Vec<CoreCommand>,
) -> CoreStep {
    if options.exit_when_idle && scheduler.is_idle() && queue.is_empty() {
        commands.push(CoreCommand::RequestExit);
        return CoreStep {
            commands,
            keep_running: false,
        };
    }
    CoreStep::running(commands)
}
