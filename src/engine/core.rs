// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! [`CoreRuntime`] consumes [`RuntimeEvent`]s and produces an updated state
//! plus a list of [`CoreCommand`]s describing what the IO shell should do
//! next. It owns no channels and performs no IO, so it can be unit tested
//! without Tokio or a filesystem.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{handle_task_completion, handle_task_trigger, CoreStep};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RunReport, RuntimeEvent, RuntimeOptions};
use crate::types::TriggerWhileRunningBehaviour;

#[cfg(test)]
use crate::engine::event_handlers::CoreCommand;

/// Pure core runtime state: scheduler, trigger queue, options and the
/// report of what ran so far.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: TriggerQueue,
    options: RuntimeOptions,
    report: RunReport,
}

impl CoreRuntime {
    pub fn new(
        scheduler: Scheduler,
        behaviour: TriggerWhileRunningBehaviour,
        queue_length: usize,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            scheduler,
            queue: TriggerQueue::new(behaviour, queue_length),
            options,
            report: RunReport::default(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Switch between one-shot and long-running mode (e.g. after the initial
    /// build of `dev`).
    pub fn set_exit_when_idle(&mut self, exit_when_idle: bool) {
        self.options.exit_when_idle = exit_when_idle;
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Hand out the accumulated report, leaving an empty one behind.
    pub fn take_report(&mut self) -> RunReport {
        std::mem::take(&mut self.report)
    }

    /// Handle a single runtime event, returning commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskTriggered { task, reason } => handle_task_trigger(
                &mut self.scheduler,
                &mut self.queue,
                &self.options,
                task,
                reason,
            ),
            RuntimeEvent::TaskCompleted { task, outcome } => handle_task_completion(
                &mut self.scheduler,
                &mut self.queue,
                &self.options,
                &mut self.report,
                task,
                outcome,
            ),
            RuntimeEvent::ShutdownRequested => {
                self.report.interrupted = true;
                CoreStep {
                    commands: Vec::new(),
                    keep_running: false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig, CLEAN_TASK};
    use crate::engine::{TaskOutcome, TriggerReason};
    use crate::types::TaskKind;

    fn core(exit_when_idle: bool) -> CoreRuntime {
        core_with(TriggerWhileRunningBehaviour::Queue, exit_when_idle)
    }

    fn core_with(behaviour: TriggerWhileRunningBehaviour, exit_when_idle: bool) -> CoreRuntime {
        let mut raw = RawConfigFile::default();
        raw.task.insert(
            "html".to_string(),
            TaskConfig::new(TaskKind::Html, &["**/*.html"], "."),
        );
        raw.task.insert(
            "styles".to_string(),
            TaskConfig::new(TaskKind::Styles, &["styles/*.css"], "css"),
        );
        let cfg = ConfigFile::try_from(raw).unwrap();
        CoreRuntime::new(
            Scheduler::from_config(&cfg),
            behaviour,
            1,
            RuntimeOptions { exit_when_idle },
        )
    }

    fn trigger(task: &str, reason: TriggerReason) -> RuntimeEvent {
        RuntimeEvent::TaskTriggered {
            task: task.to_string(),
            reason,
        }
    }

    fn done(task: &str, outcome: TaskOutcome) -> RuntimeEvent {
        RuntimeEvent::TaskCompleted {
            task: task.to_string(),
            outcome,
        }
    }

    fn dispatched(step: &CoreStep) -> Vec<String> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchTasks(tasks) => Some(tasks.iter().map(|t| t.name.clone())),
                CoreCommand::RequestExit => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn one_shot_build_exits_with_report() {
        let mut core = core(true);

        let step = core.step(trigger(CLEAN_TASK, TriggerReason::Manual));
        assert_eq!(dispatched(&step), vec!["clean"]);

        let step = core.step(done(CLEAN_TASK, TaskOutcome::Success));
        assert_eq!(dispatched(&step), vec!["html", "styles"]);

        core.step(done("html", TaskOutcome::Success));
        let step = core.step(done("styles", TaskOutcome::Failed));
        assert!(!step.keep_running);
        assert!(step.commands.contains(&CoreCommand::RequestExit));

        let report = core.take_report();
        assert!(report.succeeded.contains("html"));
        assert!(report.failed.contains("styles"));
        assert!(!report.is_success());
    }

    #[test]
    fn retrigger_of_running_task_is_queued_for_next_run() {
        let mut core = core(false);
        core.scheduler.assume_built();

        let step = core.step(trigger("styles", TriggerReason::FileWatch));
        assert_eq!(dispatched(&step), vec!["styles"]);

        let step = core.step(trigger("styles", TriggerReason::FileWatch));
        assert!(dispatched(&step).is_empty());
        assert!(!core.queue_is_empty());

        let step = core.step(done("styles", TaskOutcome::Success));
        assert_eq!(dispatched(&step), vec!["styles"]);
        assert!(core.queue_is_empty());
    }

    #[test]
    fn unrelated_trigger_merges_into_active_run() {
        let mut core = core(false);
        core.scheduler.assume_built();

        core.step(trigger("styles", TriggerReason::FileWatch));
        let step = core.step(trigger("html", TriggerReason::FileWatch));
        assert_eq!(dispatched(&step), vec!["html"]);
        assert_eq!(core.scheduler().current_run_id(), Some(1));
    }

    #[test]
    fn cancel_mode_reruns_every_retriggered_task() {
        let mut core = core_with(TriggerWhileRunningBehaviour::Cancel, false);
        core.scheduler.assume_built();

        core.step(trigger("styles", TriggerReason::FileWatch));
        core.step(trigger("html", TriggerReason::FileWatch));
        core.step(trigger("styles", TriggerReason::FileWatch));
        core.step(trigger("html", TriggerReason::FileWatch));

        core.step(done("styles", TaskOutcome::Success));
        let step = core.step(done("html", TaskOutcome::Success));
        assert_eq!(dispatched(&step), vec!["html", "styles"]);
        assert!(core.queue_is_empty());
    }

    #[test]
    fn shutdown_marks_report_interrupted() {
        let mut core = core(false);
        let step = core.step(RuntimeEvent::ShutdownRequested);
        assert!(!step.keep_running);
        assert!(core.report().interrupted);
    }
}
