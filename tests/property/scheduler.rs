use std::collections::HashSet;

use proptest::prelude::*;
use sitepipe::config::ConfigFile;
use sitepipe::dag::{Scheduler, TaskRunState};
use sitepipe::engine::TaskOutcome;
use sitepipe::types::TaskKind;
use sitepipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};

// Strategy to generate a valid task graph.
// Acyclicity: task N may only depend on tasks 0..N-1.
fn dag_config_strategy(max_tasks: usize) -> impl Strategy<Value = ConfigFile> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        let deps_strat = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        );

        deps_strat.prop_map(move |raw_deps| {
            let mut builder = ConfigFileBuilder::new();
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let name = format!("task_{i}");
                let mut task_builder =
                    TaskConfigBuilder::new(TaskKind::Copy, &format!("files{i}/*"))
                        .dest(&format!("out{i}"));

                let valid_deps: HashSet<usize> = if i > 0 {
                    potential_deps.into_iter().map(|d| d % i).collect()
                } else {
                    HashSet::new()
                };
                for dep_idx in valid_deps {
                    task_builder = task_builder.after(&format!("task_{dep_idx}"));
                }
                builder = builder.with_task(&name, task_builder.build());
            }
            builder.build()
        })
    })
}

proptest! {
    #[test]
    fn every_run_reaches_idle(
        cfg in dag_config_strategy(10),
        triggers in proptest::collection::vec(0..11usize, 1..5),
        failing_indices in proptest::collection::vec(0..11usize, 0..5),
        built in any::<bool>(),
    ) {
        let mut scheduler = Scheduler::from_config(&cfg);
        if built {
            scheduler.assume_built();
        }
        let task_names: Vec<String> = scheduler.task_names().map(|s| s.to_string()).collect();

        let triggers: Vec<String> = triggers.iter()
            .filter(|&&i| i < task_names.len())
            .map(|&i| task_names[i].clone())
            .collect();
        let failing: HashSet<String> = failing_indices.iter()
            .filter(|&&i| i < task_names.len())
            .map(|&i| task_names[i].clone())
            .collect();

        let mut executing: Vec<String> = Vec::new();
        for t in &triggers {
            executing.extend(scheduler.handle_trigger(t).into_iter().map(|st| st.name));
        }

        let mut steps = 0;
        let max_steps = 1000;

        while !scheduler.is_idle() && steps < max_steps {
            steps += 1;

            // Not idle with nothing running means a Pending task was never
            // scheduled even though nothing can unblock it any more.
            prop_assert!(
                !executing.is_empty(),
                "run stalled with pending tasks: {:?}",
                scheduler.tasks_in_current_run()
                    .into_iter()
                    .filter(|t| scheduler.run_state_of(t) == Some(TaskRunState::Pending))
                    .collect::<Vec<_>>()
            );

            let task = executing.remove(0);
            let outcome = if failing.contains(&task) {
                TaskOutcome::Failed
            } else {
                TaskOutcome::Success
            };
            executing.extend(scheduler.handle_completion(&task, outcome).into_iter().map(|st| st.name));
        }

        prop_assert!(steps < max_steps, "simulation did not terminate");
        prop_assert!(scheduler.is_idle());
        prop_assert!(executing.is_empty());
        for name in &task_names {
            prop_assert_ne!(scheduler.run_state_of(name), Some(TaskRunState::Pending));
            prop_assert_ne!(scheduler.run_state_of(name), Some(TaskRunState::Running));
        }
    }

    #[test]
    fn no_task_runs_before_its_dependencies_succeed(
        cfg in dag_config_strategy(8),
    ) {
        let deps: Vec<(String, Vec<String>)> = cfg
            .task
            .iter()
            .map(|(name, task)| (name.clone(), task.after.clone()))
            .collect();

        let mut scheduler = Scheduler::from_config(&cfg);
        let mut executing: Vec<String> = scheduler
            .handle_trigger("clean")
            .into_iter()
            .map(|st| st.name)
            .collect();
        let mut finished: HashSet<String> = HashSet::new();

        while let Some(task) = executing.pop() {
            if task != "clean" {
                prop_assert!(finished.contains("clean"));
                let (_, after) = deps.iter().find(|(n, _)| *n == task).unwrap();
                for dep in after {
                    prop_assert!(finished.contains(dep), "{} ran before {}", task, dep);
                }
            }
            finished.insert(task.clone());
            executing.extend(scheduler.handle_completion(&task, TaskOutcome::Success).into_iter().map(|st| st.name));
        }

        prop_assert!(scheduler.is_idle());
        prop_assert_eq!(finished.len(), deps.len() + 1);
    }
}
