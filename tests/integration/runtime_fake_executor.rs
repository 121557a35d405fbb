// tests/integration/runtime_fake_executor.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use sitepipe::config::ConfigFile;
use sitepipe::dag::Scheduler;
use sitepipe::engine::{
    CoreRuntime, RunReport, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason,
    TriggerWhileRunningBehaviour,
};
use sitepipe::types::TaskKind;
use sitepipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use sitepipe_test_utils::fake_executor::FakeExecutor;
use sitepipe_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

/// fonts and html are independent; search reads html's output.
fn site_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task("html", TaskConfigBuilder::new(TaskKind::Html, "html/**/*.html").build())
        .with_task(
            "fonts",
            TaskConfigBuilder::new(TaskKind::Copy, "fonts/*").dest("fonts").build(),
        )
        .with_task(
            "search",
            TaskConfigBuilder::new(TaskKind::Copy, "search/*")
                .dest("search")
                .after("html")
                .build(),
        )
        .build()
}

async fn build_once(
    cfg: &ConfigFile,
    failing: &[&str],
) -> Result<(Vec<String>, RunReport), Box<dyn Error>> {
    let scheduler = Scheduler::from_config(cfg);
    let options = RuntimeOptions {
        exit_when_idle: true,
    };

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(rt_tx.clone(), executed.clone()).failing(failing);

    rt_tx
        .send(RuntimeEvent::TaskTriggered {
            task: "clean".to_string(),
            reason: TriggerReason::Manual,
        })
        .await?;

    let core = CoreRuntime::new(scheduler, TriggerWhileRunningBehaviour::Queue, 1, options);
    let mut runtime = Runtime::new(core, rt_rx, executor);

    let report = match timeout(Duration::from_secs(3), runtime.run()).await {
        Ok(result) => result?,
        Err(_) => panic!("runtime did not finish within 3 seconds"),
    };

    let tasks_run = executed.lock().unwrap().clone();
    Ok((tasks_run, report))
}

#[tokio::test]
async fn build_runs_clean_before_every_task() -> TestResult {
    init_tracing();

    let (tasks_run, report) = build_once(&site_config(), &[]).await?;

    assert_eq!(tasks_run, vec!["clean", "fonts", "html", "search"]);
    assert!(report.is_success());
    assert!(!report.interrupted);
    assert_eq!(report.succeeded.len(), 4);

    Ok(())
}

#[tokio::test]
async fn failed_task_blocks_dependents_but_not_siblings() -> TestResult {
    init_tracing();

    let (tasks_run, report) = build_once(&site_config(), &["html"]).await?;

    assert_eq!(tasks_run, vec!["clean", "fonts", "html"]);
    assert!(!report.is_success());
    assert!(report.succeeded.contains("fonts"));
    assert!(report.failed.contains("html"));
    assert!(report.failed.contains("search"));

    Ok(())
}

#[tokio::test]
async fn failed_clean_fails_the_whole_build() -> TestResult {
    init_tracing();

    let (tasks_run, report) = build_once(&site_config(), &["clean"]).await?;

    assert_eq!(tasks_run, vec!["clean"]);
    assert_eq!(report.failed.len(), 4);
    assert!(report.succeeded.is_empty());

    Ok(())
}
