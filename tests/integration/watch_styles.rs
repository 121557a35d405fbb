// tests/integration/watch_styles.rs

use std::error::Error;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

use sitepipe::config::load_or_default;
use sitepipe::engine::{RuntimeEvent, TriggerReason};
use sitepipe::watch::{build_profiles_from_config, spawn_watcher};
use sitepipe_test_utils::{init_tracing, with_timeout, write_file};

type TestResult = Result<(), Box<dyn Error>>;

async fn next_trigger(rx: &mut mpsc::Receiver<RuntimeEvent>) -> Option<(String, TriggerReason)> {
    match rx.recv().await? {
        RuntimeEvent::TaskTriggered { task, reason } => Some((task, reason)),
        other => panic!("unexpected event from watcher: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn editing_a_style_partial_triggers_only_styles() -> TestResult {
    init_tracing();

    let dir = TempDir::new()?;
    let root = dir.path().canonicalize()?;
    write_file(&root, "src/scss/_vars.scss", "$brand: red;\n");
    write_file(&root, "src/scss/site.scss", "@import 'vars';\n");
    write_file(&root, "src/html/index.html", "<body></body>");

    let cfg = load_or_default(root.join("Sitepipe.toml"))?;
    let profiles = build_profiles_from_config(&cfg, &root.join("src"))?;

    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(16);
    let handle = spawn_watcher(profiles, Duration::from_millis(50), tx)?;
    assert!(handle.roots().contains(&root.join("src/scss")));

    // Give the OS watcher a moment to register.
    tokio::time::sleep(Duration::from_millis(100)).await;
    write_file(&root, "src/scss/_vars.scss", "$brand: blue;\n");
    // Several writes within the quiet period collapse into one trigger.
    write_file(&root, "src/scss/_vars.scss", "$brand: green;\n");

    let (task, reason) = with_timeout(next_trigger(&mut rx))
        .await
        .expect("watcher channel closed");
    assert_eq!(task, "styles");
    assert_eq!(reason, TriggerReason::FileWatch);

    let extra = timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(extra.is_err(), "unexpected extra trigger: {extra:?}");

    drop(handle);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn editor_temp_files_are_ignored() -> TestResult {
    init_tracing();

    let dir = TempDir::new()?;
    let root = dir.path().canonicalize()?;
    write_file(&root, "src/html/index.html", "<body></body>");

    let cfg = load_or_default(root.join("Sitepipe.toml"))?;
    let profiles = build_profiles_from_config(&cfg, &root.join("src"))?;

    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(16);
    let _handle = spawn_watcher(profiles, Duration::from_millis(50), tx)?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    write_file(&root, "src/html/.index.html.swp", "swap");
    write_file(&root, "src/html/index.html~", "backup");

    let extra = timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(extra.is_err(), "temp file triggered a rebuild: {extra:?}");
    Ok(())
}
