// tests/integration/scenarios.rs

//! End-to-end builds against a real project directory.

use std::error::Error;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tempfile::TempDir;
use tokio::sync::mpsc;

use sitepipe::config::{load_or_default, ConfigFile};
use sitepipe::dag::Scheduler;
use sitepipe::engine::{
    CoreRuntime, RunReport, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason,
    TriggerWhileRunningBehaviour,
};
use sitepipe::exec::{build_task, BuildContext, RealExecutorBackend};
use sitepipe::fs::RealFileSystem;
use sitepipe_test_utils::{init_tracing, with_timeout, write_file};

type TestResult = Result<(), Box<dyn Error>>;

fn png_bytes() -> Vec<u8> {
    let img = RgbaImage::from_fn(4, 4, |x, y| Rgba([(x * 60) as u8, (y * 60) as u8, 128, 255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// A small project using the built-in task set.
fn project() -> (TempDir, ConfigFile) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_file(root, "src/html/index.html", "<body>@@include('_header.html', {\"title\": \"Home\"})</body>");
    write_file(root, "src/html/about/index.html", "<body>@@include('../_header.html')</body>");
    write_file(root, "src/html/_header.html", "<h1>@@title</h1>");
    write_file(root, "src/scss/_vars.scss", ".brand { color: red; }\n");
    write_file(root, "src/scss/site.scss", "@import 'vars';\nbody { margin: 0; }\n");
    write_file(root, "src/js/a.js", "console.log('a');\n");
    write_file(root, "src/js/b.js", "console.log('b');\n");
    write_file(root, "src/fonts/body.woff2", "font");
    write_file(root, "src/images/photo.png", png_bytes());

    let cfg = load_or_default(root.join("Sitepipe.toml")).unwrap();
    (dir, cfg)
}

fn context(root: &Path, cfg: ConfigFile) -> BuildContext {
    BuildContext::new(Arc::new(RealFileSystem), cfg, root)
}

async fn run_build(ctx: Arc<BuildContext>, cfg: &ConfigFile) -> Result<RunReport, Box<dyn Error>> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = RealExecutorBackend::new(ctx, rt_tx.clone());
    let core = CoreRuntime::new(
        Scheduler::from_config(cfg),
        TriggerWhileRunningBehaviour::Queue,
        1,
        RuntimeOptions {
            exit_when_idle: true,
        },
    );

    rt_tx
        .send(RuntimeEvent::TaskTriggered {
            task: "clean".to_string(),
            reason: TriggerReason::Manual,
        })
        .await?;

    let mut runtime = Runtime::new(core, rt_rx, executor);
    Ok(with_timeout(runtime.run()).await?)
}

fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let bytes = std::fs::read(&path).unwrap();
                files.push((path.strip_prefix(root).unwrap().to_path_buf(), bytes));
            }
        }
    }
    files.sort();
    files
}

#[tokio::test(flavor = "multi_thread")]
async fn full_build_produces_the_site() -> TestResult {
    init_tracing();
    let (dir, cfg) = project();
    let root = dir.path();
    // Stale output from an earlier build must be wiped.
    write_file(root, "docs/old.html", "stale");

    let ctx = Arc::new(context(root, cfg.clone()));
    let report = run_build(ctx, &cfg).await?;
    assert!(report.is_success(), "report: {report:?}");

    let docs = root.join("docs");
    assert!(!docs.join("old.html").exists());
    assert!(!docs.join("_header.html").exists());
    assert!(!docs.join("css/_vars.css").exists());

    let index = std::fs::read_to_string(docs.join("index.html"))?;
    assert!(index.contains("<h1>Home</h1>"));
    assert!(docs.join("about/index.html").is_file());
    assert!(docs.join("css/site.css").is_file());
    assert!(docs.join("fonts/body.woff2").is_file());
    assert!(docs.join("images/photo.webp").is_file());
    assert!(docs.join("images/photo.png").is_file());

    let bundle = std::fs::read_to_string(docs.join("js/app.js"))?;
    let a = bundle.find("'a'").unwrap();
    let b = bundle.find("'b'").unwrap();
    assert!(a < b, "bundle parts out of order: {bundle}");

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rebuilding_from_scratch_is_byte_identical() -> TestResult {
    init_tracing();
    let (dir, cfg) = project();
    let root = dir.path();
    let docs = root.join("docs");

    let first = run_build(Arc::new(context(root, cfg.clone())), &cfg).await?;
    assert!(first.is_success());
    let before = snapshot(&docs);

    std::fs::remove_dir_all(&docs)?;
    let second = run_build(Arc::new(context(root, cfg.clone())), &cfg).await?;
    assert!(second.is_success());

    assert_eq!(snapshot(&docs), before);
    Ok(())
}

#[test]
fn editing_a_partial_rebuilds_every_page_that_includes_it() {
    init_tracing();
    let (dir, cfg) = project();
    let root = dir.path();
    let ctx = context(root, cfg);

    let first = build_task(&ctx, "html").unwrap();
    assert_eq!(first.processed, 2);
    assert_eq!(build_task(&ctx, "html").unwrap().processed, 0);

    write_file(root, "src/html/_header.html", "<h2>@@title</h2>");
    let second = build_task(&ctx, "html").unwrap();
    assert_eq!(second.processed, 2);

    let index = std::fs::read_to_string(root.join("docs/index.html")).unwrap();
    assert!(index.contains("<h2>Home</h2>"));
    assert!(!root.join("docs/_header.html").exists());
}

#[test]
fn one_broken_page_does_not_stop_the_others() {
    init_tracing();
    let (dir, cfg) = project();
    let root = dir.path();
    write_file(root, "src/html/broken.html", "@@include('_missing.html')");
    let ctx = context(root, cfg);

    let report = build_task(&ctx, "html").unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.failed, 1);
    assert!(!report.is_failure());
    assert!(root.join("docs/index.html").is_file());
    assert!(!root.join("docs/broken.html").exists());

    // The failed page stays stale until it is fixed.
    assert_eq!(build_task(&ctx, "html").unwrap().processed, 1);
}
