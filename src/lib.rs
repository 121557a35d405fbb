// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fileset;
pub mod freshness;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod reload;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{load_or_default, CLEAN_TASK};
use crate::dag::Scheduler;
use crate::engine::{CoreRuntime, RunReport, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use crate::exec::{plan_task, BuildContext, RealExecutorBackend};
use crate::fs::{FileSystem, RealFileSystem};
use crate::reload::{open_browser, DevServer};
use crate::watch::{build_profiles_from_config, spawn_watcher, WatcherHandle};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - scheduler / queue / runtime
/// - executor and build context
/// - file watcher and dev server (`watch`, `dev`)
/// - Ctrl-C handling
///
/// The returned report holds the latest outcome of every task that ran.
pub async fn run(args: CliArgs) -> Result<RunReport> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_or_default(&config_path)?;
    let project_root = config_root_dir(&config_path);
    let command = args.command();

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut ctx = BuildContext::new(fs, cfg.clone(), &project_root).with_production(args.production);
    let skips_clean = matches!(command, Command::Build { no_clean: true } | Command::Watch);
    if skips_clean {
        ctx = ctx.skip_clean();
    }

    if args.dry_run {
        print_dry_run(&ctx, !skips_clean)?;
        return Ok(RunReport::default());
    }

    ctx.prune_records();
    let ctx = Arc::new(ctx);

    let mut scheduler = Scheduler::from_config(&cfg);
    if command == Command::Watch {
        scheduler.assume_built();
    }

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = RealExecutorBackend::new(Arc::clone(&ctx), rt_tx.clone());

    let settings = cfg.settings();
    let options = RuntimeOptions {
        exit_when_idle: command != Command::Watch,
    };
    let core = CoreRuntime::new(
        scheduler,
        settings.triggered_while_running_behaviour,
        settings.queue_length,
        options,
    );
    let mut runtime = Runtime::new(core, rt_rx, executor);

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    match command {
        Command::Build { .. } => {
            trigger_build(&rt_tx).await?;
            let report = runtime.run().await?;
            log_summary(&report);
            Ok(report)
        }
        Command::Watch => {
            let _watcher = start_watcher(&ctx, rt_tx.clone())?;
            info!("watching for changes; press Ctrl+C to stop");
            Ok(runtime.run().await?)
        }
        Command::Dev => {
            trigger_build(&rt_tx).await?;
            let build = runtime.run().await?;
            log_summary(&build);
            if build.interrupted {
                return Ok(build);
            }

            // Serve and watch only once the initial build has drained.
            let server = DevServer::start(
                ctx.output_root().to_path_buf(),
                settings.server_port,
                ctx.broadcaster().clone(),
            )?;
            info!(url = %server.url(), "dev server listening");
            if settings.open_browser_on_start {
                open_browser(&server.url());
            }

            let _watcher = start_watcher(&ctx, rt_tx.clone())?;
            runtime.set_exit_when_idle(false);
            let report = runtime.run().await;
            server.stop();
            Ok(report?)
        }
    }
}

async fn trigger_build(tx: &mpsc::Sender<RuntimeEvent>) -> Result<()> {
    tx.send(RuntimeEvent::TaskTriggered {
        task: CLEAN_TASK.to_string(),
        reason: TriggerReason::Manual,
    })
    .await?;
    Ok(())
}

fn start_watcher(ctx: &BuildContext, tx: mpsc::Sender<RuntimeEvent>) -> Result<WatcherHandle> {
    // notify reports canonical paths.
    let root = ctx
        .source_root()
        .canonicalize()
        .unwrap_or_else(|_| ctx.source_root().to_path_buf());
    let profiles = build_profiles_from_config(ctx.config(), &root)?;
    let quiet = Duration::from_millis(ctx.config().settings().debounce_ms);
    spawn_watcher(profiles, quiet, tx)
}

fn log_summary(report: &RunReport) {
    if report.failed.is_empty() {
        info!(tasks = report.succeeded.len(), "build finished");
    } else {
        warn!(failed = ?report.failed, succeeded = report.succeeded.len(), "build finished with failures");
    }
}

/// Project root: the directory holding the config file, or the current
/// working directory for a bare file name.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print tasks, their dependencies and what a build would rebuild.
fn print_dry_run(ctx: &BuildContext, will_clean: bool) -> Result<()> {
    let cfg = ctx.config();
    let settings = cfg.settings();

    println!("sitepipe dry-run");
    println!("  source: {}", ctx.source_root().display());
    println!("  output: {}", ctx.output_root().display());
    println!("  production: {}", ctx.production());
    println!(
        "  triggered_while_running_behaviour = {:?}, queue_length = {}",
        settings.triggered_while_running_behaviour, settings.queue_length
    );
    if will_clean {
        println!("  clean: output is removed first; every source is rebuilt");
    }
    println!();

    println!("tasks ({}):", cfg.tasks().len());
    for (name, task) in cfg.tasks() {
        let plan = plan_task(ctx, name)?;
        println!("  - {name} ({}) -> {}", task.kind, plan.dest.display());
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if let Some(bundle) = &task.bundle {
            println!("      bundle: {bundle}");
        }
        if let Some(cmd) = &task.preprocess {
            println!("      preprocess: {cmd}");
        }
        let to_build = if will_clean {
            plan.to_build.iter().chain(plan.up_to_date.iter()).collect::<Vec<_>>()
        } else {
            plan.to_build.iter().collect()
        };
        println!("      build: {} file(s)", to_build.len());
        for path in to_build {
            println!("        {}", path.display());
        }
        if !will_clean {
            println!("      up to date: {} file(s)", plan.up_to_date.len());
        }
    }

    Ok(())
}
