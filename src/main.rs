// src/main.rs

use sitepipe::cli::Command;
use sitepipe::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("sitepipe error: {err:?}");
            std::process::exit(1);
        }
    }
}

/// `Ok(false)` when a one-shot build had failing tasks.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let one_shot = matches!(args.command(), Command::Build { .. }) && !args.dry_run;
    let report = run(args).await?;
    Ok(!one_shot || report.is_success())
}
