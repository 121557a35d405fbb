// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `sitepipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sitepipe",
    version,
    about = "Incremental static-site asset pipeline with live reload.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Its directory is the project root. A missing file means the built-in
    /// task layout.
    #[arg(long, value_name = "PATH", default_value = "Sitepipe.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SITEPIPE_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Emit optimized output (overrides `[config].production`).
    #[arg(long, global = true)]
    pub production: bool,

    /// Validate the config and print what would be rebuilt, without writing.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl CliArgs {
    /// The subcommand to run; none means `dev`.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Dev)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Clean the output directory and build every task once.
    Build {
        /// Keep the existing output and only rebuild what changed.
        #[arg(long)]
        no_clean: bool,
    },
    /// Watch sources and rebuild the owning task on change (no initial build).
    Watch,
    /// Build, then serve the output with live reload and watch for changes.
    #[command(alias = "default")]
    Dev,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
