// tests/integration/main.rs

mod error_handling;
mod fs_abstraction;
mod incremental_build;
mod runtime_fake_executor;
mod scenarios;
mod watch_styles;
