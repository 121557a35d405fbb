// src/config/mod.rs

//! Configuration loading and validation for sitepipe.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk, falling back to the built-in task set
//!   (`loader.rs`).
//! - Validate startup invariants: acyclic task graph, compilable patterns,
//!   disjoint destinations (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{builtin_tasks, ConfigFile, ConfigSection, RawConfigFile, TaskConfig, CLEAN_TASK};
