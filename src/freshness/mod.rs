// src/freshness/mod.rs

//! Change detection.
//!
//! - [`signature`] hashes file content with blake3.
//! - [`cache`] memoizes hashes per path, invalidated by mtime.
//! - [`record`] holds per-task build records and their storage backends.
//! - [`detector`] answers "does this source need rebuilding?".

pub mod cache;
pub mod detector;
pub mod record;
pub mod signature;

pub use cache::HashCache;
pub use detector::ChangeDetector;
pub use record::{
    BuildRecord, FileRecordStore, GlobRecord, MemoryRecordStore, RecordEntry, RecordStore,
    RECORD_DIR,
};
pub use signature::{glob_signature, hash_bytes, hash_file};
