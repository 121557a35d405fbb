// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Path, PathBuf};

/// Extensions editors use for swap and backup files.
const TEMP_EXTENSIONS: &[&str] = &["bck", "bak", "backup", "swp", "swo", "tmp"];

/// Editor droppings that must never trigger a rebuild: `foo.swp`,
/// `foo.bak`, `foo~`, `.#foo`, `.foo.un~`, ...
pub fn is_temp_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.ends_with('~') || name.starts_with('.') {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| TEMP_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)))
}

/// Express an event path in terms of `root`.
///
/// Paths already under `root` are returned unchanged. Otherwise the path is
/// canonicalized and re-checked (symlinked prefixes such as `/private/var`
/// on macOS). Returns `None` if the path cannot be related to `root`.
pub fn under_root(root: &Path, path: &Path) -> Option<PathBuf> {
    if path.starts_with(root) {
        return Some(path.to_path_buf());
    }

    let canon = path.canonicalize().ok()?;
    if canon.starts_with(root) {
        return Some(canon);
    }

    let root_canon = root.canonicalize().ok()?;
    let rel = canon.strip_prefix(&root_canon).ok()?;
    Some(root.join(rel))
}
