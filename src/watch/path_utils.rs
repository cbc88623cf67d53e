// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again. A removed file cannot be
///   canonicalized, so only its parent directory is.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(slashes(rel));
    }

    let root_canon = root.canonicalize().ok()?;
    if let Ok(path_canon) = path.canonicalize() {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(slashes(rel));
        }
    }

    let parent = path.parent()?.canonicalize().ok()?;
    let rel = parent.strip_prefix(&root_canon).ok()?;
    Some(slashes(&rel.join(path.file_name()?)))
}

/// Package token for a path relative to the watch root: `.` followed by
/// the containing directory, e.g. `src/api/x.go` gives `./src/api` and a
/// file directly under the root gives `.`.
pub fn package_token(rel_path: &str) -> String {
    match rel_path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => format!("./{dir}"),
        _ => ".".to_string(),
    }
}

fn slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
