//! Path resolution for file references inside configuration documents.
//!
//! Supports absolute paths, paths relative to the config file, and "~" home
//! directory expansion.

use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

/// Resolve a path from a config file.
///
/// Resolution rules:
/// 1. Paths starting with `~`: expanded to the home directory
/// 2. Absolute paths: used as-is
/// 3. Relative paths: resolved relative to `config_dir`
pub fn resolve_path(path: &Path, config_dir: &Path) -> PathBuf {
    trace!(
        path = %path.display(),
        config_dir = %config_dir.display(),
        "Resolving path"
    );

    let path_str = path.to_string_lossy();

    if path_str == "~" || path_str.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let rest = path_str.strip_prefix("~/").unwrap_or("");
            let resolved = if rest.is_empty() { home } else { home.join(rest) };
            debug!(
                original = %path.display(),
                resolved = %resolved.display(),
                "Expanded home directory path"
            );
            return resolved;
        }
        warn!(path = %path.display(), "Could not determine home directory, using path literally");
        return path.to_path_buf();
    }

    if path.is_absolute() {
        return path.to_path_buf();
    }

    let resolved = config_dir.join(path);
    debug!(
        original = %path.display(),
        resolved = %resolved.display(),
        "Resolved relative path"
    );
    resolved
}
