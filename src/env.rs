//! Environment variable configuration for vam-pkg-core.
//!
//! This module provides utilities for reading configuration from environment variables,
//! allowing zero-code adjustments for CI pipelines and local overrides without touching
//! call sites that construct a [`crate::PackageManager`].

/// What: Read the cache database filename from `VAM_PKG_CACHE_DB` environment variable.
///
/// Inputs: None
///
/// Output:
/// - `Option<String>` containing the filename if the variable is set, `None` otherwise
///
/// Details:
/// - Reads `VAM_PKG_CACHE_DB` as a string, used in place of `vam_pkg_cache.db`
/// - Returns `None` if the variable is not set
/// - Empty strings are treated as unset (returns `None`)
#[must_use]
pub fn env_cache_db_name() -> Option<String> {
    std::env::var("VAM_PKG_CACHE_DB")
        .ok()
        .filter(|s| !s.is_empty())
}

/// What: Read the default dep-tree depth bound from `VAM_PKG_DEP_TREE_MAX_DEPTH`.
///
/// Inputs: None
///
/// Output:
/// - `Option<usize>` containing the depth bound if the variable is set and valid, `None` otherwise
///
/// Details:
/// - Reads `VAM_PKG_DEP_TREE_MAX_DEPTH` as usize
/// - Returns `None` if variable is not set or cannot be parsed
/// - Invalid values are silently ignored (returns `None`)
#[must_use]
pub fn env_dep_tree_max_depth() -> Option<usize> {
    std::env::var("VAM_PKG_DEP_TREE_MAX_DEPTH")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
}

/// What: Read the progress-logging flag from `VAM_PKG_LOG_PROGRESS`.
///
/// Inputs: None
///
/// Output:
/// - `Option<bool>` containing the flag if the variable is set and valid, `None` otherwise
///
/// Details:
/// - Reads `VAM_PKG_LOG_PROGRESS` as boolean
/// - Accepts: "true", "1", "yes", "on" (case-insensitive) for `true`
/// - Accepts: "false", "0", "no", "off" (case-insensitive) for `false`
/// - Returns `None` if variable is not set or cannot be parsed
#[must_use]
pub fn env_log_progress() -> Option<bool> {
    std::env::var("VAM_PKG_LOG_PROGRESS").ok().and_then(|v| {
        let lower = v.to_lowercase();
        match lower.as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        }
    })
}
