//! Unified error type for vam-pkg-core.

use thiserror::Error;

/// Unified error type for all vam-pkg-core operations.
///
/// Most failure modes inside the engine are recovery paths (a malformed
/// manifest, an unreadable archive entry, a cache that cannot be opened)
/// and are absorbed internally rather than surfaced here. This enum only
/// covers the handful of failures that are meaningful to report to a
/// caller — construction-time installation errors above all.
#[derive(Error, Debug)]
pub enum PkgManagerError {
    /// The installation directory does not exist or is not a directory.
    #[error("installation directory not found: {0}")]
    InstallationMissing(String),

    /// Filesystem I/O error outside of the best-effort recovery paths.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive could not be opened as a ZIP file.
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reference cache backing store error.
    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),
}

/// Result type alias for vam-pkg-core operations.
pub type Result<T> = std::result::Result<T, PkgManagerError>;
