//! Shared data types returned by the manager and graph queries.

use std::collections::BTreeSet;

/// Aggregated information about a single installed package.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageInfo {
    /// The package's id.
    pub id: String,
    /// The archive's path on disk.
    pub path: String,
    /// Archive size in MB.
    pub size_mb: f64,
    /// Manifest `creatorName`, or `"N/A"` when absent or unreadable.
    pub creator: String,
    /// Manifest `licenseType`, or `"N/A"` when absent or unreadable.
    pub license: String,
    /// Manifest `description`, trimmed, or `""` when absent.
    pub description: String,
    /// Direct dependencies declared by the package.
    pub direct_deps: BTreeSet<String>,
    /// Full transitive dependency closure.
    pub all_deps: BTreeSet<String>,
    /// Declared dependencies (direct or transitive) that are not currently installed.
    pub missing_deps: BTreeSet<String>,
    /// Installed packages that directly or transitively depend on this one.
    pub dependents: BTreeSet<String>,
}

/// Progress callback invoked once per archive during indexing.
///
/// Inputs, in order: number of archives scanned so far (including this one),
/// number of those served from cache, total archive count, and the filename
/// of the archive just processed.
pub type ProgressCallback<'a> = dyn FnMut(usize, usize, usize, &str) + 'a;
