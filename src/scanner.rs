//! Filesystem scanner: discovers `.var` archives and builds the package index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::id::parse_id;

/// `PackageId -> ArchivePath` mapping produced by a scan.
pub type PackageIndex = HashMap<String, PathBuf>;

/// What: Recursively walk `root` and build the package index.
///
/// Inputs:
/// - `root`: the installation directory to scan.
///
/// Output:
/// - A [`PackageIndex`] mapping each parseable package id to the archive
///   path retained for it.
///
/// Details:
/// - Only regular files ending in `.var` (case-insensitive) are considered;
///   unparseable filenames are skipped.
/// - Symlinks are followed with the platform's default traversal behavior
///   (`fs::metadata` / `read_dir` resolve them transparently).
/// - On an id collision, the larger file is kept; every collision is logged
///   via `tracing::warn!` rather than surfaced as an error.
#[must_use]
pub fn scan(root: &Path) -> PackageIndex {
    let mut packages: PackageIndex = HashMap::new();
    let mut collisions: HashMap<String, Vec<PathBuf>> = HashMap::new();

    walk(root, &mut |path| {
        let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
            return;
        };
        if !filename.to_lowercase().ends_with(".var") {
            return;
        }
        let Some(pid) = parse_id(filename) else {
            return;
        };

        match packages.get(&pid) {
            None => {
                packages.insert(pid, path.to_path_buf());
            }
            Some(existing) => {
                let entry = collisions
                    .entry(pid.clone())
                    .or_insert_with(|| vec![existing.clone()]);
                entry.push(path.to_path_buf());

                let existing_size = std::fs::metadata(existing).map(|m| m.len()).unwrap_or(0);
                let candidate_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                if candidate_size > existing_size {
                    packages.insert(pid, path.to_path_buf());
                }
            }
        }
    });

    for (pid, paths) in &collisions {
        let kept = &packages[pid];
        let ignored: Vec<String> = paths
            .iter()
            .filter(|p| *p != kept)
            .map(|p| p.display().to_string())
            .collect();
        tracing::warn!(
            id = %pid,
            kept = %kept.display(),
            ignored = %ignored.join(", "),
            "duplicate package id",
        );
    }

    packages
}

/// What: Recursively invoke `visit` on every regular file under `dir`.
///
/// Inputs:
/// - `dir`: directory to walk.
/// - `visit`: callback invoked once per regular file encountered.
///
/// Output: None.
///
/// Details:
/// - Directories that cannot be read (permission errors, races) are skipped
///   silently; this is a best-effort scan, not a strict one.
fn walk(dir: &Path, visit: &mut impl FnMut(&Path)) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            walk(&path, visit);
        } else if file_type.is_file() {
            visit(&path);
        } else if file_type.is_symlink() {
            // Follow the symlink's target type with system defaults.
            if let Ok(meta) = std::fs::metadata(&path) {
                if meta.is_dir() {
                    walk(&path, visit);
                } else if meta.is_file() {
                    visit(&path);
                }
            }
        }
    }
}
