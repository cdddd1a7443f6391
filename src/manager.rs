//! Top-level package manager: ties the scanner, cache, resolver, graph, and
//! delete planner together behind a single entry point.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::cache::ReferenceCache;
use crate::delete::{DeletePlan, ExecutionResult, execute_delete, plan_delete};
use crate::env::{env_dep_tree_max_depth, env_log_progress};
use crate::error::{PkgManagerError, Result};
use crate::graph::{DependencyGraph, ForwardGraph, bytes_to_mb};
use crate::id::latest_alias;
use crate::resolver::resolve;
use crate::scanner::{PackageIndex, scan};
use crate::types::{PackageInfo, ProgressCallback};
use crate::archive;

/// Default maximum depth walked by [`PackageManager::package_info`]'s dep tree,
/// overridable via `VAM_PKG_DEP_TREE_MAX_DEPTH`.
const DEFAULT_DEP_TREE_MAX_DEPTH: usize = 6;

/// Indexes an installation directory and answers dependency queries against it.
pub struct PackageManager {
    install_dir: PathBuf,
    index: PackageIndex,
    cache: ReferenceCache,
    graph: DependencyGraph,
}

impl PackageManager {
    /// What: Build a manager by scanning `install_dir` and indexing every archive found.
    ///
    /// Inputs:
    /// - `install_dir`: the installation root to scan.
    /// - `progress`: optional callback invoked after each archive is processed,
    ///   with `(scanned_count, cached_count, total, filename)`.
    ///
    /// Output:
    /// - `Ok(PackageManager)` ready to answer queries.
    /// - `Err(PkgManagerError::InstallationMissing)` if `install_dir` does not
    ///   exist or is not a directory.
    ///
    /// Details:
    /// - Opens (or creates) the reference cache under `install_dir/Cache`,
    ///   then prunes stale rows against the freshly scanned filenames.
    /// - Each archive's references are served from cache when its `(mtime,
    ///   size)` match; otherwise extracted fresh and stored back.
    /// - Every extracted reference is passed through [`resolve`] against the
    ///   freshly scanned index before being inserted into the forward graph,
    ///   so `DirectDeps(pid)` always holds concrete installed ids (or the
    ///   original reference, unresolved, when nothing installed matches its
    ///   base) — matching references are then excluded as self-references.
    pub fn new(install_dir: &Path, mut progress: Option<&mut ProgressCallback<'_>>) -> Result<Self> {
        if !install_dir.is_dir() {
            return Err(PkgManagerError::InstallationMissing(
                install_dir.display().to_string(),
            ));
        }

        let index = scan(install_dir);
        let cache = ReferenceCache::open(install_dir);

        let known_filenames: HashSet<String> = index
            .values()
            .filter_map(|p| p.file_name().and_then(|f| f.to_str()).map(str::to_string))
            .collect();
        cache.prune(&known_filenames);

        let total = index.len();
        let log_progress = env_log_progress().unwrap_or(false);
        tracing::info!(install_dir = %install_dir.display(), total, "starting indexing pass");

        let mut forward: ForwardGraph = ForwardGraph::new();
        let mut scanned = 0usize;
        let mut cached = 0usize;

        let mut entries: Vec<(&String, &PathBuf)> = index.iter().collect();
        entries.sort_by_key(|(pid, _)| pid.as_str());

        for (pid, path) in entries {
            scanned += 1;
            let (refs, was_cached) = if let Some(hit) = cache.lookup(path) {
                (hit, true)
            } else {
                let extracted = archive::extract_refs(path);
                cache.store(path, &extracted);
                (extracted, false)
            };
            if was_cached {
                cached += 1;
            }

            let resolved_deps: BTreeSet<String> = refs
                .iter()
                .map(|r| resolve(r, &index))
                .filter(|r| r != pid)
                .collect();
            forward.insert(pid.clone(), resolved_deps);

            let filename = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or_default();
            tracing::debug!(id = %pid, cached = was_cached, filename, "indexed archive");
            if log_progress {
                tracing::info!(scanned, cached, total, filename, "indexing progress");
            }

            if let Some(cb) = progress.as_deref_mut() {
                cb(scanned, cached, total, filename);
            }
        }

        tracing::info!(total, cached, "indexing pass complete");

        Ok(Self {
            install_dir: install_dir.to_path_buf(),
            index,
            cache,
            graph: DependencyGraph::new(forward),
        })
    }

    /// What: The installation root this manager was built from.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// What: The live package index.
    #[must_use]
    pub fn index(&self) -> &PackageIndex {
        &self.index
    }

    /// What: Resolve a (possibly floating) reference to a concrete installed id.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> String {
        resolve(reference, &self.index)
    }

    /// What: Aggregate everything known about `pid` into a [`PackageInfo`].
    ///
    /// Inputs:
    /// - `pid`: the package id to describe. May be unresolved; it is
    ///   resolved against the live index first.
    ///
    /// Output:
    /// - `None` if `pid` does not resolve to an installed package.
    /// - `Some(info)` otherwise, with path, size, manifest metadata (creator,
    ///   license, description), direct and full transitive deps, missing
    ///   deps (from the full transitive closure), and the dependents closure
    ///   populated.
    ///
    /// Details:
    /// - `all_deps` (and therefore `missing_deps`) uses
    ///   [`DependencyGraph::dep_tree`]'s underlying transitive closure via
    ///   [`DependencyGraph::forward`] with `recursive = true`, not the
    ///   depth-bounded, supersession-pruned [`Self::dep_tree`] — callers
    ///   wanting the pruned display tree should call that instead.
    /// - `creator`/`license` default to `"N/A"` when the manifest is absent,
    ///   unreadable, or lacks the field; `description` defaults to `""` and
    ///   is trimmed.
    #[must_use]
    pub fn package_info(&mut self, pid: &str) -> Option<PackageInfo> {
        let resolved = self.resolve(pid);
        let path = self.index.get(&resolved)?.clone();
        let size_mb = std::fs::metadata(&path)
            .map(|m| bytes_to_mb(m.len()))
            .unwrap_or(0.0);

        let manifest = archive::read_manifest(&path);
        let creator = manifest_string_field(manifest.as_ref(), "creatorName", "N/A");
        let license = manifest_string_field(manifest.as_ref(), "licenseType", "N/A");
        let description = manifest_string_field(manifest.as_ref(), "description", "")
            .trim()
            .to_string();

        let direct_deps = self.graph.forward(&resolved, false);
        let all_deps = self.graph.forward(&resolved, true);
        let missing_deps: BTreeSet<String> = all_deps
            .iter()
            .filter(|d| !self.index.contains_key(*d))
            .cloned()
            .collect();
        let dependents = self.graph.dependents(&resolved);

        Some(PackageInfo {
            id: resolved,
            path: path.display().to_string(),
            size_mb,
            creator,
            license,
            description,
            direct_deps,
            all_deps,
            missing_deps,
            dependents,
        })
    }

    /// What: Walk the pruned dependency tree rooted at `pid`.
    ///
    /// Output: see [`DependencyGraph::dep_tree`]. Depth defaults to
    /// `VAM_PKG_DEP_TREE_MAX_DEPTH` or 6 when unset.
    #[must_use]
    pub fn dep_tree(&self, pid: &str) -> Vec<(String, usize, String)> {
        let max_depth = env_dep_tree_max_depth().unwrap_or(DEFAULT_DEP_TREE_MAX_DEPTH);
        self.graph.dep_tree(pid, max_depth)
    }

    /// What: Every declared dependency across all packages that is not installed.
    #[must_use]
    pub fn find_missing(&self) -> Vec<(String, Vec<String>)> {
        self.graph.find_missing(&self.index)
    }

    /// What: Installed packages nothing else depends on.
    #[must_use]
    pub fn find_orphans(&self) -> Vec<(String, f64)> {
        self.graph.find_orphans(&self.index)
    }

    /// What: Compute a deletion plan for `pid`.
    #[must_use]
    pub fn plan_delete(&mut self, pid: &str, with_deps: bool) -> DeletePlan {
        plan_delete(pid, with_deps, &mut self.graph, &self.index)
    }

    /// What: Execute a previously computed deletion plan.
    ///
    /// Details:
    /// - Successfully deleted packages are also dropped from the on-disk
    ///   reference cache's future prune set implicitly: the next `prune`
    ///   call (on the next `PackageManager::new`) removes their rows since
    ///   their filenames are no longer in the live index.
    pub fn execute_delete(&mut self, plan: &DeletePlan) -> ExecutionResult {
        execute_delete(plan, &mut self.graph, &mut self.index)
    }

    /// What: The floating `.latest` alias for `pid`, if any.
    #[must_use]
    pub fn latest_alias(&self, pid: &str) -> String {
        latest_alias(pid)
    }

    /// What: Close the reference cache, flushing any pending connection state.
    pub fn close(self) {
        self.cache.close();
    }
}

/// What: Read a string field out of a parsed manifest, with a default.
///
/// Inputs:
/// - `manifest`: the archive's parsed `meta.json`, if any.
/// - `field`: the manifest key to read (`creatorName`, `licenseType`,
///   `description`).
/// - `default`: returned when the manifest is absent, the field is missing,
///   or the field is not a JSON string.
///
/// Output:
/// - The field's string value, or `default`.
fn manifest_string_field(manifest: Option<&serde_json::Value>, field: &str, default: &str) -> String {
    manifest
        .and_then(|m| m.get(field))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_var(dir: &Path, name: &str, meta_json: &str) {
        let path = dir.join(name);
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("meta.json", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(meta_json.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn new_rejects_missing_install_dir() {
        let err = PackageManager::new(Path::new("/no/such/dir"), None).unwrap_err();
        assert!(matches!(err, PkgManagerError::InstallationMissing(_)));
    }

    #[test]
    fn new_indexes_archives_and_builds_forward_graph() {
        let dir = tempfile::tempdir().unwrap();
        build_var(
            dir.path(),
            "Alice.Props.1.var",
            r#"{"dependencies": {"Bob.Lib.2": "x"}}"#,
        );
        build_var(dir.path(), "Bob.Lib.2.var", r#"{"dependencies": {}}"#);

        let mut manager = PackageManager::new(dir.path(), None).unwrap();
        let info = manager.package_info("Alice.Props.1").unwrap();
        assert!(info.direct_deps.contains("Bob.Lib.2"));
        assert!(info.missing_deps.is_empty());
    }

    #[test]
    fn new_resolves_latest_references_before_storing_forward_edges() {
        let dir = tempfile::tempdir().unwrap();
        build_var(
            dir.path(),
            "Alice.Scene.1.var",
            r#"{"dependencies": {"Bob.Asset.latest": "x"}}"#,
        );
        build_var(dir.path(), "Bob.Asset.1.var", r#"{"dependencies": {}}"#);
        build_var(dir.path(), "Bob.Asset.3.var", r#"{"dependencies": {}}"#);

        let mut manager = PackageManager::new(dir.path(), None).unwrap();
        let info = manager.package_info("Alice.Scene.1").unwrap();
        assert!(info.direct_deps.contains("Bob.Asset.3"));
        assert!(!info.direct_deps.contains("Bob.Asset.latest"));
        assert!(info.missing_deps.is_empty());
    }

    #[test]
    fn package_info_populates_manifest_metadata_and_all_deps() {
        let dir = tempfile::tempdir().unwrap();
        build_var(
            dir.path(),
            "Alice.Scene.1.var",
            r#"{"dependencies": {"Bob.Asset.1": "x"}, "creatorName": "Alice", "licenseType": "CC-BY", "description": "  a scene  "}"#,
        );
        build_var(
            dir.path(),
            "Bob.Asset.1.var",
            r#"{"dependencies": {"Carl.Texture.1": "x"}}"#,
        );
        build_var(dir.path(), "Carl.Texture.1.var", r#"{"dependencies": {}}"#);

        let mut manager = PackageManager::new(dir.path(), None).unwrap();
        let info = manager.package_info("Alice.Scene.1").unwrap();
        assert_eq!(info.creator, "Alice");
        assert_eq!(info.license, "CC-BY");
        assert_eq!(info.description, "a scene");
        assert!(info.all_deps.contains("Bob.Asset.1"));
        assert!(info.all_deps.contains("Carl.Texture.1"));
        assert!(!info.path.is_empty());
    }

    #[test]
    fn package_info_defaults_manifest_fields_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        build_var(dir.path(), "Alice.Scene.1.var", r#"{"dependencies": {}}"#);

        let mut manager = PackageManager::new(dir.path(), None).unwrap();
        let info = manager.package_info("Alice.Scene.1").unwrap();
        assert_eq!(info.creator, "N/A");
        assert_eq!(info.license, "N/A");
        assert_eq!(info.description, "");
    }

    #[test]
    fn package_info_reports_missing_dependency() {
        let dir = tempfile::tempdir().unwrap();
        build_var(
            dir.path(),
            "Alice.Props.1.var",
            r#"{"dependencies": {"Ghost.Pkg.1": "x"}}"#,
        );

        let mut manager = PackageManager::new(dir.path(), None).unwrap();
        let info = manager.package_info("Alice.Props.1").unwrap();
        assert!(info.missing_deps.contains("Ghost.Pkg.1"));
    }

    #[test]
    fn progress_callback_invoked_once_per_archive() {
        let dir = tempfile::tempdir().unwrap();
        build_var(dir.path(), "Alice.Props.1.var", r#"{"dependencies": {}}"#);
        build_var(dir.path(), "Bob.Lib.2.var", r#"{"dependencies": {}}"#);

        let mut calls = Vec::new();
        let mut cb = |scanned: usize, cached: usize, total: usize, filename: &str| {
            calls.push((scanned, cached, total, filename.to_string()));
        };
        let _manager = PackageManager::new(dir.path(), Some(&mut cb)).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, 2);
        assert_eq!(calls[1].2, 2);
    }

    #[test]
    fn second_indexing_pass_serves_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        build_var(
            dir.path(),
            "Alice.Props.1.var",
            r#"{"dependencies": {"Bob.Lib.2": "x"}}"#,
        );
        build_var(dir.path(), "Bob.Lib.2.var", r#"{"dependencies": {}}"#);

        let manager1 = PackageManager::new(dir.path(), None).unwrap();
        manager1.close();

        let mut cached_count = 0;
        let mut cb = |_scanned: usize, cached: usize, _total: usize, _filename: &str| {
            cached_count = cached;
        };
        let _manager2 = PackageManager::new(dir.path(), Some(&mut cb)).unwrap();
        assert_eq!(cached_count, 2);
    }

    #[test]
    fn find_orphans_excludes_referenced_packages() {
        let dir = tempfile::tempdir().unwrap();
        build_var(
            dir.path(),
            "Alice.Props.1.var",
            r#"{"dependencies": {"Bob.Lib.2": "x"}}"#,
        );
        build_var(dir.path(), "Bob.Lib.2.var", r#"{"dependencies": {}}"#);

        let manager = PackageManager::new(dir.path(), None).unwrap();
        let orphans = manager.find_orphans();
        let ids: Vec<&str> = orphans.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["Alice.Props.1"]);
    }

    #[test]
    fn plan_and_execute_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        build_var(dir.path(), "Alice.Props.1.var", r#"{"dependencies": {}}"#);

        let mut manager = PackageManager::new(dir.path(), None).unwrap();
        let plan = manager.plan_delete("Alice.Props.1", false);
        let results = manager.execute_delete(&plan);

        assert_eq!(results.len(), 1);
        assert!(!manager.index().contains_key("Alice.Props.1"));
    }
}
