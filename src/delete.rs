//! Delete planning and execution: computing which archives a deletion would
//! remove, distinguishing shared from uniquely-reachable dependencies, and
//! carrying the plan out on disk.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::graph::{DependencyGraph, bytes_to_mb};
use crate::scanner::PackageIndex;

/// A computed, not-yet-executed deletion plan.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePlan {
    /// The package the caller asked to delete.
    pub target: String,
    /// Every installed package that transitively depends on `target`.
    pub dependents: BTreeSet<String>,
    /// Packages that will actually be removed, in deletion order
    /// (`target` first, then its deletable deps sorted).
    pub to_delete: Vec<String>,
    /// Dependencies of `target` that are kept because another surviving
    /// package still needs them.
    pub keep_deps: BTreeSet<String>,
    /// Dependencies of `target` that are deleted alongside it because no
    /// other surviving package needs them.
    pub delete_deps: Vec<String>,
    /// Combined size, in MB, of everything in `to_delete`.
    pub total_mb: f64,
}

/// Outcome of deleting a single archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The archive was removed from disk.
    Deleted,
    /// The archive's path was not present on disk (already removed).
    NotFound,
    /// Removal failed; the message is the underlying I/O error's display text.
    Failed(String),
}

/// Per-package result of executing a plan, in the same order as `to_delete`.
pub type ExecutionResult = Vec<(String, DeleteOutcome)>;

/// What: Compute a deletion plan for `target`.
///
/// Inputs:
/// - `target`: the package id the caller wants removed.
/// - `with_deps`: when `true`, also consider `target`'s dependencies for
///   removal; when `false`, only `target` itself is ever deleted.
/// - `graph`: the dependency graph (its reverse index may be built/cached
///   as a side effect).
/// - `index`: the current package index, used for size lookups.
///
/// Output:
/// - A [`DeletePlan`] describing what would be removed. `target`'s own
///   dependents are always reported, regardless of `with_deps`, so a caller
///   can warn about breaking other packages.
///
/// Details:
/// - A dependency of `target` is moved to `delete_deps` only if none of its
///   other dependents survive the deletion (i.e. every other dependent is
///   itself in `to_delete`).
#[must_use]
pub fn plan_delete(target: &str, with_deps: bool, graph: &mut DependencyGraph, index: &PackageIndex) -> DeletePlan {
    let dependents = graph.dependents(target);

    let mut to_delete = vec![target.to_string()];
    let mut keep_deps = BTreeSet::new();
    let mut delete_deps = Vec::new();

    if with_deps {
        let all_deps: BTreeSet<String> = graph
            .forward(target, true)
            .into_iter()
            .filter(|d| index.contains_key(d))
            .collect();
        let planned: BTreeSet<String> = to_delete.iter().cloned().collect();

        // A dep is safe to delete iff every package that depends on it is
        // either the target itself or another dep we're also deleting.
        let mut safe_to_delete: BTreeSet<String> = BTreeSet::new();
        for dep in &all_deps {
            let mut dependents_of_dep = graph.dependents(dep);
            dependents_of_dep.remove(target);
            let externally_needed = dependents_of_dep
                .iter()
                .any(|d| !all_deps.contains(d) && !planned.contains(d));
            if externally_needed {
                keep_deps.insert(dep.clone());
            } else {
                safe_to_delete.insert(dep.clone());
            }
        }

        delete_deps = safe_to_delete.into_iter().collect();
        delete_deps.sort();
        to_delete.extend(delete_deps.iter().cloned());
    }

    let total_mb: f64 = to_delete
        .iter()
        .filter_map(|pid| index.get(pid))
        .filter_map(|p| std::fs::metadata(p).ok())
        .map(|m| bytes_to_mb(m.len()))
        .sum();

    DeletePlan {
        target: target.to_string(),
        dependents,
        to_delete,
        keep_deps,
        delete_deps,
        total_mb,
    }
}

/// What: Carry out a previously computed plan, removing each archive from disk.
///
/// Inputs:
/// - `plan`: the plan to execute.
/// - `graph`: the dependency graph; each successfully deleted package's
///   forward edges are removed and the reverse index is invalidated.
/// - `index`: the package index; entries for deleted packages are removed.
///
/// Output:
/// - One [`DeleteOutcome`] per entry in `plan.to_delete`, in order.
///
/// Details:
/// - A path missing from `index` (already gone) yields `NotFound` without
///   touching the filesystem.
/// - Deletion continues past a per-package failure; it is not aborted.
pub fn execute_delete(plan: &DeletePlan, graph: &mut DependencyGraph, index: &mut PackageIndex) -> ExecutionResult {
    let mut results = Vec::with_capacity(plan.to_delete.len());

    for pid in &plan.to_delete {
        let outcome = match index.get(pid) {
            None => DeleteOutcome::NotFound,
            Some(path) => delete_one(path),
        };

        if outcome == DeleteOutcome::Deleted {
            graph.remove(pid);
            index.remove(pid);
        }
        results.push((pid.clone(), outcome));
    }

    let deleted = results
        .iter()
        .filter(|(_, outcome)| *outcome == DeleteOutcome::Deleted)
        .count();
    tracing::info!(
        target = %plan.target,
        deleted,
        attempted = results.len(),
        "deletion batch complete",
    );

    results
}

/// What: Remove a single archive path from disk.
///
/// Inputs:
/// - `path`: the archive's path.
///
/// Output:
/// - [`DeleteOutcome::NotFound`] if the path doesn't exist.
/// - [`DeleteOutcome::Deleted`] on success.
/// - [`DeleteOutcome::Failed`] with the I/O error's display text otherwise.
fn delete_one(path: &PathBuf) -> DeleteOutcome {
    if !path.exists() {
        return DeleteOutcome::NotFound;
    }
    match std::fs::remove_file(path) {
        Ok(()) => DeleteOutcome::Deleted,
        Err(e) => DeleteOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ForwardGraph;
    use std::fs;

    fn setup(dir: &std::path::Path, edges: &[(&str, &[&str])]) -> (DependencyGraph, PackageIndex) {
        let forward: ForwardGraph = edges
            .iter()
            .map(|(pid, deps)| {
                (
                    (*pid).to_string(),
                    deps.iter().map(|d| (*d).to_string()).collect(),
                )
            })
            .collect();

        let mut index: PackageIndex = PackageIndex::new();
        for (pid, _) in edges {
            let path = dir.join(format!("{pid}.var"));
            fs::write(&path, b"x").unwrap();
            index.insert((*pid).to_string(), path);
        }

        (DependencyGraph::new(forward), index)
    }

    #[test]
    fn plan_without_deps_only_targets_itself() {
        let dir = tempfile::tempdir().unwrap();
        let (mut graph, index) = setup(dir.path(), &[("A.P.1", &["B.Q.1"]), ("B.Q.1", &[])]);
        let plan = plan_delete("A.P.1", false, &mut graph, &index);
        assert_eq!(plan.to_delete, vec!["A.P.1".to_string()]);
    }

    #[test]
    fn plan_with_deps_deletes_uniquely_used_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let (mut graph, index) = setup(dir.path(), &[("A.P.1", &["B.Q.1"]), ("B.Q.1", &[])]);
        let plan = plan_delete("A.P.1", true, &mut graph, &index);
        assert!(plan.to_delete.contains(&"B.Q.1".to_string()));
        assert!(plan.keep_deps.is_empty());
    }

    #[test]
    fn plan_with_deps_keeps_shared_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let (mut graph, index) = setup(
            dir.path(),
            &[
                ("A.P.1", &["L.Lib.1"]),
                ("C.R.1", &["L.Lib.1"]),
                ("L.Lib.1", &[]),
            ],
        );
        let plan = plan_delete("A.P.1", true, &mut graph, &index);
        assert!(plan.keep_deps.contains("L.Lib.1"));
        assert!(!plan.to_delete.contains(&"L.Lib.1".to_string()));
    }

    #[test]
    fn plan_with_deps_ignores_uninstalled_reference() {
        let dir = tempfile::tempdir().unwrap();
        let (mut graph, index) = setup(dir.path(), &[("A.P.1", &["Ghost.Missing.1"])]);
        let plan = plan_delete("A.P.1", true, &mut graph, &index);
        assert_eq!(plan.to_delete, vec!["A.P.1".to_string()]);
        assert!(plan.delete_deps.is_empty());
        assert!(plan.keep_deps.is_empty());
    }

    #[test]
    fn plan_reports_dependents_regardless_of_with_deps() {
        let dir = tempfile::tempdir().unwrap();
        let (mut graph, index) = setup(dir.path(), &[("A.P.1", &["L.Lib.1"]), ("L.Lib.1", &[])]);
        let plan = plan_delete("L.Lib.1", false, &mut graph, &index);
        assert!(plan.dependents.contains("A.P.1"));
    }

    #[test]
    fn execute_delete_removes_files_and_reports_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let (mut graph, mut index) = setup(dir.path(), &[("A.P.1", &[])]);
        let plan = plan_delete("A.P.1", false, &mut graph, &index);
        let results = execute_delete(&plan, &mut graph, &mut index);

        assert_eq!(results, vec![("A.P.1".to_string(), DeleteOutcome::Deleted)]);
        assert!(!index.contains_key("A.P.1"));
        assert!(graph.forward_edges().get("A.P.1").is_none());
    }

    #[test]
    fn execute_delete_reports_not_found_for_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let (mut graph, mut index) = setup(dir.path(), &[("A.P.1", &[])]);
        fs::remove_file(&index["A.P.1"]).unwrap();

        let plan = plan_delete("A.P.1", false, &mut graph, &index);
        let results = execute_delete(&plan, &mut graph, &mut index);
        assert_eq!(results, vec![("A.P.1".to_string(), DeleteOutcome::NotFound)]);
    }
}
