//! Forward/reverse dependency graph and the derived queries built on top of it:
//! transitive closures, dep trees with supersession pruning, orphan and
//! missing-dependency reports.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::id::{base_of, latest_alias};
use crate::scanner::PackageIndex;

/// `PackageId -> DirectDeps(pid)` edge set, built once during indexing.
/// Edges may point either to installed ids or to unresolved reference
/// strings; `find_missing` is what partitions the two against the index.
pub type ForwardGraph = HashMap<String, BTreeSet<String>>;

/// Dependency graph engine: forward edges plus a lazily-built, invalidatable
/// reverse index.
pub struct DependencyGraph {
    forward: ForwardGraph,
    reverse: Option<HashMap<String, BTreeSet<String>>>,
}

impl DependencyGraph {
    /// What: Build a graph engine from a precomputed forward edge set.
    ///
    /// Inputs:
    /// - `forward`: direct-dependency edges, one entry per installed package.
    ///
    /// Output:
    /// - A `DependencyGraph` with the reverse index not yet built.
    #[must_use]
    pub fn new(forward: ForwardGraph) -> Self {
        Self {
            forward,
            reverse: None,
        }
    }

    /// What: Read-only access to the forward edge set.
    #[must_use]
    pub fn forward_edges(&self) -> &ForwardGraph {
        &self.forward
    }

    /// What: Remove a package's forward edges and invalidate the reverse index.
    ///
    /// Inputs:
    /// - `pid`: the package id being removed.
    ///
    /// Output: None.
    ///
    /// Details:
    /// - Called by the delete executor once an archive has been unlinked.
    pub fn remove(&mut self, pid: &str) {
        self.forward.remove(pid);
        self.reverse = None;
    }

    /// What: Direct or transitive dependencies of `pid`.
    ///
    /// Inputs:
    /// - `pid`: the package to query. Must be a key of the forward graph;
    ///   unknown ids yield an empty set.
    /// - `recursive`: when `false`, only direct deps; when `true`, the full
    ///   transitive closure.
    ///
    /// Output:
    /// - A copy of `DirectDeps(pid)` when not recursive.
    /// - The BFS-explored transitive closure (self excluded unless reached
    ///   via a cycle) when recursive.
    ///
    /// Details:
    /// - The recursive walk keeps an explicit `visited` set and is therefore
    ///   tolerant of cycles in the underlying data.
    #[must_use]
    pub fn forward(&self, pid: &str, recursive: bool) -> BTreeSet<String> {
        let direct = self.forward.get(pid).cloned().unwrap_or_default();
        if !recursive {
            return direct;
        }

        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = direct.into_iter().collect();
        while let Some(dep) = queue.pop_front() {
            if !visited.insert(dep.clone()) {
                continue;
            }
            if let Some(next) = self.forward.get(&dep) {
                for s in next {
                    if !visited.contains(s) {
                        queue.push_back(s.clone());
                    }
                }
            }
        }
        visited
    }

    /// What: Build (or return the cached) reverse index.
    ///
    /// Output:
    /// - `reference-or-id -> set of packages that directly depend on it`.
    ///
    /// Details:
    /// - Built once on first demand by iterating every package's direct
    ///   deps; invalidated (cleared) by [`Self::remove`].
    fn reverse_index(&mut self) -> &HashMap<String, BTreeSet<String>> {
        let forward = &self.forward;
        self.reverse.get_or_insert_with(|| {
            let mut reverse: HashMap<String, BTreeSet<String>> = HashMap::new();
            for (pid, deps) in forward {
                for dep in deps {
                    reverse.entry(dep.clone()).or_default().insert(pid.clone());
                }
            }
            reverse
        })
    }

    /// What: Transitive set of packages that depend on `pid`, directly or via its `latest` alias.
    ///
    /// Inputs:
    /// - `pid`: the package whose dependents are sought.
    ///
    /// Output:
    /// - The BFS closure over the reverse index, seeded with both `pid`'s
    ///   direct dependents and the direct dependents of `latest_alias(pid)`.
    #[must_use]
    pub fn dependents(&mut self, pid: &str) -> BTreeSet<String> {
        let alias = latest_alias(pid);
        let reverse = self.reverse_index();

        let mut seed: BTreeSet<String> = reverse.get(pid).cloned().unwrap_or_default();
        if !alias.is_empty()
            && let Some(via_alias) = reverse.get(&alias)
        {
            seed.extend(via_alias.iter().cloned());
        }

        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = seed.into_iter().collect();
        while let Some(p) = queue.pop_front() {
            if !visited.insert(p.clone()) {
                continue;
            }
            if let Some(next) = reverse.get(&p) {
                for x in next {
                    if !visited.contains(x) {
                        queue.push_back(x.clone());
                    }
                }
            }
        }
        visited
    }

    /// What: Walk the dep tree rooted at `pid`, pruning superseded versions.
    ///
    /// Inputs:
    /// - `pid`: the root package.
    /// - `max_depth`: the deepest level to descend to (direct deps are depth 1).
    ///
    /// Output:
    /// - A list of `(dep, depth, parent)` triples in depth-first walk order.
    ///
    /// Details:
    /// - **Supersession pruning**: across `pid`'s full transitive closure,
    ///   compute per `Author.PackageName` base the "best" version seen,
    ///   where `latest` dominates all digit versions and the maximum digit
    ///   wins among digits. A digit-versioned dep whose version is below its
    ///   base's best is skipped (and not descended into); `latest`-versioned
    ///   deps are never pruned.
    /// - A per-path `visited` set prevents infinite recursion on cycles.
    #[must_use]
    pub fn dep_tree(&self, pid: &str, max_depth: usize) -> Vec<(String, usize, String)> {
        let all_deps = self.forward(pid, true);
        let best_version = best_versions_by_base(&all_deps);

        let mut result = Vec::new();

        // Depth-first walk, matching the recursive reference implementation's
        // visit order: children of a node are visited before siblings.
        fn walk(
            graph: &ForwardGraph,
            best_version: &HashMap<String, VersionRank>,
            node: &str,
            depth: usize,
            max_depth: usize,
            visited: &BTreeSet<String>,
            result: &mut Vec<(String, usize, String)>,
        ) {
            if depth > max_depth {
                return;
            }
            let Some(deps) = graph.get(node) else {
                return;
            };
            for dep in deps {
                if is_superseded(dep, best_version) {
                    continue;
                }
                result.push((dep.clone(), depth, node.to_string()));
                if !visited.contains(dep) {
                    let mut next_visited = visited.clone();
                    next_visited.insert(dep.clone());
                    walk(
                        graph,
                        best_version,
                        dep,
                        depth + 1,
                        max_depth,
                        &next_visited,
                        result,
                    );
                }
            }
        }

        let visited = BTreeSet::from([pid.to_string()]);
        walk(
            &self.forward,
            &best_version,
            pid,
            1,
            max_depth,
            &visited,
            &mut result,
        );
        result
    }

    /// What: Every declared direct dependency that is not an installed package.
    ///
    /// Inputs:
    /// - `index`: the current package index.
    ///
    /// Output:
    /// - `[(missing_id, sorted dependents), ...]`, sorted by dependent count
    ///   descending.
    #[must_use]
    pub fn find_missing(&self, index: &PackageIndex) -> Vec<(String, Vec<String>)> {
        let mut missing: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (pid, deps) in &self.forward {
            for dep in deps {
                if !index.contains_key(dep) {
                    missing.entry(dep.clone()).or_default().insert(pid.clone());
                }
            }
        }
        let mut result: Vec<(String, Vec<String>)> = missing
            .into_iter()
            .map(|(id, deps)| (id, deps.into_iter().collect()))
            .collect();
        result.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        result
    }

    /// What: Installed packages no other installed package depends on.
    ///
    /// Inputs:
    /// - `index`: the current package index, used for size lookups.
    ///
    /// Output:
    /// - `[(id, size_mb), ...]`, sorted by size descending.
    ///
    /// Details:
    /// - `pid` is used iff some other package's direct dep shares its base
    ///   and either (a) has the identical version, or (b) is a `.latest`
    ///   reference that resolves to `pid`.
    #[must_use]
    pub fn find_orphans(&self, index: &PackageIndex) -> Vec<(String, f64)> {
        let mut orphans = Vec::new();
        for pid in index.keys() {
            let Some(base) = base_of(pid) else {
                continue;
            };
            let version = pid.rsplit('.').next().unwrap_or_default();

            let used = self.forward.iter().any(|(other_pid, deps)| {
                if other_pid == pid {
                    return false;
                }
                deps.iter().any(|dep| {
                    let Some(dep_base) = base_of(dep) else {
                        return false;
                    };
                    if dep_base != base {
                        return false;
                    }
                    let dep_version = dep.rsplit('.').next().unwrap_or_default();
                    if dep_version == version {
                        return true;
                    }
                    if dep_version == "latest" {
                        return crate::resolver::resolve(dep, index) == *pid;
                    }
                    false
                })
            });

            if !used {
                let size_mb = index
                    .get(pid)
                    .and_then(|p| std::fs::metadata(p).ok())
                    .map(|m| bytes_to_mb(m.len()))
                    .unwrap_or(0.0);
                orphans.push((pid.clone(), size_mb));
            }
        }
        orphans.sort_by(|a, b| b.1.total_cmp(&a.1));
        orphans
    }
}

/// Relative rank of a dep's version within its base: a digit version carries
/// its numeric value, `latest` always dominates.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum VersionRank {
    Digit(u64),
    Latest,
}

/// What: Compute the best (highest-ranked) version seen per `Author.PackageName` base.
///
/// Inputs:
/// - `deps`: the full transitive closure of reference strings to scan.
///
/// Output:
/// - A map from base to the best [`VersionRank`] observed for it.
fn best_versions_by_base(deps: &BTreeSet<String>) -> HashMap<String, VersionRank> {
    let mut best: HashMap<String, VersionRank> = HashMap::new();
    for dep in deps {
        let Some(base) = base_of(dep) else { continue };
        let version = dep.rsplit('.').next().unwrap_or_default();
        let rank = if version == "latest" {
            VersionRank::Latest
        } else if let Ok(v) = version.parse::<u64>() {
            VersionRank::Digit(v)
        } else {
            continue;
        };
        best.entry(base.to_string())
            .and_modify(|cur| {
                if rank > *cur {
                    *cur = rank;
                }
            })
            .or_insert(rank);
    }
    best
}

/// What: Decide whether `dep` is superseded by a higher version of the same base.
///
/// Inputs:
/// - `dep`: a reference string encountered while walking the dep tree.
/// - `best_version`: the per-base best-version map (see [`best_versions_by_base`]).
///
/// Output:
/// - `true` if `dep` has a digit version strictly below its base's best
///   known version. `latest`-versioned deps are never superseded.
fn is_superseded(dep: &str, best_version: &HashMap<String, VersionRank>) -> bool {
    let Some(base) = base_of(dep) else {
        return false;
    };
    let version = dep.rsplit('.').next().unwrap_or_default();
    if version == "latest" {
        return false;
    }
    let Ok(v) = version.parse::<u64>() else {
        return false;
    };
    match best_version.get(base) {
        Some(VersionRank::Latest) => true,
        Some(VersionRank::Digit(best)) => v < *best,
        None => false,
    }
}

/// What: Convert a byte count to mebibytes (1024²-denominated).
#[must_use]
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
