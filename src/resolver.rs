//! Reference resolution: mapping a (possibly floating) reference to a concrete installed id.

use crate::id::base_of;
use crate::scanner::PackageIndex;

/// What: Resolve `reference` to a concrete installed package id.
///
/// Inputs:
/// - `reference`: a package id or reference string (may alias `latest`, may
///   name a version that is not installed).
/// - `index`: the current package index.
///
/// Output:
/// - `reference` itself, if it is already a key in `index`.
/// - Otherwise, the installed id sharing `reference`'s `Author.PackageName`
///   base with the largest digit version, if any such id exists.
/// - Otherwise, `reference` unchanged (resolution failed, but the reference
///   is preserved so missing-dependency reporting can still find it).
///
/// Details:
/// - This single rule covers both an explicit `.latest` alias and a pinned
///   version that happens not to be installed: both fall forward to the
///   highest installed version of the same base.
#[must_use]
pub fn resolve(reference: &str, index: &PackageIndex) -> String {
    if index.contains_key(reference) {
        return reference.to_string();
    }

    let Some(base) = base_of(reference) else {
        return reference.to_string();
    };

    let mut best: Option<(u64, &str)> = None;
    for pid in index.keys() {
        let Some(pid_base) = base_of(pid) else {
            continue;
        };
        if pid_base != base {
            continue;
        }
        let Some(version_str) = pid.rsplit('.').next() else {
            continue;
        };
        let Ok(version) = version_str.parse::<u64>() else {
            continue;
        };
        if best.is_none_or(|(best_version, _)| version > best_version) {
            best = Some((version, pid.as_str()));
        }
    }

    match best {
        Some((_, pid)) => pid.to_string(),
        None => reference.to_string(),
    }
}
