//! Archive reading: manifest parsing and textual reference extraction.
//!
//! An archive is a ZIP file with extension `.var`. Its manifest, if present,
//! lives at the root as `meta.json`. Dependency references are recovered
//! either from the manifest's `dependencies` field or, failing that, by
//! scraping recognized text-asset entries for package-id-shaped substrings.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use zip::ZipArchive;

use crate::id::is_valid_ref;

/// Text-asset extensions (lowercased, without the leading dot) scraped for
/// reference strings when no manifest is present.
const TEXT_EXTS: &[&str] = &[
    "scene", "person", "json", "vap", "vab", "vac", "vps", "vmp", "vms", "skin", "uip", "cslist",
    "cs",
];

/// Matches `Author.Package.Version:/` style references inside asset text.
/// The trailing `:/` anchors on the path-like usage (`SELF:/path`) that the
/// simulator's assets use to reference another package's content.
static PACKAGE_REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([A-Za-z0-9][A-Za-z0-9_\- ]*\.[A-Za-z0-9_\-]+\.(?:\d+|latest)):/")
        .expect("static regex is valid")
});

/// What: Open `archive_path` and parse its root `meta.json`, if present.
///
/// Inputs:
/// - `archive_path`: path to a `.var` ZIP archive.
///
/// Output:
/// - `Some(Value)` with the parsed manifest JSON on success.
/// - `None` if the archive cannot be opened, has no `meta.json` entry, or the
///   entry does not parse as JSON.
///
/// Details:
/// - Never propagates an error to the caller; every failure mode is a
///   recovery path (see the crate's error-handling design).
#[must_use]
pub fn read_manifest(archive_path: &Path) -> Option<Value> {
    let file = match std::fs::File::open(archive_path) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(path = %archive_path.display(), error = %e, "archive could not be opened");
            return None;
        }
    };
    let mut zip = match ZipArchive::new(file) {
        Ok(z) => z,
        Err(e) => {
            tracing::warn!(path = %archive_path.display(), error = %e, "archive is not a valid ZIP");
            return None;
        }
    };
    let mut entry = zip.by_name("meta.json").ok()?;
    let mut contents = String::new();
    entry.read_to_string(&mut contents).ok()?;
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %archive_path.display(), error = %e, "manifest malformed");
            None
        }
    }
}

/// What: Extract dependency references declared in a manifest's `dependencies` field.
///
/// Inputs:
/// - `archive_path`: path to the `.var` archive, used to compute `self_id` for
///   self-reference removal.
///
/// Output:
/// - The set of declared references, with any trailing `.latest` segment
///   normalized to lowercase and the archive's own id excluded. Empty if
///   there is no manifest, no `dependencies` field, or `dependencies` is
///   neither a JSON object nor array.
///
/// Details:
/// - `dependencies` as an object: its keys are references.
/// - `dependencies` as an array: its (string) elements are references.
/// - Non-string keys/elements are skipped.
#[must_use]
pub fn extract_refs_from_manifest(archive_path: &Path) -> BTreeSet<String> {
    let mut refs = BTreeSet::new();
    let Some(meta) = read_manifest(archive_path) else {
        return refs;
    };
    let self_id = archive_path
        .file_name()
        .and_then(|f| f.to_str())
        .and_then(crate::id::parse_id);

    let Some(deps) = meta.get("dependencies") else {
        return refs;
    };

    let raw_items: Vec<&str> = match deps {
        Value::Object(map) => map.keys().map(String::as_str).collect(),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => return refs,
    };

    for key in raw_items {
        let normalized = normalize_latest_suffix(key);
        if Some(normalized.as_str()) != self_id.as_deref() {
            refs.insert(normalized);
        }
    }
    refs
}

/// What: Scrape package-reference-shaped substrings out of the archive's text assets.
///
/// Inputs:
/// - `archive_path`: path to the `.var` archive.
///
/// Output:
/// - The set of valid references found across every recognized text-asset
///   entry, normalized and with the archive's own id excluded.
///
/// Details:
/// - Recognized extensions: see [`TEXT_EXTS`].
/// - Entry text is decoded as UTF-8 with invalid bytes replaced.
/// - A whole-archive open failure, or a per-entry read failure, yields an
///   empty contribution for that scope rather than propagating.
#[must_use]
pub fn extract_refs_from_text_entries(archive_path: &Path) -> BTreeSet<String> {
    let mut refs = BTreeSet::new();
    let self_id = archive_path
        .file_name()
        .and_then(|f| f.to_str())
        .and_then(crate::id::parse_id);

    let file = match std::fs::File::open(archive_path) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(path = %archive_path.display(), error = %e, "archive could not be opened");
            return refs;
        }
    };
    let mut zip = match ZipArchive::new(file) {
        Ok(z) => z,
        Err(e) => {
            tracing::warn!(path = %archive_path.display(), error = %e, "archive is not a valid ZIP");
            return refs;
        }
    };

    for i in 0..zip.len() {
        let Ok(mut entry) = zip.by_index(i) else {
            continue;
        };
        let Some(name) = entry.enclosed_name() else {
            continue;
        };
        let Some(ext) = name.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !TEXT_EXTS.contains(&ext.to_lowercase().as_str()) {
            continue;
        }

        let mut bytes = Vec::new();
        if entry.read_to_end(&mut bytes).is_err() {
            continue;
        }
        let content = String::from_utf8_lossy(&bytes);

        for cap in PACKAGE_REF_PATTERN.captures_iter(&content) {
            let raw = cap[1].trim();
            let normalized = normalize_latest_suffix(raw);
            if !is_valid_ref(&normalized) {
                continue;
            }
            if Some(normalized.as_str()) != self_id.as_deref() {
                refs.insert(normalized);
            }
        }
    }
    refs
}

/// What: Extract an archive's dependency references, preferring the manifest.
///
/// Inputs:
/// - `archive_path`: path to the `.var` archive.
///
/// Output:
/// - The manifest's declared references when non-empty; otherwise the
///   text-scraped references (possibly also empty).
///
/// Details:
/// - This is the extraction precedence rule: the manifest is authoritative,
///   text scraping is a recovery path for archives without usable manifest
///   dependency data.
#[must_use]
pub fn extract_refs(archive_path: &Path) -> BTreeSet<String> {
    let manifest_refs = extract_refs_from_manifest(archive_path);
    if !manifest_refs.is_empty() {
        manifest_refs
    } else {
        extract_refs_from_text_entries(archive_path)
    }
}

/// What: Lowercase a trailing `.latest` segment (any case) in a reference string.
///
/// Inputs:
/// - `s`: a raw reference string.
///
/// Output:
/// - `s` unchanged if its final dot-segment is not `latest` (case-insensitive).
/// - Otherwise, `s` with that final segment replaced by lowercase `latest`.
fn normalize_latest_suffix(s: &str) -> String {
    match s.rfind('.') {
        Some(idx) if s[idx + 1..].eq_ignore_ascii_case("latest") => {
            format!("{}{}", &s[..idx], ".latest")
        }
        _ => s.to_string(),
    }
}
