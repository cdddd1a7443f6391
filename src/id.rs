//! Package identifier parsing and validation.
//!
//! A package id has the shape `Author.PackageName.Version`, where `Version`
//! is a non-negative decimal integer or the literal `latest`. This module
//! draws the line between the permissive parsing applied to trusted archive
//! filenames (`parse_id`) and the stricter grammar applied to references
//! scraped out of untrusted asset text (`is_valid_ref`).

use std::path::Path;

/// Author token that can never appear as a real package author; filtered to
/// reject accidental matches of the reference-scraping regex (see `archive`).
const RESERVED_AUTHOR: &str = "entries";

/// What: Parse a package id out of an archive filename.
///
/// Inputs:
/// - `filename`: the archive's filename (with or without its `.var` extension).
///
/// Output:
/// - `Some(id)` with the version segment normalized (`Latest`/`LATEST` → `latest`),
///   `None` if the filename does not have at least three dot-separated segments
///   or the version segment is neither digits nor `latest`.
///
/// Details:
/// - Unlike [`is_valid_ref`], this does not apply the author heuristics — archive
///   filenames are trusted, so a permissive split is enough to recover the id.
#[must_use]
pub fn parse_id(filename: &str) -> Option<String> {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    let parts: Vec<&str> = stem.split('.').collect();
    if parts.len() < 3 {
        return None;
    }
    let author = parts[0];
    let package = parts[1..parts.len() - 1].join(".");
    let version = parts[parts.len() - 1];
    let version_norm = normalize_version(version)?;
    Some(format!("{author}.{package}.{version_norm}"))
}

/// What: Validate a reference string scraped from asset text.
///
/// Inputs:
/// - `s`: a candidate reference, typically the first capture group of the
///   scraping regex in `archive`.
///
/// Output:
/// - `true` if `s` satisfies the package-id grammar, including the author
///   heuristics that reject incidental matches.
///
/// Details:
/// - Version must be a digit string or `latest` (case-insensitive).
/// - Author must be at least 2 characters, not all digits, not the reserved
///   token `entries`, and not a `v`/`-` prefix followed only by digits/dots
///   (filters out version-like strings the regex can incidentally capture).
/// - Package name must be non-empty with an alphabetic first character.
#[must_use]
pub fn is_valid_ref(s: &str) -> bool {
    let trimmed = s.trim();
    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.len() < 3 {
        return false;
    }
    let author = parts[0].trim();
    let package = parts[1..parts.len() - 1].join(".");
    let version = parts[parts.len() - 1];

    if normalize_version(version).is_none() {
        return false;
    }

    if author.chars().count() < 2 {
        return false;
    }
    if !author.is_empty() && author.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let mut author_chars = author.chars();
    if let Some(first) = author_chars.next()
        && (first == 'v' || first == '-')
        && author_chars.all(|c| c.is_ascii_digit() || c == '.')
    {
        return false;
    }
    if author == RESERVED_AUTHOR {
        return false;
    }

    if package.is_empty() || !package.chars().next().is_some_and(|c| c.is_alphabetic()) {
        return false;
    }

    true
}

/// What: Compute the floating `latest` alias for a digit-versioned package id.
///
/// Inputs:
/// - `pid`: a package id, e.g. `Author.Package.3`.
///
/// Output:
/// - `Author.Package.latest` when `pid`'s version segment is digits.
/// - Empty string when `pid` is malformed or already an alias.
#[must_use]
pub fn latest_alias(pid: &str) -> String {
    let parts: Vec<&str> = pid.split('.').collect();
    if parts.len() < 3 {
        return String::new();
    }
    let version = parts[parts.len() - 1];
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) {
        return String::new();
    }
    let base = parts[..parts.len() - 1].join(".");
    format!("{base}.latest")
}

/// What: Split a package id or reference into its `Author.PackageName` base.
///
/// Inputs:
/// - `id`: a package id or reference with at least 3 dot-separated segments.
///
/// Output:
/// - `Some(base)` with the version segment stripped, `None` if `id` has fewer
///   than 3 segments.
#[must_use]
pub fn base_of(id: &str) -> Option<&str> {
    let last_dot = id.rfind('.')?;
    if id[..last_dot].find('.').is_none() {
        // only one segment before the version — not a well-formed id
        return None;
    }
    Some(&id[..last_dot])
}

/// What: Normalize a version segment, accepting digits or `latest` (any case).
///
/// Inputs:
/// - `version`: the raw trailing segment of an id or reference.
///
/// Output:
/// - `Some("latest")` if `version` case-insensitively equals `latest`.
/// - `Some(version)` unchanged if it is all ASCII digits.
/// - `None` otherwise.
fn normalize_version(version: &str) -> Option<String> {
    if version.eq_ignore_ascii_case("latest") {
        Some("latest".to_string())
    } else if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) {
        Some(version.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_digit_version() {
        assert_eq!(parse_id("Alice.Props.3.var"), Some("Alice.Props.3".into()));
    }

    #[test]
    fn parse_id_normalizes_latest_case() {
        assert_eq!(
            parse_id("Alice.Props.LATEST.var"),
            Some("Alice.Props.latest".into())
        );
    }

    #[test]
    fn parse_id_accepts_version_like_author() {
        // filenames are trusted: the author heuristics don't apply here.
        assert_eq!(parse_id("v1.2.3.var"), Some("v1.2.3".into()));
    }

    #[test]
    fn parse_id_rejects_too_few_segments() {
        assert_eq!(parse_id("justatwoseg.var"), None);
    }

    #[test]
    fn parse_id_rejects_bad_version() {
        assert_eq!(parse_id("Alice.Props.abc.var"), None);
    }

    #[test]
    fn parse_id_multi_segment_package_name() {
        assert_eq!(
            parse_id("Alice.Props.Extra.3.var"),
            Some("Alice.Props.Extra.3".into())
        );
    }

    #[test]
    fn is_valid_ref_rejects_version_like_author() {
        assert!(!is_valid_ref("v1.2.3"));
        assert!(!is_valid_ref("-1.2.3"));
    }

    #[test]
    fn is_valid_ref_rejects_all_digit_author() {
        assert!(!is_valid_ref("19.Foo.1"));
    }

    #[test]
    fn is_valid_ref_rejects_short_author() {
        assert!(!is_valid_ref("A.Foo.1"));
    }

    #[test]
    fn is_valid_ref_rejects_reserved_author() {
        assert!(!is_valid_ref("entries.Foo.1"));
    }

    #[test]
    fn is_valid_ref_rejects_nonalpha_package() {
        assert!(!is_valid_ref("Alice.1Props.1"));
    }

    #[test]
    fn is_valid_ref_accepts_well_formed() {
        assert!(is_valid_ref("Alice.Props.3"));
        assert!(is_valid_ref("Alice.Props.latest"));
        assert!(is_valid_ref("Alice.Props.LATEST"));
    }

    #[test]
    fn latest_alias_from_digit_version() {
        assert_eq!(latest_alias("Alice.Props.3"), "Alice.Props.latest");
    }

    #[test]
    fn latest_alias_empty_for_alias_input() {
        assert_eq!(latest_alias("Alice.Props.latest"), "");
    }

    #[test]
    fn latest_alias_empty_for_malformed() {
        assert_eq!(latest_alias("Alice"), "");
    }

    #[test]
    fn base_of_strips_version() {
        assert_eq!(base_of("Alice.Props.3"), Some("Alice.Props"));
        assert_eq!(base_of("Alice.Props.Extra.3"), Some("Alice.Props.Extra"));
    }
}
