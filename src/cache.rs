//! Persistent reference cache keyed on archive filename, mtime, and size.
//!
//! Backed by an embedded SQL database living at `<install>/Cache/<db>`. The
//! cache is strictly best-effort: if the backing store cannot be opened or
//! queried, every lookup misses and every store is a no-op, and indexing
//! falls back to re-extracting references from each archive.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::UNIX_EPOCH;

use rusqlite::Connection;

use crate::env::env_cache_db_name;

/// Default cache database filename, overridable via `VAM_PKG_CACHE_DB`.
const DEFAULT_DB_NAME: &str = "vam_pkg_cache.db";

/// Mtime tolerance, in seconds, used when comparing a stored row against the
/// archive's current metadata. 1 ms, matching the spec's cache-row invariant.
const MTIME_TOLERANCE_SECS: f64 = 0.001;

/// Persistent key-value store mapping archive filename to extracted references.
pub struct ReferenceCache {
    conn: Option<Connection>,
}

impl ReferenceCache {
    /// What: Open (or create) the reference cache inside `install_dir/Cache`.
    ///
    /// Inputs:
    /// - `install_dir`: the installation root; its `Cache` subdirectory is
    ///   created if absent.
    ///
    /// Output:
    /// - A `ReferenceCache` that is either backed by a live connection or
    ///   degraded to a no-op, depending on whether the database could be
    ///   opened.
    ///
    /// Details:
    /// - Uses `PRAGMA journal_mode=WAL` where supported.
    /// - Any failure (directory creation, connection open, table creation)
    ///   degrades the cache to no-op mode and logs a warning; it never
    ///   propagates to the caller.
    #[must_use]
    pub fn open(install_dir: &Path) -> Self {
        match Self::try_open(install_dir) {
            Ok(conn) => Self { conn: Some(conn) },
            Err(e) => {
                tracing::warn!(error = %e, "reference cache unavailable, falling back to no-op");
                Self { conn: None }
            }
        }
    }

    /// What: Attempt to open the backing connection and ensure its schema.
    ///
    /// Inputs:
    /// - `install_dir`: the installation root.
    ///
    /// Output:
    /// - `Ok(Connection)` ready for use, `Err` on any I/O or SQL failure.
    fn try_open(install_dir: &Path) -> Result<Connection, Box<dyn std::error::Error>> {
        let cache_dir = install_dir.join("Cache");
        std::fs::create_dir_all(&cache_dir)?;
        let db_name = env_cache_db_name().unwrap_or_else(|| DEFAULT_DB_NAME.to_string());
        let db_path = cache_dir.join(db_name);

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS package_refs (
                filename TEXT PRIMARY KEY,
                mtime    REAL NOT NULL,
                size     INTEGER NOT NULL,
                refs     TEXT NOT NULL
            )",
            (),
        )?;
        Ok(conn)
    }

    /// What: Look up cached references for `path` if its metadata is unchanged.
    ///
    /// Inputs:
    /// - `path`: the archive's current path on disk.
    ///
    /// Output:
    /// - `Some(refs)` when a row exists for `path`'s basename and its stored
    ///   `(mtime, size)` matches the live file (mtime within 1 ms, size
    ///   exact); `None` on a miss or any error.
    #[must_use]
    pub fn lookup(&self, path: &Path) -> Option<BTreeSet<String>> {
        let conn = self.conn.as_ref()?;
        let filename = path.file_name()?.to_str()?;
        let metadata = std::fs::metadata(path).ok()?;
        let live_mtime = mtime_secs(&metadata)?;
        let live_size = metadata.len();

        let row: rusqlite::Result<(f64, i64, String)> = conn.query_row(
            "SELECT mtime, size, refs FROM package_refs WHERE filename = ?1",
            [filename],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        );
        let (stored_mtime, stored_size, refs_json) = row.ok()?;

        if (stored_mtime - live_mtime).abs() < MTIME_TOLERANCE_SECS
            && stored_size == i64::try_from(live_size).unwrap_or(i64::MAX)
        {
            let refs: Vec<String> = serde_json::from_str(&refs_json).ok()?;
            Some(refs.into_iter().collect())
        } else {
            None
        }
    }

    /// What: Persist `refs` for `path`, keyed on its basename.
    ///
    /// Inputs:
    /// - `path`: the archive's current path on disk.
    /// - `refs`: the reference set extracted for it.
    ///
    /// Output: None.
    ///
    /// Details:
    /// - Overwrites any existing row for the same filename.
    /// - Stores `refs` as a sorted JSON array.
    /// - Any error (cache disabled, I/O failure) is swallowed silently.
    pub fn store(&self, path: &Path, refs: &BTreeSet<String>) {
        let Some(conn) = self.conn.as_ref() else {
            return;
        };
        let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
            return;
        };
        let Ok(metadata) = std::fs::metadata(path) else {
            return;
        };
        let Some(mtime) = mtime_secs(&metadata) else {
            return;
        };
        let size = metadata.len();
        let sorted: Vec<&String> = refs.iter().collect();
        let Ok(refs_json) = serde_json::to_string(&sorted) else {
            return;
        };

        let _ = conn.execute(
            "INSERT OR REPLACE INTO package_refs (filename, mtime, size, refs)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![filename, mtime, i64::try_from(size).unwrap_or(i64::MAX), refs_json],
        );
    }

    /// What: Delete every row whose filename is not present in `known_filenames`.
    ///
    /// Inputs:
    /// - `known_filenames`: the basenames of archives currently in the index.
    ///
    /// Output: None.
    ///
    /// Details:
    /// - A no-op when the cache is disabled.
    pub fn prune(&self, known_filenames: &std::collections::HashSet<String>) {
        let Some(conn) = self.conn.as_ref() else {
            return;
        };
        let Ok(mut stmt) = conn.prepare("SELECT filename FROM package_refs") else {
            return;
        };
        let Ok(rows) = stmt.query_map((), |row| row.get::<_, String>(0)) else {
            return;
        };
        let stale: Vec<String> = rows
            .flatten()
            .filter(|f| !known_filenames.contains(f))
            .collect();
        drop(stmt);
        for filename in stale {
            let _ = conn.execute(
                "DELETE FROM package_refs WHERE filename = ?1",
                [filename],
            );
        }
    }

    /// What: Release the cache's backing connection.
    ///
    /// Inputs: None.
    ///
    /// Output: None.
    ///
    /// Details:
    /// - `Connection`'s `Drop` impl already closes the handle; this exists to
    ///   make the lifecycle explicit at call sites, matching the surface
    ///   described in the cache's design.
    pub fn close(self) {
        drop(self.conn);
    }
}

/// What: Convert filesystem metadata's modified time to seconds since epoch.
///
/// Inputs:
/// - `metadata`: file metadata obtained from `fs::metadata`.
///
/// Output:
/// - `Some(seconds)` as an `f64` with sub-second precision, `None` if the
///   platform cannot report a modified time.
fn mtime_secs(metadata: &std::fs::Metadata) -> Option<f64> {
    let modified = metadata.modified().ok()?;
    let duration = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(duration.as_secs_f64())
}
