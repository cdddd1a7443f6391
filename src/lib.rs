//! Package indexing and dependency-graph engine for Virt-a-Mate content
//! archives (`.var` files).
//!
//! This crate scans an installation directory for `.var` archives, extracts
//! their declared dependencies (from a manifest or, failing that, scraped
//! from text assets), and builds a forward/reverse dependency graph that
//! answers queries like "what does this package need", "what depends on
//! this package", "what's missing", and "what's safe to delete".
//!
//! # Example
//!
//! ```no_run
//! use vam_pkg_core::PackageManager;
//! use std::path::Path;
//!
//! # fn example() -> vam_pkg_core::Result<()> {
//! let mut manager = PackageManager::new(Path::new("/path/to/AddonPackages"), None)?;
//! if let Some(info) = manager.package_info("Author.Package.1") {
//!     println!("{} direct deps, {} MB", info.direct_deps.len(), info.size_mb);
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cache;
pub mod delete;
pub mod env;
pub mod error;
pub mod graph;
pub mod id;
pub mod manager;
pub mod resolver;
pub mod scanner;
pub mod types;

/// Prelude module for convenient imports.
///
/// Re-exports the crate's commonly used types so callers can write
/// `use vam_pkg_core::prelude::*;` instead of importing each module path.
pub mod prelude;

pub use error::{PkgManagerError as Error, Result};
pub use manager::PackageManager;
pub use scanner::PackageIndex;
pub use types::PackageInfo;
