//! Prelude module for convenient imports.
//!
//! Re-exports the crate's commonly used types, allowing
//! `use vam_pkg_core::prelude::*;` instead of per-module imports.

pub use crate::cache::ReferenceCache;
pub use crate::delete::{DeleteOutcome, DeletePlan};
pub use crate::error::{PkgManagerError as Error, Result};
pub use crate::graph::DependencyGraph;
pub use crate::manager::PackageManager;
pub use crate::scanner::PackageIndex;
pub use crate::types::PackageInfo;
