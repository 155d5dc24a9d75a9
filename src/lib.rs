//! # dita-tidy
//!
//! Maintenance tools for DITA/XML documentation sets.
//!
//! ## Features
//!
//! - Duplicate identifier resolution with `ttu_<id>_<n>` renames
//! - Reference rewriting for `href` and `conref`, byte-preserving
//! - Backups and an audit log in an escrow directory (`LegacyTextTuring`)
//! - Mini-TOC validation of parent topics against a map
//! - Mini-TOC synthesis for title-only heading topics
//! - Unreferenced topic discovery
//!
//! ## Example
//!
//! ```rust,ignore
//! use dita_tidy::Project;
//!
//! let mut project = Project::new("docs/content");
//! let report = project.remove_duplicate_ids();
//! println!("{}", report.summary());
//!
//! if let Some(map) = project.discover_map() {
//!     for defect in project.validate_toc(&map) {
//!         println!("{}: {}", defect.owner, defect.message);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod config;
pub mod error;
pub mod limits;

// Files and paths
pub mod corpus;
pub mod documents;
pub mod loaders;
pub mod locations;

// Duplicate identifiers
pub mod dedup;
pub mod identifiers;
pub mod rewrite;

// Backups and audit log
pub mod escrow;

// Maps and mini-TOCs
pub mod toc;
pub mod unreferenced;

pub mod project;

// Re-exports for convenience
pub use config::Config;
pub use error::{Error, Result};
pub use escrow::{Escrow, OperationKind};
pub use project::{FixSummary, Project};
pub use rewrite::DedupReport;
pub use toc::{EmptyHeading, TocDefect};

/// Version of the dita-tidy library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
