//! Nightshift Git - Revision graph queries
//!
//! This crate answers the version-control questions the orchestrator asks:
//! the current revision of a checkout, full ids of revision expressions and
//! which revisions descend from a baseline.

mod graph;
mod repository;
pub mod types;

pub use repository::{GitRepo, Result};
pub use types::CommitInfo;
