//! Nightshift Select - Build history and revision selection
//!
//! This crate holds the build-history store a target's past builds are looked
//! up in, and the selector that decides which revision pair to test next.

mod history;
mod selector;
mod traits;

pub use history::{BuildRecord, JsonHistoryStore, PullRecord};
pub use selector::{unknown_runs, RevisionSelector, FALLBACK_WINDOWS};
pub use traits::HistorySource;
