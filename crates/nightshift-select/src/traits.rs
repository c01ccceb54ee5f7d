//! Build history traits

use chrono::{DateTime, Utc};

use nightshift_core::error::HistoryError;
use nightshift_core::{BuildHistoryItem, RemoteTarget};

use crate::history::{BuildRecord, PullRecord};

/// Source of build history
pub trait HistorySource: Send + Sync {
    /// Pulls within the last `days` days before `now`, ordered by pull date,
    /// each tagged known if a build detected as `target`'s exists for it
    fn query(
        &self,
        target: &RemoteTarget,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<BuildHistoryItem>, HistoryError>;

    /// Record that a revision pair was pulled
    fn record_pull(&self, pull: PullRecord) -> Result<(), HistoryError>;

    /// Record that a target built a revision pair
    fn record_build(&self, build: BuildRecord) -> Result<(), HistoryError>;
}
