//! Revision selection
//!
//! Slow targets cannot test every pulled revision. Within a lookback window
//! the selector finds maximal runs of untested history and, for historic
//! targets, bisects the longest run; tip-tracking targets test the current
//! revision instead.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use nightshift_core::error::HistoryError;
use nightshift_core::{BuildHistoryItem, RemoteTarget, RevisionGraph, RevisionPair};

use crate::traits::HistorySource;

/// Later `(days, gap)` windows, tried after the target's own window with gap 2
pub const FALLBACK_WINDOWS: [(u32, usize); 2] = [(200, 5), (2000, 1)];

/// Gap required in the target's own window
const FIRST_GAP: usize = 2;

/// Maximal runs of unknown items, ignoring the leading known items
pub fn unknown_runs(items: &[BuildHistoryItem]) -> Vec<&[BuildHistoryItem]> {
    let mut runs = Vec::new();
    let mut rest = items;
    loop {
        let skip = rest.iter().take_while(|i| i.known).count();
        rest = &rest[skip..];
        let len = rest.iter().take_while(|i| i.unknown()).count();
        if len == 0 {
            return runs;
        }
        runs.push(&rest[..len]);
        rest = &rest[len..];
    }
}

/// Choose a revision pair from one window of history
fn choose(
    items: &[BuildHistoryItem],
    gap: usize,
    historic: bool,
    revision: &str,
    library_revision: Option<&str>,
) -> Option<RevisionPair> {
    let runs: Vec<&[BuildHistoryItem]> = unknown_runs(items)
        .into_iter()
        .filter(|run| run.len() >= gap)
        .collect();

    if historic || items.iter().any(|i| i.known_versions(revision, library_revision)) {
        // Earliest run wins ties
        let longest = runs.iter().fold(&[][..], |acc: &[BuildHistoryItem], run| {
            if acc.len() >= run.len() {
                acc
            } else {
                *run
            }
        });
        longest.get(longest.len() / 2).map(BuildHistoryItem::pair)
    } else if !revision.is_empty() {
        Some(RevisionPair::new(revision, library_revision.map(str::to_string)))
    } else {
        runs.iter()
            .flat_map(|run| run.iter())
            .next()
            .map(BuildHistoryItem::pair)
    }
}

/// Picks the next revision pair a target should test
pub struct RevisionSelector<'a> {
    history: &'a dyn HistorySource,
    graph: Option<&'a dyn RevisionGraph>,
    default_days: u32,
    now: DateTime<Utc>,
}

impl<'a> RevisionSelector<'a> {
    pub fn new(history: &'a dyn HistorySource, default_days: u32) -> Self {
        Self {
            history,
            graph: None,
            default_days,
            now: Utc::now(),
        }
    }

    /// Repository used for baseline filtering and revision normalization
    pub fn with_graph(mut self, graph: &'a dyn RevisionGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Evaluate windows relative to `now` instead of the current time
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Pick a pair for `target`, loosening the window until something is found.
    ///
    /// `revision` is the current main revision (empty if unknown) and
    /// `library_revision` the current library revision, if any.
    #[instrument(skip(self, target), fields(target_name = %target.name))]
    pub fn pick(
        &self,
        target: &RemoteTarget,
        revision: &str,
        library_revision: Option<&str>,
    ) -> Result<Option<RevisionPair>, HistoryError> {
        let revision = match (self.graph, revision.is_empty()) {
            (Some(graph), false) => graph.resolve(revision)?,
            _ => revision.to_string(),
        };
        let descendants = self.baseline_descendants(target)?;

        let windows = std::iter::once((target.history_days(self.default_days), FIRST_GAP))
            .chain(FALLBACK_WINDOWS);
        for (days, gap) in windows {
            let picked = self.pick_days_filtered(
                target,
                days,
                gap,
                &revision,
                library_revision,
                descendants.as_ref(),
            )?;
            if let Some(pair) = picked {
                info!(days, gap, pair = %pair, "picked revision");
                return Ok(Some(pair));
            }
        }

        info!("nothing to pick");
        Ok(None)
    }

    /// Pick a pair from a single `days` window, keeping runs of at least `gap`
    pub fn pick_days(
        &self,
        target: &RemoteTarget,
        days: u32,
        gap: usize,
        revision: &str,
        library_revision: Option<&str>,
    ) -> Result<Option<RevisionPair>, HistoryError> {
        let descendants = self.baseline_descendants(target)?;
        self.pick_days_filtered(target, days, gap, revision, library_revision, descendants.as_ref())
    }

    fn pick_days_filtered(
        &self,
        target: &RemoteTarget,
        days: u32,
        gap: usize,
        revision: &str,
        library_revision: Option<&str>,
        descendants: Option<&HashSet<String>>,
    ) -> Result<Option<RevisionPair>, HistoryError> {
        let mut items = self.history.query(target, days, self.now)?;
        if let Some(reachable) = descendants {
            items.retain(|i| reachable.contains(&i.revision));
        }
        debug!(days, gap, items = items.len(), "selecting from history window");
        Ok(choose(&items, gap, target.historic, revision, library_revision))
    }

    fn baseline_descendants(
        &self,
        target: &RemoteTarget,
    ) -> Result<Option<HashSet<String>>, HistoryError> {
        let Some(baseline) = &target.baseline else {
            return Ok(None);
        };
        let graph = self
            .graph
            .ok_or_else(|| HistoryError::BaselineWithoutRepository(baseline.clone()))?;
        Ok(Some(graph.descendants(baseline)?))
    }
}
