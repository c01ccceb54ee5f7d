//! JSON file build-history store

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use nightshift_core::error::HistoryError;
use nightshift_core::{BuildHistoryItem, RemoteTarget, RevisionPair};

use crate::traits::HistorySource;

/// A revision pair pulled into the local repositories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRecord {
    pub revision: String,
    #[serde(default)]
    pub library_revision: Option<String>,
    pub pull_date: DateTime<Utc>,
}

impl PullRecord {
    pub fn new(pair: RevisionPair, pull_date: DateTime<Utc>) -> Self {
        Self {
            revision: pair.revision,
            library_revision: pair.library_revision,
            pull_date,
        }
    }

    fn same_pair(&self, revision: &str, library_revision: Option<&str>) -> bool {
        self.revision == revision && self.library_revision.as_deref() == library_revision
    }
}

/// A completed build of a revision pair by some target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Target identifier matched by detection predicates
    pub target: String,
    pub revision: String,
    #[serde(default)]
    pub library_revision: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    pulls: Vec<PullRecord>,
    #[serde(default)]
    builds: Vec<BuildRecord>,
}

/// History store kept in a single JSON file
#[derive(Debug)]
pub struct JsonHistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HistoryFile, HistoryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HistoryFile::default()),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&content).map_err(|source| HistoryError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, file: &HistoryFile) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let content = serde_json::to_string_pretty(file).map_err(|source| HistoryError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn update(&self, f: impl FnOnce(&mut HistoryFile) -> bool) -> Result<(), HistoryError> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut file = self.load()?;
        if f(&mut file) {
            self.save(&file)?;
        }
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl HistorySource for JsonHistoryStore {
    #[instrument(skip(self, target), fields(target_name = %target.name))]
    fn query(
        &self,
        target: &RemoteTarget,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<BuildHistoryItem>, HistoryError> {
        let file = {
            let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
            self.load()?
        };
        let cutoff = now - Duration::days(i64::from(days));

        let mut pulls: Vec<&PullRecord> = file
            .pulls
            .iter()
            .filter(|p| p.pull_date >= cutoff && p.pull_date <= now)
            .collect();
        pulls.sort_by_key(|p| p.pull_date);

        let mut items: Vec<BuildHistoryItem> = Vec::with_capacity(pulls.len());
        for pull in pulls {
            if items.iter().any(|i| {
                i.revision == pull.revision && i.library_revision == pull.library_revision
            }) {
                continue;
            }
            let known = file.builds.iter().any(|b| {
                target.detects(&b.target)
                    && b.revision == pull.revision
                    && b.library_revision == pull.library_revision
            });
            items.push(BuildHistoryItem {
                known,
                revision: pull.revision.clone(),
                library_revision: pull.library_revision.clone(),
                pull_date: pull.pull_date,
            });
        }

        debug!(days, items = items.len(), "queried build history");
        Ok(items)
    }

    fn record_pull(&self, pull: PullRecord) -> Result<(), HistoryError> {
        self.update(|file| {
            if file
                .pulls
                .iter()
                .any(|p| p.same_pair(&pull.revision, pull.library_revision.as_deref()))
            {
                debug!(revision = %pull.revision, "pull already recorded");
                return false;
            }
            info!(revision = %pull.revision, "recording pull");
            file.pulls.push(pull);
            true
        })
    }

    fn record_build(&self, build: BuildRecord) -> Result<(), HistoryError> {
        self.update(|file| {
            info!(build_target = %build.target, revision = %build.revision, "recording build");
            file.builds.push(build);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use nightshift_core::config::TargetConfig;
    use tempfile::TempDir;

    fn target(name: &str) -> RemoteTarget {
        RemoteTarget::from_config(&TargetConfig {
            name: name.to_string(),
            host: "host.example.org".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, 3, 0, 0).unwrap()
    }

    fn pull(rev: &str, d: u32) -> PullRecord {
        PullRecord::new(RevisionPair::new(rev, Some(format!("lib-{}", rev))), day(d))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(temp.path().join("history.json"));
        let items = store.query(&target("linux"), 30, day(16)).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_query_orders_and_tags_known() {
        let temp = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(temp.path().join("history.json"));
        store.record_pull(pull("c", 12)).unwrap();
        store.record_pull(pull("a", 10)).unwrap();
        store.record_pull(pull("b", 11)).unwrap();
        store
            .record_build(BuildRecord {
                target: "linux".to_string(),
                revision: "b".to_string(),
                library_revision: Some("lib-b".to_string()),
                date: day(11),
            })
            .unwrap();

        let items = store.query(&target("linux"), 30, day(16)).unwrap();
        let revs: Vec<_> = items.iter().map(|i| i.revision.as_str()).collect();
        assert_eq!(revs, vec!["a", "b", "c"]);
        let known: Vec<_> = items.iter().map(|i| i.known).collect();
        assert_eq!(known, vec![false, true, false]);

        // Another target has not built anything
        let other = store.query(&target("macos"), 30, day(16)).unwrap();
        assert!(other.iter().all(|i| !i.known));
    }

    #[test]
    fn test_query_window() {
        let temp = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(temp.path().join("history.json"));
        store.record_pull(pull("old", 1)).unwrap();
        store.record_pull(pull("new", 14)).unwrap();

        let items = store.query(&target("linux"), 5, day(16)).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].revision, "new");
    }

    #[test]
    fn test_duplicate_pull_ignored() {
        let temp = TempDir::new().unwrap();
        let store = JsonHistoryStore::new(temp.path().join("history.json"));
        store.record_pull(pull("a", 10)).unwrap();
        store.record_pull(pull("a", 11)).unwrap();

        let items = store.query(&target("linux"), 30, day(16)).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].pull_date, day(10));
    }

    #[test]
    fn test_malformed_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.json");
        std::fs::write(&path, "not json").unwrap();
        let store = JsonHistoryStore::new(&path);
        assert!(matches!(
            store.query(&target("linux"), 30, day(16)),
            Err(HistoryError::Malformed { .. })
        ));
    }
}
