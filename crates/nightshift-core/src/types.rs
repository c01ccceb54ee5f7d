//! Shared types

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GitError;

/// Date format used in log lines and the lock file
pub const LOG_DATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

/// Render a date the way log lines and the lock file show it
pub fn print_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    date.format(LOG_DATE_FORMAT).to_string()
}

/// Name of the machine running the orchestrator
pub fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}

/// A revision of the main tree, optionally paired with a library revision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionPair {
    /// Main revision
    pub revision: String,
    /// Companion library revision
    pub library_revision: Option<String>,
}

impl RevisionPair {
    /// Create a new pair
    pub fn new(revision: impl Into<String>, library_revision: Option<String>) -> Self {
        Self {
            revision: revision.into(),
            library_revision,
        }
    }
}

impl fmt::Display for RevisionPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.library_revision {
            Some(lib) => write!(f, "{} (library {})", self.revision, lib),
            None => write!(f, "{}", self.revision),
        }
    }
}

/// One row of build history for a target, ordered by pull date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildHistoryItem {
    /// Whether the target already has a recorded build of this pair
    pub known: bool,
    /// Main revision
    pub revision: String,
    /// Library revision pulled together with `revision`
    pub library_revision: Option<String>,
    /// When the pair was pulled
    pub pull_date: DateTime<Utc>,
}

impl BuildHistoryItem {
    pub fn unknown(&self) -> bool {
        !self.known
    }

    /// The revision pair of this item
    pub fn pair(&self) -> RevisionPair {
        RevisionPair::new(self.revision.clone(), self.library_revision.clone())
    }

    /// Known item whose versions equal the given current revision pair.
    ///
    /// An empty `revision` never matches; a missing `library_revision` matches
    /// any library revision.
    pub fn known_versions(&self, revision: &str, library_revision: Option<&str>) -> bool {
        self.known
            && !revision.is_empty()
            && self.revision == revision
            && match library_revision {
                None => true,
                Some(lib) => !lib.is_empty() && self.library_revision.as_deref() == Some(lib),
            }
    }
}

/// A named log artifact returned by a remote build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    /// File name of the artifact
    pub name: String,
    /// Raw content
    pub bytes: Vec<u8>,
}

impl BuildArtifact {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Graph queries against a version-control repository
pub trait RevisionGraph {
    /// Resolve a revision expression to its full id
    fn resolve(&self, rev: &str) -> std::result::Result<String, GitError>;

    /// Ids of `base` and every revision that has `base` as an ancestor
    fn descendants(&self, base: &str) -> std::result::Result<HashSet<String>, GitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(known: bool, rev: &str, lib: Option<&str>) -> BuildHistoryItem {
        BuildHistoryItem {
            known,
            revision: rev.to_string(),
            library_revision: lib.map(str::to_string),
            pull_date: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_known_versions() {
        let it = item(true, "abc", Some("lib1"));
        assert!(it.known_versions("abc", None));
        assert!(it.known_versions("abc", Some("lib1")));
        assert!(!it.known_versions("abc", Some("lib2")));
        assert!(!it.known_versions("abc", Some("")));
        assert!(!it.known_versions("", None));
        assert!(!item(false, "abc", None).known_versions("abc", None));
    }

    #[test]
    fn test_print_date() {
        let date = Utc.with_ymd_and_hms(2026, 3, 7, 4, 5, 6).unwrap();
        assert_eq!(print_date(&date), "07-Mar-2026 04:05:06 +0000");
    }

    #[test]
    fn test_revision_pair_display() {
        assert_eq!(RevisionPair::new("abc", None).to_string(), "abc");
        assert_eq!(
            RevisionPair::new("abc", Some("def".to_string())).to_string(),
            "abc (library def)"
        );
    }
}
