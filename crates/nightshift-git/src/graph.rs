//! Revision graph queries

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use git2::{Oid, Sort};
use tracing::{debug, instrument};

use nightshift_core::error::GitError;
use nightshift_core::RevisionGraph;

use crate::repository::{GitRepo, Result};
use crate::types::CommitInfo;

impl GitRepo {
    /// Resolve a revision expression (id prefix, branch, tag) to a commit id
    pub fn resolve(&self, rev: &str) -> Result<String> {
        Ok(self.resolve_oid(rev)?.to_string())
    }

    fn resolve_oid(&self, rev: &str) -> Result<Oid> {
        self.repo
            .revparse_single(rev)
            .and_then(|object| object.peel_to_commit())
            .map(|commit| commit.id())
            .map_err(|_| GitError::UnknownRevision(rev.to_string()))
    }

    /// All commits that are `base` or have it as an ancestor, over every ref
    #[instrument(skip(self))]
    pub fn descendants_of(&self, base: &str) -> Result<HashSet<String>> {
        let base_oid = self.resolve_oid(base)?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        revwalk.push_glob("refs/*")?;
        if let Some(head) = self.repo.head().ok().and_then(|h| h.target()) {
            revwalk.push(head)?;
        }

        // Parents precede children in reverse topological order
        let mut reached: HashSet<Oid> = HashSet::new();
        for oid in revwalk {
            let oid = oid?;
            if oid == base_oid {
                reached.insert(oid);
                continue;
            }
            let commit = self.repo.find_commit(oid)?;
            if commit.parent_ids().any(|p| reached.contains(&p)) {
                reached.insert(oid);
            }
        }
        reached.insert(base_oid);

        debug!(base, count = reached.len(), "collected descendants");
        Ok(reached.into_iter().map(|oid| oid.to_string()).collect())
    }

    /// Summary of a single commit
    pub fn commit_info(&self, rev: &str) -> Result<CommitInfo> {
        let oid = self.resolve_oid(rev)?;
        let commit = self.repo.find_commit(oid)?;
        let author = commit.author();

        let timestamp = Utc
            .timestamp_opt(commit.time().seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Ok(CommitInfo::new(
            oid.to_string(),
            commit.summary().unwrap_or("(no message)"),
            author.name().unwrap_or("Unknown"),
            timestamp,
        ))
    }
}

impl RevisionGraph for GitRepo {
    fn resolve(&self, rev: &str) -> Result<String> {
        GitRepo::resolve(self, rev)
    }

    fn descendants(&self, base: &str) -> Result<HashSet<String>> {
        self.descendants_of(base)
    }
}
