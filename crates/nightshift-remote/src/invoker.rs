//! Remote build invocation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use nightshift_core::{BuildArtifact, RemoteTarget, RevisionPair};
use nightshift_select::{BuildRecord, HistorySource};
use nightshift_tasks::Logger;

use crate::session::SessionGuard;
use crate::traits::{BuildRequest, RemoteExecutor};

/// Metadata written next to the artifacts of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMeta {
    pub task: String,
    pub invocation: String,
    pub host: String,
    pub revision: String,
    pub library_revision: Option<String>,
    pub started: DateTime<Utc>,
    /// Artifact paths relative to the log directory
    pub artifacts: Vec<String>,
}

/// Runs remote builds and stores their artifacts
#[derive(Clone)]
pub struct RemoteBuildInvoker {
    executor: Arc<dyn RemoteExecutor>,
    history: Arc<dyn HistorySource>,
}

impl RemoteBuildInvoker {
    pub fn new(executor: Arc<dyn RemoteExecutor>, history: Arc<dyn HistorySource>) -> Self {
        Self { executor, history }
    }

    /// Build `pair` on `target` as `invocation`, writing artifacts into
    /// `<log_dir>/<invocation>/`. Returns the written artifact paths.
    pub fn invoke(
        &self,
        logger: &Logger,
        target: &RemoteTarget,
        invocation: &str,
        pair: &RevisionPair,
    ) -> anyhow::Result<Vec<PathBuf>> {
        let started = Utc::now();
        logger.log(format!("building {} on {}", pair, target.host));

        let artifacts = {
            let session = self
                .executor
                .open_session(target)
                .with_context(|| format!("{} session to {}", self.executor.name(), target.host))?;
            let mut session = SessionGuard::new(session);
            session.run_remote_build(target, &BuildRequest::new(invocation, pair.clone()))?
        };

        // One directory per invocation, the log directory is shared by every task
        let artifact_dir = logger.log_dir().join(invocation);
        std::fs::create_dir_all(&artifact_dir)
            .with_context(|| format!("Failed to create {}", artifact_dir.display()))?;

        let mut written = Vec::with_capacity(artifacts.len());
        let mut stored = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            let path = write_artifact(&artifact_dir, artifact)?;
            logger.log(format!("artifact {}", path.display()));
            let relative = path.strip_prefix(logger.log_dir()).unwrap_or(&path);
            stored.push(relative.display().to_string());
            written.push(path);
        }

        let meta = BuildMeta {
            task: logger.name().to_string(),
            invocation: invocation.to_string(),
            host: target.host.clone(),
            revision: pair.revision.clone(),
            library_revision: pair.library_revision.clone(),
            started,
            artifacts: stored,
        };
        let meta_path = logger.log_dir().join(format!("{}.meta.json", invocation));
        let content = serde_json::to_string_pretty(&meta)?;
        std::fs::write(&meta_path, content)
            .with_context(|| format!("Failed to write {}", meta_path.display()))?;

        let record = BuildRecord {
            target: target.name.clone(),
            revision: pair.revision.clone(),
            library_revision: pair.library_revision.clone(),
            date: Utc::now(),
        };
        if let Err(e) = self.history.record_build(record) {
            warn!(target_name = %target.name, error = %e, "failed to record build");
            logger.log(format!("could not record build: {}", e));
        }

        info!(target_name = %target.name, invocation, artifacts = written.len(), "build stored");
        Ok(written)
    }
}

fn write_artifact(dir: &Path, artifact: &BuildArtifact) -> anyhow::Result<PathBuf> {
    let file_name = Path::new(&artifact.name)
        .file_name()
        .ok_or_else(|| anyhow!("Invalid artifact name: {:?}", artifact.name))?;
    let path = dir.join(file_name);
    std::fs::write(&path, &artifact.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
