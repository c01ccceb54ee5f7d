//! Remote execution traits

use nightshift_core::error::RemoteError;
use nightshift_core::{BuildArtifact, RemoteTarget, RevisionPair};

/// One invocation of the external build tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Invocation name (task name, `_<i>` suffixed for shards)
    pub invocation: String,
    /// Revision pair to build
    pub pair: RevisionPair,
}

impl BuildRequest {
    pub fn new(invocation: impl Into<String>, pair: RevisionPair) -> Self {
        Self {
            invocation: invocation.into(),
            pair,
        }
    }
}

/// Opens sessions to build hosts
pub trait RemoteExecutor: Send + Sync {
    /// Name of the execution backend (e.g., "ssh")
    fn name(&self) -> &'static str;

    /// Open a session to the target's host
    fn open_session(&self, target: &RemoteTarget) -> Result<Box<dyn RemoteSession>, RemoteError>;
}

/// An open connection to a build host
pub trait RemoteSession: Send {
    /// Host the session is connected to
    fn host(&self) -> &str;

    /// Run the build tool and return its log artifacts
    fn run_remote_build(
        &mut self,
        target: &RemoteTarget,
        request: &BuildRequest,
    ) -> Result<Vec<BuildArtifact>, RemoteError>;

    /// Tear the session down
    fn close(&mut self) -> Result<(), RemoteError>;
}
