//! Error types for Nightshift

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using NightshiftError
pub type Result<T> = std::result::Result<T, NightshiftError>;

/// Main error type for Nightshift operations
#[derive(Debug, Error)]
pub enum NightshiftError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Run lock errors
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Git-related errors
    #[error(transparent)]
    Git(#[from] GitError),

    /// Build history errors
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Remote build errors
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Unknown build target
    #[error("Unknown build target: {0}")]
    UnknownTarget(String),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Soft lock errors
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run holds the lock
    #[error("Already running: {0}")]
    AlreadyRunning(String),

    /// Failed to read, write or delete the lock file
    #[error("Lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Git-related errors
#[derive(Debug, Error)]
pub enum GitError {
    /// Repository not found
    #[error("Git repository not found at {0}")]
    RepositoryNotFound(PathBuf),

    /// Failed to open repository
    #[error("Failed to open repository: {0}")]
    OpenFailed(String),

    /// Revision could not be resolved
    #[error("Unknown revision: {0}")]
    UnknownRevision(String),

    /// Git2 library error
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),
}

/// Build history errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Failed to read or write the history store
    #[error("History store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// History store content is malformed
    #[error("Malformed history store {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Revision graph query failed during selection
    #[error("Revision graph query failed: {0}")]
    Graph(#[from] GitError),

    /// A baseline is configured but no repository is available to resolve it
    #[error("Baseline {0} requires a repository")]
    BaselineWithoutRepository(String),
}

/// Remote build errors
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Could not establish a session to the host
    #[error("Failed to connect to {host}: {reason}")]
    ConnectFailed { host: String, reason: String },

    /// The remote build tool failed
    #[error("Remote build {name} failed on {host}: {reason}")]
    BuildFailed {
        name: String,
        host: String,
        reason: String,
    },

    /// Fetching an artifact failed
    #[error("Failed to fetch {artifact} from {host}: {reason}")]
    FetchFailed {
        artifact: String,
        host: String,
        reason: String,
    },

    /// Local process spawning failed
    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}
