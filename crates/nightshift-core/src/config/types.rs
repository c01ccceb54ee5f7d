//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::{
    CUMULATIVE_LOG_FILE, CURRENT_LOG_FILE, DEFAULT_HISTORY_DAYS, DEFAULT_POLL_INTERVAL_MS,
    HISTORY_FILE, LOCK_FILE,
};

/// Main configuration for Nightshift
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run state and log locations
    pub run: RunConfig,

    /// Local repositories the revisions are taken from
    pub repository: RepositoryConfig,

    /// Build history store
    pub history: HistoryConfig,

    /// Remote execution settings shared by all targets
    pub remote: RemoteConfig,

    /// Remote build targets
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// Run state and log locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base directory; other paths default to locations below it
    pub main_dir: Option<PathBuf>,

    /// Soft lock file
    pub lock_file: Option<PathBuf>,

    /// Log of the current run (truncated at start)
    pub current_log: Option<PathBuf>,

    /// Log accumulated over all runs
    pub cumulative_log: Option<PathBuf>,

    /// Root of the per-run log directories
    pub log_root: Option<PathBuf>,

    /// Interval between liveness checks of parallel tasks
    pub poll_interval_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            main_dir: None,
            lock_file: None,
            current_log: None,
            cumulative_log: None,
            log_root: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl RunConfig {
    pub fn main_dir(&self) -> PathBuf {
        self.main_dir
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".nightshift")))
            .unwrap_or_else(|| PathBuf::from(".nightshift"))
    }

    pub fn lock_file(&self) -> PathBuf {
        self.lock_file
            .clone()
            .unwrap_or_else(|| self.main_dir().join("run").join(LOCK_FILE))
    }

    pub fn current_log(&self) -> PathBuf {
        self.current_log
            .clone()
            .unwrap_or_else(|| self.main_dir().join("run").join(CURRENT_LOG_FILE))
    }

    pub fn cumulative_log(&self) -> PathBuf {
        self.cumulative_log
            .clone()
            .unwrap_or_else(|| self.main_dir().join("log").join(CUMULATIVE_LOG_FILE))
    }

    pub fn log_root(&self) -> PathBuf {
        self.log_root
            .clone()
            .unwrap_or_else(|| self.main_dir().join("log"))
    }
}

/// Local repositories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Main repository
    pub main: PathBuf,

    /// Companion library repository, tested jointly with the main one
    pub library: Option<PathBuf>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            main: PathBuf::from("."),
            library: None,
        }
    }
}

/// Build history store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// History store file (defaults to `<main_dir>/history.json`)
    pub path: Option<PathBuf>,

    /// Lookback window used before falling back to longer ones
    pub default_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            default_days: DEFAULT_HISTORY_DAYS,
        }
    }
}

impl HistoryConfig {
    pub fn path(&self, run: &RunConfig) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| run.main_dir().join(HISTORY_FILE))
    }
}

/// Remote execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// ssh client binary
    pub ssh_command: String,

    /// Build tool invoked on the remote host
    pub build_command: String,

    /// Remote directory receiving build artifacts
    pub remote_dir: String,

    /// ssh connect timeout in seconds
    pub connect_timeout: u64,

    /// Local directory for ssh control sockets
    pub control_dir: Option<PathBuf>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            ssh_command: "ssh".to_string(),
            build_command: "nightly-build".to_string(),
            remote_dir: "/tmp/nightshift".to_string(),
            connect_timeout: 30,
            control_dir: None,
        }
    }
}

/// A remote build target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Descriptive name, unique among targets
    pub name: String,

    /// Build host
    pub host: String,

    /// Remote user (defaults to the ssh client's choice)
    pub user: Option<String>,

    /// ssh port
    pub port: u16,

    /// Additional hosts taking part in the build
    pub extra_hosts: Vec<String>,

    /// Also backfill old untested gaps instead of tracking the tip only
    pub historic: bool,

    /// History window in days (combined with `history.default_days`)
    pub history: u32,

    /// Only test descendants of this revision
    pub baseline: Option<String>,

    /// Options passed to the build tool
    pub options: String,

    /// Extra arguments passed to the build tool
    pub args: String,

    /// Regex selecting the build records that belong to this target
    pub detect: Option<String>,

    /// Weekdays the target is active on (empty: every day)
    pub active_days: Vec<String>,

    /// Plan phase; phases run in ascending order
    pub phase: u32,

    /// Targets in the same group run one after another
    pub group: Option<String>,

    /// Number of concurrent build invocations
    pub shards: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            host: String::new(),
            user: None,
            port: 22,
            extra_hosts: Vec::new(),
            historic: false,
            history: 0,
            baseline: None,
            options: String::new(),
            args: String::new(),
            detect: None,
            active_days: Vec::new(),
            phase: 0,
            group: None,
            shards: 1,
        }
    }
}
