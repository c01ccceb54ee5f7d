//! Default configuration values

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "nightshift.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "nightshift.yaml";

/// Soft lock file name below `<main_dir>/run`
pub const LOCK_FILE: &str = "nightshift.lock";

/// Current-run log file name below `<main_dir>/run`
pub const CURRENT_LOG_FILE: &str = "nightshift.log";

/// Cumulative log file name below `<main_dir>/log`
pub const CUMULATIVE_LOG_FILE: &str = "nightshift.log";

/// History store file name below `<main_dir>`
pub const HISTORY_FILE: &str = "history.json";

/// Default lookback window in days
pub const DEFAULT_HISTORY_DAYS: u32 = 30;

/// Default liveness poll interval for parallel tasks
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_TOML,
        DEFAULT_CONFIG_YAML,
        ".nightshift.toml",
        ".nightshift.yaml",
    ]
}
