//! Remote build targets

use chrono::{Datelike, NaiveDate, Weekday};
use regex::Regex;

use crate::config::TargetConfig;
use crate::error::ConfigError;

/// A validated remote build target, immutable after startup
#[derive(Debug, Clone)]
pub struct RemoteTarget {
    pub name: String,
    pub host: String,
    pub user: Option<String>,
    pub port: u16,
    pub extra_hosts: Vec<String>,
    pub historic: bool,
    pub history: u32,
    pub baseline: Option<String>,
    pub options: String,
    pub args: String,
    pub phase: u32,
    pub group: Option<String>,
    pub shards: u32,
    detect: Regex,
    active_days: Vec<Weekday>,
}

impl RemoteTarget {
    /// Validate a target configuration
    pub fn from_config(config: &TargetConfig) -> Result<Self, ConfigError> {
        let field = |name: &str| format!("targets.{}.{}", config.name, name);

        if config.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "targets.name".to_string(),
                message: "target name cannot be empty".to_string(),
            });
        }
        if config.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field("host"),
                message: "host cannot be empty".to_string(),
            });
        }
        if config.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: field("port"),
                message: "port cannot be 0".to_string(),
            });
        }
        if config.shards == 0 {
            return Err(ConfigError::InvalidValue {
                field: field("shards"),
                message: "must be at least 1".to_string(),
            });
        }

        let pattern = config
            .detect
            .clone()
            .unwrap_or_else(|| format!("^{}$", regex::escape(&config.name)));
        let detect = Regex::new(&pattern).map_err(|e| ConfigError::InvalidValue {
            field: field("detect"),
            message: e.to_string(),
        })?;

        let active_days = config
            .active_days
            .iter()
            .map(|day| {
                day.parse::<Weekday>().map_err(|_| ConfigError::InvalidValue {
                    field: field("active_days"),
                    message: format!("unknown weekday '{}'", day),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: config.name.clone(),
            host: config.host.clone(),
            user: config.user.clone(),
            port: config.port,
            extra_hosts: config.extra_hosts.clone(),
            historic: config.historic,
            history: config.history,
            baseline: config.baseline.clone(),
            options: config.options.clone(),
            args: config.args.clone(),
            phase: config.phase,
            group: config.group.clone(),
            shards: config.shards,
            detect,
            active_days,
        })
    }

    /// Name of the task building this target
    pub fn task_name(&self) -> String {
        format!("build-{}", self.name)
    }

    /// Whether a recorded build (by target identifier) belongs to this target
    pub fn detects(&self, build_target: &str) -> bool {
        self.detect.is_match(build_target)
    }

    /// Whether the target takes part in a run on the given date
    pub fn is_active(&self, date: NaiveDate) -> bool {
        self.active_days.is_empty() || self.active_days.contains(&date.weekday())
    }

    /// ssh destination (`user@host` or `host`)
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    /// Lookback window for the first selection attempt
    pub fn history_days(&self, default_days: u32) -> u32 {
        default_days.max(self.history)
    }
}
