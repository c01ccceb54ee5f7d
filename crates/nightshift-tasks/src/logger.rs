//! Per-execution task logger

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Local};
use tracing::warn;

use crate::log_service::LogService;

/// Tasks finishing faster than this do not report their elapsed time
const ELAPSED_THRESHOLD_MS: i64 = 3000;

/// Logging handle for one task execution
pub struct Logger {
    log: Arc<LogService>,
    name: String,
    start: DateTime<Local>,
    log_dir: PathBuf,
}

impl Logger {
    /// Create the logger, its log directory, and log `started`
    pub fn new(
        log: Arc<LogService>,
        name: impl Into<String>,
        start: DateTime<Local>,
        log_dir: &Path,
    ) -> Self {
        let name = name.into();
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            warn!(task = %name, dir = %log_dir.display(), error = %e, "failed to create log directory");
        }
        let logger = Self {
            log,
            name,
            start,
            log_dir: log_dir.to_path_buf(),
        };
        logger.log.log(start, &logger.name, "started");
        logger
    }

    /// Task name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the execution started
    pub fn start(&self) -> DateTime<Local> {
        self.start
    }

    /// Directory receiving this run's build artifacts
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Log a message for this task
    pub fn log(&self, message: impl AsRef<str>) {
        self.log.log(Local::now(), &self.name, message.as_ref());
    }

    /// Log the completion line
    pub fn log_end(&self, end: DateTime<Local>, error: Option<&str>) {
        let message = end_message(self.start, end, error);
        self.log.log(end, &self.name, &message);
    }
}

/// `finished` or `ERROR <first line>`, plus the elapsed time for slow tasks
pub fn end_message(start: DateTime<Local>, end: DateTime<Local>, error: Option<&str>) -> String {
    let status = match error {
        None => "finished".to_string(),
        Some(err) => format!("ERROR {}", err.lines().next().unwrap_or("")),
    };
    let elapsed = end - start;
    if elapsed.num_milliseconds() >= ELAPSED_THRESHOLD_MS {
        format!("{} ({} elapsed time)", status, format_hms(elapsed))
    } else {
        status
    }
}

/// Render a duration as `H:MM:SS`
pub fn format_hms(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
