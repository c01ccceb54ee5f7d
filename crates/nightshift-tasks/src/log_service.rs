//! Single-writer log service
//!
//! Any number of producers enqueue formatted lines; one background thread
//! writes each line to the current-run log and the cumulative log, then echoes
//! it. Lines reach the sinks in enqueue order.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use chrono::{DateTime, Local};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

use nightshift_core::error::Result;
use nightshift_core::{local_hostname, print_date};

use crate::reporter::ProgressEcho;

/// Serializes log lines from concurrent tasks into the run logs
pub struct LogService {
    hostname: String,
    sender: Mutex<Option<UnboundedSender<String>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl LogService {
    /// Truncate the current-run log, open the cumulative log for appending and
    /// start the consumer thread
    pub fn new(current: &Path, cumulative: &Path, echo: Arc<dyn ProgressEcho>) -> Result<Self> {
        Self::with_hostname(current, cumulative, echo, local_hostname())
    }

    /// Like [`LogService::new`] with an explicit host name for the log lines
    pub fn with_hostname(
        current: &Path,
        cumulative: &Path,
        echo: Arc<dyn ProgressEcho>,
        hostname: impl Into<String>,
    ) -> Result<Self> {
        for path in [current, cumulative] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let current_file = File::create(current)?;
        let cumulative_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(cumulative)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let consumer = std::thread::Builder::new()
            .name("log-service".to_string())
            .spawn(move || consume(receiver, current_file, cumulative_file, echo))?;

        info!(current = %current.display(), cumulative = %cumulative.display(), "log service started");
        Ok(Self {
            hostname: hostname.into(),
            sender: Mutex::new(Some(sender)),
            consumer: Mutex::new(Some(consumer)),
        })
    }

    /// Host name shown in every line
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Enqueue a line for `task_name`; anonymous tasks are not logged
    pub fn log(&self, date: DateTime<Local>, task_name: &str, message: &str) {
        if task_name.is_empty() {
            return;
        }
        let line = format_line(&date, &self.hostname, task_name, message);

        let sender = match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match sender {
            Some(sender) => {
                if sender.send(line).is_err() {
                    debug!(task = task_name, "log consumer gone, dropping line");
                }
            }
            None => debug!(task = task_name, "log service shut down, dropping line"),
        }
    }

    /// Drain all queued lines and stop the consumer. Later calls are no-ops.
    pub fn shutdown(&self) {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);

        let consumer = match self.consumer.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(consumer) = consumer {
            if consumer.join().is_err() {
                error!("log consumer panicked");
            }
            info!("log service stopped");
        }
    }
}

impl Drop for LogService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// `[<date>, <hostname>, <task_name>]: <message>`
pub fn format_line(date: &DateTime<Local>, hostname: &str, task_name: &str, message: &str) -> String {
    format!("[{}, {}, {}]: {}", print_date(date), hostname, task_name, message)
}

fn consume(
    mut receiver: UnboundedReceiver<String>,
    mut current: File,
    mut cumulative: File,
    echo: Arc<dyn ProgressEcho>,
) {
    // Returns None once every sender is gone and the queue is drained
    while let Some(line) = receiver.blocking_recv() {
        let record = format!("{}\n", line);
        for (sink, file) in [("current", &mut current), ("cumulative", &mut cumulative)] {
            if let Err(e) = file.write_all(record.as_bytes()).and_then(|_| file.flush()) {
                error!(sink, error = %e, "failed to write log line");
            }
        }
        echo.echo(&line);
    }
}
