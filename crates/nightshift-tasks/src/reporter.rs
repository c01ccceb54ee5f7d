//! Progress echo for log lines

use std::sync::Mutex;

use console::style;

/// Receives every log line after it reached the durable sinks
pub trait ProgressEcho: Send + Sync {
    /// Handle one formatted log line
    fn echo(&self, line: &str);
}

/// Echo to stdout (verbose mode)
#[derive(Debug, Default)]
pub struct ConsoleEcho;

impl ProgressEcho for ConsoleEcho {
    fn echo(&self, line: &str) {
        if line.contains("]: ERROR ") {
            println!("{}", style(line).red());
        } else {
            println!("{}", line);
        }
    }
}

/// Echo to tracing at info level (quiet mode, lands in the diagnostic log)
#[derive(Debug, Default)]
pub struct TracingEcho;

impl ProgressEcho for TracingEcho {
    fn echo(&self, line: &str) {
        tracing::info!(target: "nightshift::progress", "{}", line);
    }
}

/// Collects lines for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingEcho {
    lines: Mutex<Vec<String>>,
}

impl CollectingEcho {
    /// Get all collected lines
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ProgressEcho for CollectingEcho {
    fn echo(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_echo() {
        let echo = CollectingEcho::default();
        echo.echo("[date, host, a]: started");
        echo.echo("[date, host, a]: finished");
        assert_eq!(echo.lines().len(), 2);
    }

    #[test]
    fn test_tracing_echo_without_subscriber() {
        TracingEcho.echo("[date, host, a]: started");
    }
}
