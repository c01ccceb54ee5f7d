//! Nightly run driver

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use tracing::{info, instrument};

use nightshift_core::config::{remote_targets, Config};
use nightshift_core::{RemoteTarget, SoftLock};
use nightshift_remote::{RemoteBuildInvoker, RemoteExecutor};
use nightshift_select::JsonHistoryStore;
use nightshift_tasks::{LogService, ProgressEcho, Scheduler, SchedulerOptions, Task, TaskStatus};

use crate::plan::{build_plan, current_pair, Outcomes, PlanContext};

/// Options of a single run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Task names to skip
    pub exclude: Vec<String>,
}

/// What a finished run reports
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Leaf task outcomes in completion order
    pub results: Vec<(String, TaskStatus)>,
    /// Outcome counts of the target tasks
    pub summary: String,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|(_, s)| !s.is_success()).count()
    }
}

/// Context shared by every task of a plan
pub fn plan_context(config: &Config, executor: Arc<dyn RemoteExecutor>) -> PlanContext {
    let history = Arc::new(JsonHistoryStore::new(config.history.path(&config.run)));
    let main = &config.repository.main;
    let current = current_pair(main, config.repository.library.as_deref());

    PlanContext {
        history: history.clone(),
        invoker: RemoteBuildInvoker::new(executor, history),
        repository: (!current.revision.is_empty()).then(|| main.clone()),
        default_days: config.history.default_days,
        current,
        outcomes: Arc::new(Outcomes::default()),
    }
}

/// Plan for a run starting now
pub fn plan(config: &Config, executor: Arc<dyn RemoteExecutor>) -> anyhow::Result<(Task, PlanContext)> {
    let targets = remote_targets(config)?;
    let ctx = plan_context(config, executor);
    let plan = build_plan(&targets, &ctx, Local::now().date_naive());
    Ok((plan, ctx))
}

/// Acquire the lock, run the plan through the scheduler and release the lock.
///
/// A held lock fails the run before any task runs. Per-task failures are
/// part of the report, not errors.
#[instrument(skip_all)]
pub fn run(
    config: &Config,
    options: &RunOptions,
    executor: Arc<dyn RemoteExecutor>,
    echo: Arc<dyn ProgressEcho>,
) -> anyhow::Result<RunReport> {
    let targets = remote_targets(config)?;

    let lock = SoftLock::acquire(&config.run.lock_file())?;
    let outcome = execute(config, options, &targets, executor, echo);
    lock.release()?;

    let report = outcome?;
    info!(tasks = report.results.len(), failed = report.failed(), "run finished");
    Ok(report)
}

fn execute(
    config: &Config,
    options: &RunOptions,
    targets: &[RemoteTarget],
    executor: Arc<dyn RemoteExecutor>,
    echo: Arc<dyn ProgressEcho>,
) -> anyhow::Result<RunReport> {
    let current_log = config.run.current_log();
    let log = Arc::new(
        LogService::new(&current_log, &config.run.cumulative_log(), echo)
            .with_context(|| format!("Failed to open run logs at {}", current_log.display()))?,
    );

    let mut scheduler_options = SchedulerOptions::new(config.run.log_root());
    scheduler_options.exclude = options.exclude.iter().cloned().collect::<HashSet<_>>();
    scheduler_options.poll_interval = Duration::from_millis(config.run.poll_interval_ms);
    let run_date = scheduler_options.run_start.date_naive();

    let ctx = plan_context(config, executor);
    let plan = build_plan(targets, &ctx, run_date);
    let scheduler = Scheduler::new(log.clone(), scheduler_options);
    scheduler.run(&plan);
    log.shutdown();

    Ok(RunReport {
        results: scheduler.results(),
        summary: ctx.outcomes.summary(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightshift_core::config::TargetConfig;
    use nightshift_core::error::{LockError, RemoteError};
    use nightshift_core::BuildArtifact;
    use nightshift_remote::{BuildRequest, RemoteSession};
    use nightshift_tasks::CollectingEcho;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingExecutor {
        sessions: AtomicUsize,
    }

    struct EmptySession;

    impl RemoteExecutor for CountingExecutor {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn open_session(&self, target: &RemoteTarget) -> Result<Box<dyn RemoteSession>, RemoteError> {
            self.sessions.fetch_add(1, Ordering::SeqCst);
            if target.host.starts_with("down.") {
                return Err(RemoteError::ConnectFailed {
                    host: target.host.clone(),
                    reason: "Connection refused".to_string(),
                });
            }
            Ok(Box::new(EmptySession))
        }
    }

    impl RemoteSession for EmptySession {
        fn host(&self) -> &str {
            "empty"
        }

        fn run_remote_build(
            &mut self,
            _target: &RemoteTarget,
            _request: &BuildRequest,
        ) -> Result<Vec<BuildArtifact>, RemoteError> {
            Ok(Vec::new())
        }

        fn close(&mut self) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    fn config(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.run.main_dir = Some(temp.path().join("state"));
        config.run.poll_interval_ms = 10;
        config.repository.main = temp.path().to_path_buf();
        config.targets = vec![
            TargetConfig {
                name: "linux".to_string(),
                host: "linux.example.org".to_string(),
                ..Default::default()
            },
            TargetConfig {
                name: "mac".to_string(),
                host: "mac.example.org".to_string(),
                ..Default::default()
            },
        ];
        config
    }

    fn seed_history(config: &Config) {
        use nightshift_core::RevisionPair;
        use nightshift_select::{HistorySource, PullRecord};

        let store = JsonHistoryStore::new(config.history.path(&config.run));
        store
            .record_pull(PullRecord::new(
                RevisionPair::new("abc123", None),
                chrono::Utc::now() - chrono::Duration::hours(1),
            ))
            .unwrap();
    }

    #[test]
    fn test_run_builds_and_releases_lock() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        seed_history(&config);
        let executor = Arc::new(CountingExecutor::default());
        let echo = Arc::new(CollectingEcho::default());

        let report = run(&config, &RunOptions::default(), executor.clone(), echo.clone()).unwrap();

        assert_eq!(executor.sessions.load(Ordering::SeqCst), 2);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.summary, "2 built, 0 with nothing to build, 0 failed");
        assert!(!config.run.lock_file().exists());

        let current = std::fs::read_to_string(config.run.current_log()).unwrap();
        assert!(current.contains(", build-linux]: started"));
        assert_eq!(current.lines().count(), echo.lines().len());
    }

    #[test]
    fn test_failed_task_still_releases_lock() {
        let temp = TempDir::new().unwrap();
        let mut config = config(&temp);
        config.targets[1].host = "down.example.org".to_string();
        seed_history(&config);

        let report = run(
            &config,
            &RunOptions::default(),
            Arc::new(CountingExecutor::default()),
            Arc::new(CollectingEcho::default()),
        )
        .unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.summary, "1 built, 0 with nothing to build, 1 failed");
        assert!(!config.run.lock_file().exists());

        let cumulative = std::fs::read_to_string(config.run.cumulative_log()).unwrap();
        assert!(cumulative
            .lines()
            .any(|l| l.contains(", build-mac]: ERROR ") && l.contains("Connection refused")));
    }

    #[test]
    fn test_lock_conflict_runs_nothing() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        let held = SoftLock::acquire(&config.run.lock_file()).unwrap();
        let executor = Arc::new(CountingExecutor::default());
        let echo = Arc::new(CollectingEcho::default());

        let err = run(&config, &RunOptions::default(), executor.clone(), echo.clone()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<LockError>(),
            Some(LockError::AlreadyRunning(_))
        ));
        assert_eq!(executor.sessions.load(Ordering::SeqCst), 0);
        assert!(echo.lines().is_empty());
        assert!(!config.run.current_log().exists());

        // The holder's lock is untouched
        assert!(config.run.lock_file().exists());
        held.release().unwrap();
    }

    #[test]
    fn test_lock_released_when_logs_cannot_open() {
        let temp = TempDir::new().unwrap();
        let mut config = config(&temp);
        let blocked = temp.path().join("blocked");
        std::fs::create_dir_all(&blocked).unwrap();
        config.run.current_log = Some(blocked);

        let result = run(
            &config,
            &RunOptions::default(),
            Arc::new(CountingExecutor::default()),
            Arc::new(CollectingEcho::default()),
        );

        assert!(result.is_err());
        assert!(!config.run.lock_file().exists());
    }

    #[test]
    fn test_excluded_target_is_skipped() {
        let temp = TempDir::new().unwrap();
        let config = config(&temp);
        seed_history(&config);
        let executor = Arc::new(CountingExecutor::default());
        let options = RunOptions {
            exclude: vec!["build-mac".to_string()],
        };

        let report = run(&config, &options, executor.clone(), Arc::new(CollectingEcho::default())).unwrap();

        assert_eq!(executor.sessions.load(Ordering::SeqCst), 1);
        assert!(report.results.iter().all(|(name, _)| name != "build-mac"));
    }
}
