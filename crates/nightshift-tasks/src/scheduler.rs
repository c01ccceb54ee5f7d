//! Task scheduler — sequential and parallel composition with failure isolation

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, error, warn};

use nightshift_core::config::DEFAULT_POLL_INTERVAL_MS;

use crate::log_service::LogService;
use crate::logger::Logger;
use crate::task::{Task, TaskKind};

/// Outcome of one task execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task completed successfully
    Success,
    /// Task failed; first line of the error
    Failed(String),
}

impl TaskStatus {
    /// Check if this status represents success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Options for the task scheduler
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// When the run started; names the run's log directory
    pub run_start: DateTime<Local>,
    /// Root of the per-run log directories
    pub log_root: PathBuf,
    /// Names of tasks to skip
    pub exclude: HashSet<String>,
    /// Sleep between liveness checks of parallel tasks
    pub poll_interval: Duration,
}

impl SchedulerOptions {
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            run_start: Local::now(),
            log_root: log_root.into(),
            exclude: HashSet::new(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    /// Log directory shared by every task of this run
    pub fn log_dir(&self) -> PathBuf {
        self.log_root
            .join(self.run_start.format("%Y-%m-%d").to_string())
    }
}

/// Runs task trees, isolating failures at every task boundary
#[derive(Clone)]
pub struct Scheduler {
    log: Arc<LogService>,
    options: Arc<SchedulerOptions>,
    results: Arc<Mutex<Vec<(String, TaskStatus)>>>,
}

/// A forked parallel execution
struct RunningTask {
    name: String,
    finished: Arc<AtomicBool>,
}

impl RunningTask {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Marks a running task finished even if its thread unwinds
struct FinishOnDrop(Arc<AtomicBool>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(log: Arc<LogService>, options: SchedulerOptions) -> Self {
        Self {
            log,
            options: Arc::new(options),
            results: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub fn log_service(&self) -> &Arc<LogService> {
        &self.log
    }

    /// Whether the task is skipped by name; anonymous tasks never are
    pub fn is_excluded(&self, task: &Task) -> bool {
        !task.is_anonymous() && self.options.exclude.contains(task.name())
    }

    /// Run a task starting now
    pub fn run(&self, task: &Task) -> TaskStatus {
        self.run_task(Local::now(), task)
    }

    /// Run one task execution. Failures (errors and panics) of the body are
    /// captured and logged, never propagated.
    pub fn run_task(&self, start: DateTime<Local>, task: &Task) -> TaskStatus {
        let logger = Logger::new(self.log.clone(), task.name(), start, &self.options.log_dir());

        let outcome = match task.kind() {
            TaskKind::Leaf(body) => {
                match panic::catch_unwind(AssertUnwindSafe(|| body(&logger))) {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(format!("{:#}", e)),
                    Err(payload) => Err(panic_message(payload.as_ref())),
                }
            }
            TaskKind::Seq(tasks) => {
                self.run_seq(tasks);
                Ok(())
            }
            TaskKind::Par(tasks) => {
                self.run_par(tasks);
                Ok(())
            }
        };

        logger.log_end(Local::now(), outcome.as_ref().err().map(String::as_str));

        let status = match outcome {
            Ok(()) => TaskStatus::Success,
            Err(message) => {
                let first = message.lines().next().unwrap_or("").to_string();
                error!(task = task.name(), error = %first, "task failed");
                TaskStatus::Failed(first)
            }
        };
        if let TaskKind::Leaf(_) = task.kind() {
            if let Ok(mut results) = self.results.lock() {
                results.push((task.name().to_string(), status.clone()));
            }
        }
        status
    }

    /// Outcomes of all leaf executions so far, in completion order
    pub fn results(&self) -> Vec<(String, TaskStatus)> {
        self.results.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn run_seq(&self, tasks: &[Task]) {
        for task in tasks {
            if self.is_excluded(task) {
                debug!(task = task.name(), "excluded");
                continue;
            }
            self.run_task(Local::now(), task);
        }
    }

    fn run_par(&self, tasks: &[Task]) {
        let start = Local::now();

        std::thread::scope(|scope| {
            let mut running = Vec::new();

            for task in tasks {
                if self.is_excluded(task) {
                    debug!(task = task.name(), "excluded");
                    continue;
                }

                let finished = Arc::new(AtomicBool::new(false));
                let guard = FinishOnDrop(finished.clone());
                let spawned = std::thread::Builder::new()
                    .name(thread_name(task))
                    .spawn_scoped(scope, move || {
                        let _guard = guard;
                        self.run_task(start, task);
                    });

                if let Err(e) = spawned {
                    // The closure (and its guard) is dropped, so the flag is set
                    warn!(task = task.name(), error = %e, "failed to fork task, running inline");
                    self.run_task(start, task);
                }
                running.push(RunningTask {
                    name: task.name().to_string(),
                    finished,
                });
            }

            self.join(running);
        });
    }

    /// Poll until every running task has finished
    fn join(&self, mut running: Vec<RunningTask>) {
        loop {
            let (finished, pending): (Vec<_>, Vec<_>) =
                running.into_iter().partition(RunningTask::is_finished);

            if pending.is_empty() {
                return;
            }
            if finished.is_empty() {
                std::thread::sleep(self.options.poll_interval);
            } else {
                for task in &finished {
                    debug!(task = %task.name, pending = pending.len(), "parallel task finished");
                }
            }
            running = pending;
        }
    }
}

fn thread_name(task: &Task) -> String {
    if task.is_anonymous() {
        "task".to_string()
    } else {
        format!("task-{}", task.name())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingEcho;
    use std::time::Instant;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        echo: Arc<CollectingEcho>,
        scheduler: Scheduler,
    }

    fn fixture(exclude: &[&str]) -> Fixture {
        let temp = TempDir::new().unwrap();
        let echo = Arc::new(CollectingEcho::default());
        let log = Arc::new(
            LogService::with_hostname(
                &temp.path().join("current.log"),
                &temp.path().join("cumulative.log"),
                echo.clone(),
                "testhost",
            )
            .unwrap(),
        );
        let mut options = SchedulerOptions::new(temp.path().join("log"));
        options.exclude = exclude.iter().map(|s| s.to_string()).collect();
        options.poll_interval = Duration::from_millis(10);
        Fixture {
            _temp: temp,
            echo,
            scheduler: Scheduler::new(log, options),
        }
    }

    impl Fixture {
        /// Stop the log service and return the messages as `task: message`
        fn messages(&self) -> Vec<String> {
            self.scheduler.log_service().shutdown();
            self.echo
                .lines()
                .iter()
                .map(|line| {
                    let (head, message) = line.split_once("]: ").unwrap();
                    let task = head.rsplit(", ").next().unwrap();
                    format!("{}: {}", task, message)
                })
                .collect()
        }
    }

    fn recording(name: &str, trace: &Arc<Mutex<Vec<String>>>) -> Task {
        let trace = trace.clone();
        let label = name.to_string();
        Task::new(name, move |_| {
            trace.lock().unwrap().push(label.clone());
            Ok(())
        })
    }

    #[test]
    fn test_task_status_is_success() {
        assert!(TaskStatus::Success.is_success());
        assert!(!TaskStatus::Failed("error".to_string()).is_success());
    }

    #[test]
    fn test_seq_with_exclusion() {
        let fx = fixture(&["B"]);
        let trace = Arc::new(Mutex::new(Vec::new()));
        let plan = Task::seq(vec![
            recording("A", &trace),
            recording("B", &trace),
            recording("C", &trace),
        ]);

        assert_eq!(fx.scheduler.run(&plan), TaskStatus::Success);
        assert_eq!(*trace.lock().unwrap(), vec!["A", "C"]);
        assert_eq!(
            fx.messages(),
            vec!["A: started", "A: finished", "C: started", "C: finished"]
        );
    }

    #[test]
    fn test_anonymous_tasks_are_never_excluded() {
        let fx = fixture(&[""]);
        let trace = Arc::new(Mutex::new(Vec::new()));
        let plan = Task::seq(vec![Task::seq(vec![recording("A", &trace)])]);
        fx.scheduler.run(&plan);
        assert_eq!(*trace.lock().unwrap(), vec!["A"]);
    }

    #[test]
    fn test_failure_is_isolated() {
        let fx = fixture(&[]);
        let trace = Arc::new(Mutex::new(Vec::new()));
        let plan = Task::seq(vec![
            Task::new("broken", |_| anyhow::bail!("host unreachable\nsecond line")),
            Task::new("panics", |_| panic!("bad state")),
            recording("after", &trace),
        ]);

        assert_eq!(fx.scheduler.run(&plan), TaskStatus::Success);
        assert_eq!(*trace.lock().unwrap(), vec!["after"]);

        let results = fx.scheduler.results();
        assert_eq!(
            results[0],
            ("broken".to_string(), TaskStatus::Failed("host unreachable".to_string()))
        );
        assert_eq!(
            results[1],
            ("panics".to_string(), TaskStatus::Failed("panic: bad state".to_string()))
        );

        let messages = fx.messages();
        assert!(messages.contains(&"broken: ERROR host unreachable".to_string()));
        assert!(messages.contains(&"panics: ERROR panic: bad state".to_string()));
        assert!(messages.contains(&"after: finished".to_string()));
    }

    #[test]
    fn test_par_waits_for_all() {
        let fx = fixture(&[]);
        let done = Arc::new(Mutex::new(Vec::new()));
        let delayed = |name: &str, ms: u64| {
            let done = done.clone();
            let label = name.to_string();
            Task::new(name, move |_| {
                std::thread::sleep(Duration::from_millis(ms));
                done.lock().unwrap().push(label.clone());
                Ok(())
            })
        };
        let plan = Task::par(vec![delayed("A", 150), delayed("B", 50), delayed("C", 100)]);

        let begin = Instant::now();
        fx.scheduler.run(&plan);
        assert!(begin.elapsed() >= Duration::from_millis(150));

        let mut finished = done.lock().unwrap().clone();
        finished.sort();
        assert_eq!(finished, vec!["A", "B", "C"]);

        let messages = fx.messages();
        for name in ["A", "B", "C"] {
            assert!(messages.contains(&format!("{}: finished", name)));
        }
    }

    #[test]
    fn test_par_excludes_and_shares_start() {
        let fx = fixture(&["B"]);
        let starts = Arc::new(Mutex::new(Vec::new()));
        let probe = |name: &str| {
            let starts = starts.clone();
            Task::new(name, move |logger| {
                starts.lock().unwrap().push(logger.start());
                Ok(())
            })
        };
        fx.scheduler.run(&Task::par(vec![probe("A"), probe("B"), probe("C")]));

        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 2);
        assert_eq!(starts[0], starts[1]);
    }

    #[test]
    fn test_nested_plan_order() {
        let fx = fixture(&[]);
        let trace = Arc::new(Mutex::new(Vec::new()));
        let plan = Task::seq(vec![
            recording("init", &trace),
            Task::par(vec![
                Task::seq(vec![recording("a1", &trace), recording("a2", &trace)]),
                recording("b", &trace),
            ]),
            recording("exit", &trace),
        ]);
        fx.scheduler.run(&plan);

        let trace = trace.lock().unwrap().clone();
        assert_eq!(trace.first().unwrap(), "init");
        assert_eq!(trace.last().unwrap(), "exit");
        let a1 = trace.iter().position(|t| t == "a1").unwrap();
        let a2 = trace.iter().position(|t| t == "a2").unwrap();
        assert!(a1 < a2);
        assert_eq!(trace.len(), 5);
    }

    #[test]
    fn test_log_dir_named_by_run_date() {
        let fx = fixture(&[]);
        let dir = fx.scheduler.options().log_dir();
        let expected = fx.scheduler.options().run_start.format("%Y-%m-%d").to_string();
        assert!(dir.ends_with(expected));

        let seen = Arc::new(Mutex::new(None));
        let probe = seen.clone();
        fx.scheduler.run(&Task::new("probe", move |logger| {
            *probe.lock().unwrap() = Some(logger.log_dir().to_path_buf());
            Ok(())
        }));
        assert_eq!(seen.lock().unwrap().clone(), Some(dir.clone()));
        assert!(dir.is_dir());
    }
}
