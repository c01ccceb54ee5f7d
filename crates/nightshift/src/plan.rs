//! Nightly plan construction
//!
//! The plan is a task tree: an `init` task recording the current pull, one
//! `PAR` per phase (ascending), and an `exit` task summarizing the outcomes.
//! Targets sharing a group run one after another inside their phase.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use nightshift_core::{RemoteTarget, RevisionPair};
use nightshift_git::GitRepo;
use nightshift_remote::RemoteBuildInvoker;
use nightshift_select::{HistorySource, PullRecord, RevisionSelector};
use nightshift_tasks::{Logger, Task};

/// What a target task ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Built,
    Idle,
    Failed,
}

/// Target outcomes of one run, keyed by task name
#[derive(Debug, Default)]
pub struct Outcomes {
    inner: Mutex<BTreeMap<String, Outcome>>,
}

impl Outcomes {
    fn record(&self, name: &str, outcome: Outcome) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.insert(name.to_string(), outcome);
        }
    }

    /// `<n> built, <n> with nothing to build, <n> failed`
    pub fn summary(&self) -> String {
        let inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = |o: Outcome| inner.values().filter(|v| **v == o).count();
        format!(
            "{} built, {} with nothing to build, {} failed",
            count(Outcome::Built),
            count(Outcome::Idle),
            count(Outcome::Failed)
        )
    }
}

/// Everything a plan's tasks need while running
#[derive(Clone)]
pub struct PlanContext {
    pub history: Arc<dyn HistorySource>,
    pub invoker: RemoteBuildInvoker,
    /// Main repository, used for baselines and revision normalization
    pub repository: Option<PathBuf>,
    pub default_days: u32,
    /// Current main/library revisions; the main revision is empty if unknown
    pub current: RevisionPair,
    pub outcomes: Arc<Outcomes>,
}

impl PlanContext {
    /// The pair `target` should build next, against the current revisions
    pub fn select(&self, target: &RemoteTarget) -> anyhow::Result<Option<RevisionPair>> {
        let repo = self.repository.as_deref().map(GitRepo::open).transpose()?;
        let mut selector = RevisionSelector::new(self.history.as_ref(), self.default_days);
        if let Some(repo) = &repo {
            selector = selector.with_graph(repo);
        }
        Ok(selector.pick(
            target,
            &self.current.revision,
            self.current.library_revision.as_deref(),
        )?)
    }

    /// Select the pair `target` should build next and log the choice
    pub fn pick(&self, logger: &Logger, target: &RemoteTarget) -> anyhow::Result<Option<RevisionPair>> {
        let picked = self.select(target)?;
        if let Some(pair) = &picked {
            logger.log(format!("picked {}", pair));
        }
        Ok(picked)
    }

    /// Build the picked pair as `invocation`, recording the target's outcome
    fn build(
        &self,
        logger: &Logger,
        target: &RemoteTarget,
        invocation: &str,
        pick: impl FnOnce() -> anyhow::Result<Option<RevisionPair>>,
    ) -> anyhow::Result<()> {
        let result = pick().and_then(|picked| match picked {
            None => {
                logger.log("nothing to build");
                Ok(Outcome::Idle)
            }
            Some(pair) => {
                self.invoker.invoke(logger, target, invocation, &pair)?;
                Ok(Outcome::Built)
            }
        });
        let outcome = match &result {
            Ok(outcome) => *outcome,
            Err(_) => Outcome::Failed,
        };
        self.outcomes.record(invocation, outcome);
        result.map(|_| ())
    }
}

/// Task tree for the targets active on `date`
pub fn build_plan(targets: &[RemoteTarget], ctx: &PlanContext, date: NaiveDate) -> Task {
    let mut phases: BTreeMap<u32, Vec<(Option<&str>, Vec<&RemoteTarget>)>> = BTreeMap::new();
    for target in targets.iter().filter(|t| t.is_active(date)) {
        let groups = phases.entry(target.phase).or_default();
        let existing = target
            .group
            .as_deref()
            .and_then(|group| groups.iter().position(|(g, _)| *g == Some(group)));
        match existing {
            Some(i) => groups[i].1.push(target),
            None => groups.push((target.group.as_deref(), vec![target])),
        }
    }

    let mut tasks = vec![init_task(ctx)];
    for (phase, groups) in phases {
        let sequences = groups
            .into_iter()
            .map(|(_, members)| {
                Task::seq(members.into_iter().map(|t| target_task(t, ctx)).collect())
            })
            .collect();
        tasks.push(Task::par(sequences).named(format!("phase-{}", phase)));
    }
    tasks.push(exit_task(ctx));

    let plan = Task::seq(tasks);
    info!(leaves = plan.leaf_count(), "plan built");
    plan
}

fn init_task(ctx: &PlanContext) -> Task {
    let ctx = ctx.clone();
    Task::new("init", move |logger| {
        if ctx.current.revision.is_empty() {
            logger.log("current revision unknown, no pull recorded");
            return Ok(());
        }
        logger.log(format!("current {}", ctx.current));
        ctx.history
            .record_pull(PullRecord::new(ctx.current.clone(), Utc::now()))?;
        Ok(())
    })
}

fn exit_task(ctx: &PlanContext) -> Task {
    let outcomes = ctx.outcomes.clone();
    Task::new("exit", move |logger| {
        logger.log(outcomes.summary());
        Ok(())
    })
}

fn target_task(target: &RemoteTarget, ctx: &PlanContext) -> Task {
    let name = target.task_name();

    if target.shards <= 1 {
        let target = target.clone();
        let ctx = ctx.clone();
        let invocation = name.clone();
        return Task::new(name, move |logger| {
            ctx.build(logger, &target, &invocation, || ctx.pick(logger, &target))
        });
    }

    // Shards share one pick, made by whichever shard starts first
    let shared: Arc<OnceLock<Result<Option<RevisionPair>, String>>> = Arc::new(OnceLock::new());
    let shards = (0..target.shards)
        .map(|i| {
            let target = target.clone();
            let ctx = ctx.clone();
            let shared = shared.clone();
            let invocation = format!("{}_{}", name, i);
            Task::new(invocation.clone(), move |logger| {
                ctx.build(logger, &target, &invocation, || {
                    shared
                        .get_or_init(|| ctx.pick(logger, &target).map_err(|e| format!("{:#}", e)))
                        .clone()
                        .map_err(anyhow::Error::msg)
                })
            })
        })
        .collect();
    Task::par(shards).named(name)
}

/// Current revisions of the configured repositories; unreadable ones are
/// reported and treated as unknown
pub fn current_pair(main: &Path, library: Option<&Path>) -> RevisionPair {
    let head = |path: &Path| match GitRepo::open(path).and_then(|repo| repo.current_id()) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(repository = %path.display(), error = %e, "cannot read current revision");
            None
        }
    };
    RevisionPair::new(head(main).unwrap_or_default(), library.and_then(head))
}
