//! Task types and definitions

use std::fmt;
use std::sync::Arc;

use crate::logger::Logger;

/// Body of a leaf task
pub type TaskBody = Arc<dyn Fn(&Logger) -> anyhow::Result<()> + Send + Sync>;

/// What a task does when it runs
#[derive(Clone)]
pub enum TaskKind {
    /// A concrete procedure
    Leaf(TaskBody),
    /// Children in order
    Seq(Vec<Task>),
    /// Children concurrently
    Par(Vec<Task>),
}

/// An immutable named task. The empty name marks an anonymous task, which is
/// never excluded and never logged.
#[derive(Clone)]
pub struct Task {
    name: String,
    kind: TaskKind,
}

impl Task {
    /// Create a leaf task
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Logger) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: TaskKind::Leaf(Arc::new(body)),
        }
    }

    /// Anonymous task running `tasks` one after another
    pub fn seq(tasks: Vec<Task>) -> Self {
        Self {
            name: String::new(),
            kind: TaskKind::Seq(tasks),
        }
    }

    /// Anonymous task running `tasks` concurrently
    pub fn par(tasks: Vec<Task>) -> Self {
        Self {
            name: String::new(),
            kind: TaskKind::Par(tasks),
        }
    }

    /// Give the task a name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// Number of leaf tasks in this tree
    pub fn leaf_count(&self) -> usize {
        match &self.kind {
            TaskKind::Leaf(_) => 1,
            TaskKind::Seq(tasks) | TaskKind::Par(tasks) => tasks.iter().map(Task::leaf_count).sum(),
        }
    }

    /// Indented outline of the task tree
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(0, &mut out);
        out
    }

    fn write_outline(&self, depth: usize, out: &mut String) {
        let label = match &self.kind {
            TaskKind::Leaf(_) => self.name.clone(),
            TaskKind::Seq(_) if self.is_anonymous() => "SEQ".to_string(),
            TaskKind::Par(_) if self.is_anonymous() => "PAR".to_string(),
            TaskKind::Seq(_) => format!("SEQ {}", self.name),
            TaskKind::Par(_) => format!("PAR {}", self.name),
        };
        out.push_str(&"  ".repeat(depth));
        out.push_str(&label);
        out.push('\n');
        if let TaskKind::Seq(tasks) | TaskKind::Par(tasks) = &self.kind {
            for task in tasks {
                task.write_outline(depth + 1, out);
            }
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            TaskKind::Leaf(_) => "leaf",
            TaskKind::Seq(_) => "seq",
            TaskKind::Par(_) => "par",
        };
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}
