//! Nightshift Tasks - Task scheduling and run logging
//!
//! This crate provides the `SEQ`/`PAR` task combinators, the failure-isolating
//! task runner, and the single-writer log service every task execution writes
//! through.

pub mod log_service;
pub mod logger;
pub mod reporter;
pub mod scheduler;
pub mod task;

pub use log_service::LogService;
pub use logger::Logger;
pub use reporter::{CollectingEcho, ConsoleEcho, ProgressEcho, TracingEcho};
pub use scheduler::{Scheduler, SchedulerOptions, TaskStatus};
pub use task::{Task, TaskKind};
