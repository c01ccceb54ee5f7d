//! Nightshift Core - Core library for the nightly build orchestrator
//!
//! This crate provides the foundational types, error handling, configuration,
//! build targets and the soft run lock shared by the other nightshift crates.

pub mod config;
pub mod error;
pub mod lock;
pub mod target;
pub mod types;

pub use error::{NightshiftError, Result};
pub use lock::SoftLock;
pub use target::RemoteTarget;
pub use types::{
    local_hostname, print_date, BuildArtifact, BuildHistoryItem, RevisionGraph, RevisionPair,
};
