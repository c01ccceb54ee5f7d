//! Pick command

use std::sync::Arc;

use chrono::Local;
use clap::Args;
use tracing::info;

use nightshift_core::config::remote_targets;
use nightshift_core::error::ConfigError;
use nightshift_git::GitRepo;
use nightshift_remote::SshExecutor;

use crate::cli::{output, Cli};
use crate::driver;

/// Show the revision a target would build next
#[derive(Debug, Args)]
pub struct PickCommand {
    /// Target name
    pub target: String,
}

impl PickCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(target_name = %self.target, "executing pick command");
        let config = cli.load_config()?;
        let target = remote_targets(&config)?
            .into_iter()
            .find(|t| t.name == self.target)
            .ok_or_else(|| ConfigError::UnknownTarget(self.target.clone()))?;

        let ctx = driver::plan_context(&config, Arc::new(SshExecutor::new(config.remote.clone())));

        if !target.is_active(Local::now().date_naive()) {
            output::warning(&format!("{} is not active today", target.name));
        }

        let Some(pair) = ctx.select(&target)? else {
            output::info("nothing to build");
            return Ok(());
        };

        println!(
            "{}",
            output::key_value(
                "Revision",
                &output::revision_style().apply_to(&pair.revision).to_string()
            )
        );
        if let Some(lib) = &pair.library_revision {
            println!("{}", output::key_value("Library", lib));
        }
        let repo = ctx.repository.as_deref().and_then(|path| GitRepo::open(path).ok());
        if let Some(info) = repo.as_ref().and_then(|r| r.commit_info(&pair.revision).ok()) {
            println!(
                "{}",
                output::key_value("Commit", &format!("{} {}", info.short_hash, info.summary))
            );
            println!("{}", output::key_value("Author", &info.author));
        }
        Ok(())
    }
}
