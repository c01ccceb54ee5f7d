//! Plan command

use std::sync::Arc;

use clap::Args;
use tracing::info;

use nightshift_remote::SshExecutor;

use crate::cli::{output, Cli};
use crate::driver;

/// Print the task tree of tonight's plan
#[derive(Debug, Args)]
pub struct PlanCommand {}

impl PlanCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!("executing plan command");
        let config = cli.load_config()?;
        let (plan, ctx) = driver::plan(&config, Arc::new(SshExecutor::new(config.remote.clone())))?;

        let current = if ctx.current.revision.is_empty() {
            "unknown".to_string()
        } else {
            ctx.current.to_string()
        };
        println!("{}", output::key_value("Current", &current));
        println!("{}", output::key_value("Builds", &plan.leaf_count().saturating_sub(2).to_string()));
        println!();
        println!("{}", output::header("Tonight's plan"));
        print!("{}", plan.outline());
        Ok(())
    }
}
