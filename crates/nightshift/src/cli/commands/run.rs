//! Run command

use std::sync::Arc;

use anyhow::bail;
use clap::Args;
use tracing::info;

use nightshift_remote::SshExecutor;
use nightshift_tasks::{ConsoleEcho, ProgressEcho, TracingEcho};

use crate::cli::{output, Cli};
use crate::driver::{self, RunOptions};

/// Run the nightly plan
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Required to actually run; `nightshift plan` shows what would run
    #[arg(long)]
    pub force: bool,

    /// Skip a task by name (can be repeated)
    #[arg(long, value_name = "TASK")]
    pub exclude: Vec<String>,
}

impl RunCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(force = self.force, exclude = ?self.exclude, "executing run command");
        if !self.force {
            bail!("Need to apply force to do anything (see `nightshift plan`)");
        }

        let config = cli.load_config()?;
        let executor = Arc::new(SshExecutor::new(config.remote.clone()));

        let echo: Arc<dyn ProgressEcho> = if cli.verbose {
            Arc::new(ConsoleEcho)
        } else {
            Arc::new(TracingEcho)
        };
        let options = RunOptions {
            exclude: self.exclude.clone(),
        };
        let report = driver::run(&config, &options, executor, echo)?;

        println!();
        for (name, status) in &report.results {
            println!("{}", output::task_line(name, status));
        }
        println!();

        if report.failed() == 0 {
            output::success(&report.summary);
        } else {
            output::warning(&report.summary);
        }
        println!(
            "{}",
            output::key_value("Run log", &config.run.current_log().display().to_string())
        );
        Ok(())
    }
}
