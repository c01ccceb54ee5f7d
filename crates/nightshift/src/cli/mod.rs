//! CLI definition and command handling

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use nightshift_core::config::{load_config_at, Config};

use commands::{PickCommand, PlanCommand, RunCommand, UnlockCommand};

/// Nightshift - Nightly remote build orchestrator
#[derive(Debug, Parser)]
#[command(name = "nightshift")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Echo run log lines to the terminal
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (searched upward from the working directory if omitted)
    #[arg(short, long, global = true, env = "NIGHTSHIFT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the nightly plan
    Run(RunCommand),

    /// Print the task tree of tonight's plan
    Plan(PlanCommand),

    /// Show the revision a target would build next
    Pick(PickCommand),

    /// Remove a stale run lock
    Unlock(UnlockCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Run(ref cmd) => cmd.execute(&self),
            Commands::Plan(ref cmd) => cmd.execute(&self),
            Commands::Pick(ref cmd) => cmd.execute(&self),
            Commands::Unlock(ref cmd) => cmd.execute(&self),
        }
    }

    /// Load and validate the configuration
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let cwd = std::env::current_dir()?;
        let (config, path) = load_config_at(self.config.as_deref(), &cwd)?;
        debug!(path = %path.display(), "using configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "nightshift", "run", "--force", "--exclude", "build-mac", "--exclude", "init", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run(cmd) => {
                assert!(cmd.force);
                assert_eq!(cmd.exclude, vec!["build-mac", "init"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_run_without_force_fails() {
        // The configuration is never read, so a missing file is no config error
        let temp = tempfile::TempDir::new().unwrap();
        let cli = Cli::try_parse_from([
            "nightshift",
            "-c",
            temp.path().join("missing.toml").to_str().unwrap(),
            "run",
        ])
        .unwrap();

        let err = cli.execute().unwrap_err();

        assert!(err.to_string().contains("force"));
        assert_eq!(crate::exit_codes::for_error(&err), crate::exit_codes::ERROR);
    }

    #[test]
    fn test_pick_requires_target() {
        assert!(Cli::try_parse_from(["nightshift", "pick"]).is_err());
        let cli = Cli::try_parse_from(["nightshift", "-c", "ns.toml", "pick", "linux"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("ns.toml")));
    }
}
