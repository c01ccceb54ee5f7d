//! Unlock command

use clap::Args;
use tracing::info;

use nightshift_core::SoftLock;

use crate::cli::{output, Cli};

/// Remove a stale run lock
#[derive(Debug, Args)]
pub struct UnlockCommand {}

impl UnlockCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!("executing unlock command");
        let config = cli.load_config()?;
        let path = config.run.lock_file();

        match SoftLock::holder(&path)? {
            Some(holder) => {
                SoftLock::force_remove(&path)?;
                output::success(&format!("Removed lock held since {}", holder));
            }
            None => {
                if SoftLock::force_remove(&path)? {
                    output::success("Removed empty lock file");
                } else {
                    output::info("No run lock present");
                }
            }
        }
        Ok(())
    }
}
