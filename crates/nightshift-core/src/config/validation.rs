//! Configuration validation

use std::collections::HashSet;

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::target::RemoteTarget;

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_run(config)?;
    validate_remote(config)?;
    validate_targets(config)?;
    debug!("configuration validation passed");
    Ok(())
}

/// Validate and compile all targets, in declaration order
pub fn remote_targets(config: &Config) -> Result<Vec<RemoteTarget>> {
    config
        .targets
        .iter()
        .map(|t| RemoteTarget::from_config(t).map_err(Into::into))
        .collect()
}

fn validate_run(config: &Config) -> Result<()> {
    if config.run.poll_interval_ms == 0 {
        return Err(ConfigError::InvalidValue {
            field: "run.poll_interval_ms".to_string(),
            message: "must be positive".to_string(),
        }
        .into());
    }
    Ok(())
}

fn validate_remote(config: &Config) -> Result<()> {
    if config.remote.ssh_command.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "remote.ssh_command".to_string(),
            message: "cannot be empty".to_string(),
        }
        .into());
    }
    if config.remote.build_command.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "remote.build_command".to_string(),
            message: "cannot be empty".to_string(),
        }
        .into());
    }
    Ok(())
}

fn validate_targets(config: &Config) -> Result<()> {
    if !config.targets.is_empty() {
        debug!(count = config.targets.len(), "validating targets");
    }

    let mut names = HashSet::new();
    for target in remote_targets(config)? {
        if !names.insert(target.name.clone()) {
            return Err(ConfigError::InvalidValue {
                field: format!("targets.{}", target.name),
                message: "duplicate target name".to_string(),
            }
            .into());
        }
    }

    Ok(())
}
