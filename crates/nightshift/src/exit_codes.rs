//! Exit codes for the CLI

use nightshift_core::error::{ConfigError, LockError, NightshiftError};

/// Success, including runs where some tasks failed
pub const SUCCESS: u8 = 0;

/// General error
pub const ERROR: u8 = 1;

/// Configuration error
pub const CONFIG_ERROR: u8 = 2;

/// Another run holds the lock
pub const LOCK_CONFLICT: u8 = 6;

/// Exit code for an error returned by a command
pub fn for_error(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<NightshiftError>() {
            match e {
                NightshiftError::Config(_) => return CONFIG_ERROR,
                NightshiftError::Lock(LockError::AlreadyRunning(_)) => return LOCK_CONFLICT,
                _ => {}
            }
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return CONFIG_ERROR;
        }
        if let Some(LockError::AlreadyRunning(_)) = cause.downcast_ref::<LockError>() {
            return LOCK_CONFLICT;
        }
    }
    ERROR
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_config_errors() {
        let err: anyhow::Error =
            NightshiftError::from(ConfigError::UnknownTarget("linux".to_string())).into();
        assert_eq!(for_error(&err), CONFIG_ERROR);

        let wrapped = Err::<(), _>(ConfigError::NotFound("nightshift.toml".into()))
            .context("loading configuration")
            .unwrap_err();
        assert_eq!(for_error(&wrapped), CONFIG_ERROR);
    }

    #[test]
    fn test_lock_conflict() {
        let err: anyhow::Error =
            NightshiftError::from(LockError::AlreadyRunning("x host".to_string())).into();
        assert_eq!(for_error(&err), LOCK_CONFLICT);
    }

    #[test]
    fn test_other_errors() {
        assert_eq!(for_error(&anyhow::anyhow!("boom")), ERROR);
        let io: anyhow::Error =
            NightshiftError::from(std::io::Error::new(std::io::ErrorKind::Other, "io")).into();
        assert_eq!(for_error(&io), ERROR);
    }
}
