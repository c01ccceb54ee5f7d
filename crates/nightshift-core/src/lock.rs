//! Soft run lock
//!
//! A plain state file marks a run in progress. Nothing stops a second process
//! from ignoring it; the orchestrator simply refuses to start while the file
//! has content.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::error::LockError;
use crate::types::{local_hostname, print_date};

/// Guard for an acquired run lock. The lock file is deleted exactly once,
/// either by [`SoftLock::release`] or when the guard is dropped.
#[derive(Debug)]
pub struct SoftLock {
    path: PathBuf,
    released: bool,
}

impl SoftLock {
    /// Acquire the lock for this host
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        Self::acquire_as(path, &local_hostname(), Local::now())
    }

    /// Acquire the lock, recording the given host and timestamp
    pub fn acquire_as(path: &Path, host: &str, now: DateTime<Local>) -> Result<Self, LockError> {
        if let Some(holder) = Self::holder(path)? {
            warn!(path = %path.display(), holder = %holder, "run lock is held");
            return Err(LockError::AlreadyRunning(holder));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(path, e))?;
        }
        let line = format!("{} {}\n", print_date(&now), host);
        std::fs::write(path, line).map_err(|e| io_error(path, e))?;

        info!(path = %path.display(), host, "acquired run lock");
        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// Current lock content, if a run is in progress. Any content counts,
    /// whitespace included.
    pub fn holder(path: &Path) -> Result<Option<String>, LockError> {
        match std::fs::read_to_string(path) {
            Ok(content) if content.is_empty() => Ok(None),
            Ok(content) => {
                let shown = content.trim();
                Ok(Some(if shown.is_empty() {
                    format!("{:?}", content)
                } else {
                    shown.to_string()
                }))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(path, e)),
        }
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock, deleting the state file
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        remove(&self.path)?;
        info!(path = %self.path.display(), "released run lock");
        Ok(())
    }

    /// Remove a lock file left behind by a killed run
    pub fn force_remove(path: &Path) -> Result<bool, LockError> {
        let existed = path.exists();
        remove(path)?;
        Ok(existed)
    }
}

impl Drop for SoftLock {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            match remove(&self.path) {
                Ok(()) => debug!(path = %self.path.display(), "released run lock on drop"),
                Err(e) => warn!(error = %e, "failed to release run lock"),
            }
        }
    }
}

fn remove(path: &Path) -> Result<(), LockError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path, e)),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> LockError {
    LockError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_writes_holder_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("run").join("nightshift.lock");

        let lock = SoftLock::acquire_as(&path, "buildhost", Local::now()).unwrap();
        let content = std::fs::read_to_string(lock.path()).unwrap();
        assert!(content.trim_end().ends_with(" buildhost"));
        assert_eq!(content.lines().count(), 1);

        lock.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_file_counts_as_free() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nightshift.lock");
        std::fs::write(&path, "").unwrap();

        let lock = SoftLock::acquire_as(&path, "buildhost", Local::now()).unwrap();
        lock.release().unwrap();
    }

    #[test]
    fn test_whitespace_only_file_is_held() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nightshift.lock");
        std::fs::write(&path, "  \n").unwrap();

        let err = SoftLock::acquire_as(&path, "buildhost", Local::now()).unwrap_err();
        assert!(matches!(err, LockError::AlreadyRunning(ref holder) if holder == "\"  \\n\""));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "  \n");
    }

    #[test]
    fn test_conflict_reports_contents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nightshift.lock");
        std::fs::write(&path, "01-Jan-2026 00:00:00 +0000 otherhost\n").unwrap();

        let err = SoftLock::acquire_as(&path, "buildhost", Local::now()).unwrap_err();
        match err {
            LockError::AlreadyRunning(holder) => {
                assert_eq!(holder, "01-Jan-2026 00:00:00 +0000 otherhost")
            }
            other => panic!("unexpected error: {other}"),
        }
        // The other run's lock is untouched
        assert!(path.exists());
    }

    #[test]
    fn test_drop_releases() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nightshift.lock");
        {
            let _lock = SoftLock::acquire_as(&path, "buildhost", Local::now()).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_release_does_not_touch_a_new_lock() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nightshift.lock");

        let lock = SoftLock::acquire_as(&path, "buildhost", Local::now()).unwrap();
        lock.release().unwrap();

        // A later run's lock must survive the first guard going away
        let second = SoftLock::acquire_as(&path, "buildhost", Local::now()).unwrap();
        assert!(path.exists());
        second.release().unwrap();
    }

    #[test]
    fn test_force_remove() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nightshift.lock");
        assert!(!SoftLock::force_remove(&path).unwrap());

        std::fs::write(&path, "stale\n").unwrap();
        assert!(SoftLock::force_remove(&path).unwrap());
        assert!(SoftLock::holder(&path).unwrap().is_none());
    }
}
