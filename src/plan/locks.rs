// src/plan/locks.rs

//! Per-environment attach locks
//!
//! Attaching a version to an environment takes an exclusive advisory lock on
//! `<lock_dir>/env-<id>.lock`. Acquisition retries with exponential backoff and
//! gives up with `AttachConflict`; it never blocks indefinitely.

use crate::config::RetryPolicy;
use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Held exclusive lock on one environment; released on drop
#[derive(Debug)]
pub struct EnvironmentLock {
    environment_id: i64,
    path: PathBuf,
    file: File,
}

impl EnvironmentLock {
    pub fn acquire(lock_dir: &Path, environment_id: i64, policy: &RetryPolicy) -> Result<Self> {
        fs::create_dir_all(lock_dir)?;
        let path = lock_dir.join(format!("env-{}.lock", environment_id));
        let file = File::create(&path)?;

        let attempts = policy.attempts.max(1);
        let mut last_error = None;
        for attempt in 0..attempts {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!("Locked environment {}", environment_id);
                    return Ok(Self {
                        environment_id,
                        path,
                        file,
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt + 1 < attempts {
                        std::thread::sleep(policy.delay(attempt));
                    }
                }
            }
        }

        let reason = match last_error {
            Some(e) => format!("still held after {} attempts ({})", attempts, e),
            None => format!("still held after {} attempts", attempts),
        };
        Err(Error::AttachConflict {
            environment: environment_id.to_string(),
            reason,
        })
    }

    pub fn environment_id(&self) -> i64 {
        self.environment_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EnvironmentLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn quick() -> RetryPolicy {
        RetryPolicy {
            attempts: 2,
            base_delay_ms: 1,
        }
    }

    #[test]
    fn test_second_holder_gets_attach_conflict() {
        let temp = TempDir::new().unwrap();
        let held = EnvironmentLock::acquire(temp.path(), 7, &quick()).unwrap();

        let err = EnvironmentLock::acquire(temp.path(), 7, &quick()).unwrap_err();
        assert!(matches!(err, Error::AttachConflict { ref environment, .. } if environment == "7"));

        // Other environments are independent
        EnvironmentLock::acquire(temp.path(), 8, &quick()).unwrap();

        drop(held);
        EnvironmentLock::acquire(temp.path(), 7, &quick()).unwrap();
    }
}
