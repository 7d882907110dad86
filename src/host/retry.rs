// src/host/retry.rs

//! Bounded retry for host fact writes under database contention

use crate::config::RetryPolicy;
use crate::error::{Error, Result};
use tracing::debug;

/// Run `op`, retrying while it fails with SQLITE_BUSY/LOCKED.
///
/// `op` must be a complete, idempotent write (its own transaction); any other
/// error is returned at once. After `policy.attempts` contended tries the
/// cycle fails with `ReconciliationContention`.
pub fn with_retry<T, F>(host: &str, policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = policy.attempts.max(1);
    for attempt in 0..attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_contention() => {
                debug!(
                    "Host {}: database busy (attempt {}/{})",
                    host,
                    attempt + 1,
                    attempts
                );
                if attempt + 1 < attempts {
                    std::thread::sleep(policy.delay(attempt));
                }
            }
            Err(e) => return Err(e),
        }
    }
    Err(Error::ReconciliationContention {
        host: host.to_string(),
        attempts,
    })
}
