// src/error.rs

//! Error types for cvflow
//!
//! One error enum covers the library. Variants carry enough context to report
//! which version, step or host was involved without re-querying state.

use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the lifecycle engine
#[derive(Error, Debug)]
pub enum Error {
    /// A version with the requested numbers already exists
    #[error("Content view version {content_view} {major}.{minor} already exists")]
    VersionConflict {
        content_view: String,
        major: i64,
        minor: i64,
    },

    /// Import metadata does not fit this system; nothing was changed
    #[error("Compatibility check failed: {}", .0.join("; "))]
    CompatibilityCheckFailed(Vec<String>),

    /// Content copy into a clone failed
    #[error("Failed to copy content from {source_repo} to {target_repo}: {reason}")]
    CopyFailure {
        source_repo: String,
        target_repo: String,
        reason: String,
    },

    /// Environment lock could not be acquired within the bounded wait
    #[error("Could not acquire attach lock for environment {environment}: {reason}")]
    AttachConflict { environment: String, reason: String },

    /// Host fact writes kept colliding with a concurrent writer
    #[error("Reconciliation for host {host} gave up after {attempts} attempts")]
    ReconciliationContention { host: String, attempts: u32 },

    /// Version is not present in the environment prior to the target
    #[error("Version {version} must be promoted to {prior} before {target}")]
    PromotionOrder {
        version: String,
        prior: String,
        target: String,
    },

    /// A plan step failed; carries the failing step and its resolved input
    #[error("Plan step {step} ({action}) failed: {source}")]
    PlanFailed {
        step: usize,
        action: String,
        input: serde_json::Value,
        #[source]
        source: Box<Error>,
    },

    /// Cancellation was requested before the named operation
    #[error("Operation cancelled before {0}")]
    Cancelled(String),

    /// Plan journal could not be written or parsed
    #[error("Journal error: {0}")]
    Journal(String),

    /// Content store rejected or failed an operation
    #[error("Content store error: {0}")]
    Store(String),

    /// A referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied inconsistent or malformed input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record is still referenced and cannot be removed
    #[error("{0} is still in use")]
    InUse(String),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration parse error
    #[error("Configuration error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid unit filter pattern
    #[error("Invalid filter pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl Error {
    /// True when the underlying SQLite error means another writer holds the database
    pub fn is_contention(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// The error that failed a plan step, or `self` for any other error
    pub fn step_cause(&self) -> &Error {
        match self {
            Self::PlanFailed { source, .. } => source.step_cause(),
            other => other,
        }
    }

    /// True when the underlying SQLite error is a UNIQUE/constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Database(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_names_existing_version() {
        let err = Error::VersionConflict {
            content_view: "base".to_string(),
            major: 1,
            minor: 0,
        };
        assert_eq!(
            err.to_string(),
            "Content view version base 1.0 already exists"
        );
    }

    #[test]
    fn test_compatibility_lists_every_problem() {
        let err = Error::CompatibilityCheckFailed(vec![
            "path missing".to_string(),
            "repo unknown".to_string(),
        ]);
        assert!(err.to_string().contains("path missing; repo unknown"));
    }

    #[test]
    fn test_busy_is_contention() {
        let err = Error::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        assert!(err.is_contention());
        assert!(!Error::NotFound("x".to_string()).is_contention());
    }
}
