// src/config.rs

//! Engine configuration
//!
//! Loaded from a TOML file; every field has a default so a missing file or a
//! partial file both work.
//!
//! # Example (TOML)
//!
//! ```toml
//! db_path = "/var/lib/cvflow/cvflow.db"
//! default_copy_mode = "incremental"
//!
//! [lock]
//! attempts = 8
//! base_delay_ms = 50
//!
//! [reconcile]
//! attempts = 5
//! base_delay_ms = 20
//! ```

use crate::db::paths;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// How clones of a new version are filled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyMode {
    /// Copy the (filtered) units of each source repository into an empty clone
    #[default]
    Full,
    /// Seed each clone from the prior version's clone, then mirror the
    /// filtered source content into it
    Incremental,
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

fn default_lock_policy() -> RetryPolicy {
    RetryPolicy {
        attempts: 5,
        base_delay_ms: 100,
    }
}

fn default_reconcile_policy() -> RetryPolicy {
    RetryPolicy {
        attempts: 3,
        base_delay_ms: 50,
    }
}

fn default_db_path() -> String {
    paths::default_db_path().to_string_lossy().into_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Plan journal directory (default: `<db dir>/journal`)
    #[serde(default)]
    pub journal_dir: Option<PathBuf>,

    /// Attach lock directory (default: `<db dir>/locks`)
    #[serde(default)]
    pub lock_dir: Option<PathBuf>,

    /// Local content store root (default: `<db dir>/store`)
    #[serde(default)]
    pub store_dir: Option<PathBuf>,

    /// Export staging directory (default: `<db dir>/exports`)
    #[serde(default)]
    pub export_dir: Option<PathBuf>,

    #[serde(default = "default_lock_policy")]
    pub lock: RetryPolicy,

    #[serde(default = "default_reconcile_policy")]
    pub reconcile: RetryPolicy,

    #[serde(default)]
    pub default_copy_mode: CopyMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_db(default_db_path())
    }
}

impl EngineConfig {
    /// Defaults for a database at `db_path`
    pub fn for_db(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            journal_dir: None,
            lock_dir: None,
            store_dir: None,
            export_dir: None,
            lock: default_lock_policy(),
            reconcile: default_reconcile_policy(),
            default_copy_mode: CopyMode::default(),
        }
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn journal_dir(&self) -> PathBuf {
        self.journal_dir
            .clone()
            .unwrap_or_else(|| paths::journal_dir(&self.db_path))
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.lock_dir
            .clone()
            .unwrap_or_else(|| paths::lock_dir(&self.db_path))
    }

    pub fn store_dir(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| paths::store_dir(&self.db_path))
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| paths::export_dir(&self.db_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            db_path = "/srv/cvflow/cvflow.db"
            default_copy_mode = "incremental"

            [reconcile]
            attempts = 7
            base_delay_ms = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.default_copy_mode, CopyMode::Incremental);
        assert_eq!(config.reconcile.attempts, 7);
        assert_eq!(config.lock, default_lock_policy());
        assert_eq!(config.journal_dir(), PathBuf::from("/srv/cvflow/journal"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig::load(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_copy_mode, CopyMode::Full);
    }

    #[test]
    fn test_bad_toml_is_error() {
        assert!(matches!(
            EngineConfig::from_toml("lock = 3"),
            Err(crate::Error::Toml(_))
        ));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            attempts: 4,
            base_delay_ms: 10,
        };
        assert_eq!(policy.delay(0), Duration::from_millis(10));
        assert_eq!(policy.delay(3), Duration::from_millis(80));
    }
}
