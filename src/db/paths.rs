// src/db/paths.rs
//! Centralized path derivation for cvflow directories

use std::path::{Path, PathBuf};

/// Default database location when neither the CLI nor config names one
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join("cvflow")
        .join("cvflow.db")
}

/// Get the directory containing the database
pub fn db_dir(db_path: &str) -> PathBuf {
    Path::new(db_path)
        .parent()
        .unwrap_or(Path::new("/var/lib/cvflow"))
        .to_path_buf()
}

/// Directory holding plan journals
pub fn journal_dir(db_path: &str) -> PathBuf {
    db_dir(db_path).join("journal")
}

/// Directory holding per-environment attach lock files
pub fn lock_dir(db_path: &str) -> PathBuf {
    db_dir(db_path).join("locks")
}

/// Root of the local directory-backed content store
pub fn store_dir(db_path: &str) -> PathBuf {
    std::env::var("CVFLOW_STORE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| db_dir(db_path).join("store"))
}

/// Default staging directory for version exports
pub fn export_dir(db_path: &str) -> PathBuf {
    db_dir(db_path).join("exports")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_dir() {
        assert_eq!(
            db_dir("/var/lib/cvflow/cvflow.db"),
            PathBuf::from("/var/lib/cvflow")
        );
    }

    #[test]
    fn test_journal_and_lock_dirs() {
        assert_eq!(
            journal_dir("/srv/cvflow/cvflow.db"),
            PathBuf::from("/srv/cvflow/journal")
        );
        assert_eq!(
            lock_dir("/srv/cvflow/cvflow.db"),
            PathBuf::from("/srv/cvflow/locks")
        );
    }

    #[test]
    fn test_export_dir() {
        assert_eq!(
            export_dir("/srv/cvflow/cvflow.db"),
            PathBuf::from("/srv/cvflow/exports")
        );
    }
}
