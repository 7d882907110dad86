// src/host/debs.rs

//! Debian package profile import

use crate::config::RetryPolicy;
use crate::db::models::{AssociationTable, Host, InstalledDeb};
use crate::error::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use super::{ReconcileSummary, retry, sync_associations, write_transaction};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DebEntry {
    pub name: String,
    pub version: String,
    pub architecture: String,
}

impl DebEntry {
    pub fn new(name: &str, version: &str, architecture: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            architecture: architecture.to_string(),
        }
    }
}

/// Make the host's deb associations match `entries`, with the same diff
/// semantics as the rpm profile
pub fn import_deb_profile(
    conn: &Connection,
    host: &Host,
    entries: &[DebEntry],
    policy: &RetryPolicy,
) -> Result<ReconcileSummary> {
    let host_id = host.require_id()?;
    let unique: BTreeSet<&DebEntry> = entries.iter().collect();

    let summary = retry::with_retry(&host.name, policy, || {
        let tx = write_transaction(conn)?;
        let mut desired = BTreeSet::new();
        for deb in &unique {
            desired.insert(InstalledDeb::find_or_create(&tx, &deb.name, &deb.version, &deb.architecture)?);
        }
        let summary = sync_associations(&tx, AssociationTable::Debs, host_id, &desired)?;
        tx.commit()?;
        Ok(summary)
    })?;

    info!(
        "Host {}: debs +{} -{} ={}",
        host.name, summary.added, summary.removed, summary.unchanged
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::Organization;

    #[test]
    fn test_deb_profile_diff() {
        let conn = db::open_in_memory().unwrap();
        let mut org = Organization::new("Acme".to_string(), "acme".to_string());
        let org_id = org.insert(&conn).unwrap();
        let mut host = Host::new(org_id, "deb01".to_string());
        let host_id = host.insert(&conn).unwrap();
        let policy = RetryPolicy {
            attempts: 1,
            base_delay_ms: 1,
        };

        let curl = DebEntry::new("curl", "7.88.1-10", "amd64");
        let vim = DebEntry::new("vim", "9.0.1378-2", "amd64");
        let git = DebEntry::new("git", "2.39.2-1", "amd64");

        import_deb_profile(&conn, &host, &[curl.clone(), vim.clone(), vim.clone()], &policy).unwrap();
        assert_eq!(InstalledDeb::list_for_host(&conn, host_id).unwrap().len(), 2);

        let summary = import_deb_profile(&conn, &host, &[vim, git], &policy).unwrap();
        assert_eq!((summary.added, summary.removed, summary.unchanged), (1, 1, 1));

        let names: Vec<String> = InstalledDeb::list_for_host(&conn, host_id)
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert!(names.contains(&"git".to_string()));
        assert!(!names.contains(&"curl".to_string()));
    }
}
