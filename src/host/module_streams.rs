// src/host/module_streams.rs

//! Module stream profile import

use crate::config::RetryPolicy;
use crate::db::models::{AvailableModuleStream, Host, HostModuleStream};
use crate::error::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::{ReconcileSummary, retry, write_transaction};

pub const STATUS_ENABLED: &str = "enabled";
pub const STATUS_UNKNOWN: &str = "unknown";

/// One module stream as reported by a host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStreamEntry {
    pub name: String,
    pub stream: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub installed_profiles: Vec<String>,
}

impl ModuleStreamEntry {
    pub fn new(name: &str, stream: &str) -> Self {
        Self {
            name: name.to_string(),
            stream: stream.to_string(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    fn context(&self) -> &str {
        self.context.as_deref().unwrap_or("")
    }
}

/// Status to store for a reported stream
///
/// An enabled stream reported inactive is stored as `unknown`; every other
/// combination keeps the reported status.
pub fn effective_status(entry: &ModuleStreamEntry) -> Option<String> {
    if entry.active == Some(false) && entry.status.as_deref() == Some(STATUS_ENABLED) {
        return Some(STATUS_UNKNOWN.to_string());
    }
    entry.status.clone()
}

/// Make the host's module stream rows match `entries`
pub fn import_module_streams(
    conn: &Connection,
    host: &Host,
    entries: &[ModuleStreamEntry],
    policy: &RetryPolicy,
) -> Result<ReconcileSummary> {
    let host_id = host.require_id()?;

    let summary = retry::with_retry(&host.name, policy, || {
        let tx = write_transaction(conn)?;

        // stream id -> desired row; a repeated stream keeps the last report
        let mut desired: BTreeMap<i64, HostModuleStream> = BTreeMap::new();
        for entry in entries {
            let available = AvailableModuleStream::find_or_create(&tx, &entry.name, &entry.stream, entry.context())?;
            desired.insert(
                available.id,
                HostModuleStream {
                    id: None,
                    host_id,
                    available_module_stream_id: available.id,
                    status: effective_status(entry),
                    installed_profiles: entry.installed_profiles.clone(),
                },
            );
        }

        let current: BTreeMap<i64, HostModuleStream> = HostModuleStream::list_for_host(&tx, host_id)?
            .into_iter()
            .map(|row| (row.available_module_stream_id, row))
            .collect();

        let stale: Vec<i64> = current
            .keys()
            .filter(|id| !desired.contains_key(id))
            .copied()
            .collect();
        if !stale.is_empty() {
            HostModuleStream::delete_for_streams(&tx, host_id, &stale)?;
        }

        let mut summary = ReconcileSummary {
            removed: stale.len(),
            ..ReconcileSummary::default()
        };
        for (stream_id, mut row) in desired {
            match current.get(&stream_id) {
                Some(existing)
                    if existing.status == row.status && existing.installed_profiles == row.installed_profiles =>
                {
                    summary.unchanged += 1;
                }
                Some(_) => {
                    row.update(&tx)?;
                    summary.updated += 1;
                }
                None => {
                    row.insert(&tx)?;
                    summary.added += 1;
                }
            }
        }

        tx.commit()?;
        Ok(summary)
    })?;

    info!(
        "Host {}: module streams +{} -{} ~{} ={}",
        host.name, summary.added, summary.removed, summary.updated, summary.unchanged
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::Organization;

    fn setup() -> (Connection, Host) {
        let conn = db::open_in_memory().unwrap();
        let mut org = Organization::new("Acme".to_string(), "acme".to_string());
        let org_id = org.insert(&conn).unwrap();
        let mut host = Host::new(org_id, "web01".to_string());
        host.insert(&conn).unwrap();
        (conn, host)
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 2,
            base_delay_ms: 1,
        }
    }

    #[test]
    fn test_status_transition_table() {
        let enabled = ModuleStreamEntry::new("nodejs", "18").with_status("enabled");
        assert_eq!(
            effective_status(&enabled.clone().with_active(false)).as_deref(),
            Some("unknown")
        );
        assert_eq!(
            effective_status(&enabled.clone().with_active(true)).as_deref(),
            Some("enabled")
        );
        assert_eq!(effective_status(&enabled).as_deref(), Some("enabled"));

        let disabled = ModuleStreamEntry::new("nodejs", "18").with_status("disabled").with_active(false);
        assert_eq!(effective_status(&disabled).as_deref(), Some("disabled"));
        assert_eq!(effective_status(&ModuleStreamEntry::new("nodejs", "18").with_active(false)), None);
    }

    #[test]
    fn test_updates_changed_rows_in_place() {
        let (conn, host) = setup();
        let host_id = host.id.unwrap();

        let first = [
            ModuleStreamEntry::new("nodejs", "18").with_status("enabled"),
            ModuleStreamEntry::new("postgresql", "15").with_status("enabled"),
        ];
        import_module_streams(&conn, &host, &first, &policy()).unwrap();
        let before = HostModuleStream::list_for_host(&conn, host_id).unwrap();

        let second = [
            ModuleStreamEntry::new("nodejs", "18").with_status("enabled").with_active(false),
            ModuleStreamEntry::new("ruby", "3.1").with_status("enabled"),
        ];
        let summary = import_module_streams(&conn, &host, &second, &policy()).unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.updated, 1);

        let after = HostModuleStream::list_for_host(&conn, host_id).unwrap();
        assert_eq!(after.len(), 2);
        let nodejs = after
            .iter()
            .find(|r| r.available_module_stream_id == before[0].available_module_stream_id)
            .unwrap();
        assert_eq!(nodejs.id, before[0].id);
        assert_eq!(nodejs.status.as_deref(), Some("unknown"));
    }

    #[test]
    fn test_unchanged_report_is_noop() {
        let (conn, host) = setup();
        let report = [ModuleStreamEntry::new("nodejs", "18").with_status("enabled")];
        import_module_streams(&conn, &host, &report, &policy()).unwrap();
        let summary = import_module_streams(&conn, &host, &report, &policy()).unwrap();
        assert_eq!(
            summary,
            ReconcileSummary {
                unchanged: 1,
                ..ReconcileSummary::default()
            }
        );
    }
}
