// src/host/traces.rs

//! Tracer profile import

use crate::config::RetryPolicy;
use crate::db::models::{Host, HostTrace};
use crate::error::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{retry, write_transaction};

/// A process or service reported as needing a restart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub application: String,
    #[serde(default)]
    pub helper: Option<String>,
    #[serde(rename = "type")]
    pub app_type: String,
}

impl TraceEntry {
    pub fn new(application: &str, helper: Option<&str>, app_type: &str) -> Self {
        Self {
            application: application.to_string(),
            helper: helper.map(str::to_string),
            app_type: app_type.to_string(),
        }
    }
}

/// Replace the host's traces with `entries`; entries without a helper are skipped
pub fn import_tracer_profile(
    conn: &Connection,
    host: &Host,
    entries: &[TraceEntry],
    policy: &RetryPolicy,
) -> Result<usize> {
    let host_id = host.require_id()?;
    let traces: Vec<HostTrace> = entries
        .iter()
        .filter_map(|entry| {
            let helper = entry.helper.as_deref().filter(|h| !h.is_empty())?;
            Some(HostTrace {
                id: None,
                host_id,
                application: entry.application.clone(),
                helper: helper.to_string(),
                app_type: entry.app_type.clone(),
            })
        })
        .collect();
    if traces.len() < entries.len() {
        debug!(
            "Host {}: skipped {} traces without a helper",
            host.name,
            entries.len() - traces.len()
        );
    }

    let inserted = retry::with_retry(&host.name, policy, || {
        let tx = write_transaction(conn)?;
        HostTrace::delete_for_host(&tx, host_id)?;
        let inserted = HostTrace::insert_all(&tx, &traces)?;
        tx.commit()?;
        Ok(inserted)
    })?;

    info!("Host {}: {} traces", host.name, inserted);
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::Organization;

    #[test]
    fn test_traces_replaced_and_helperless_skipped() {
        let conn = db::open_in_memory().unwrap();
        let mut org = Organization::new("Acme".to_string(), "acme".to_string());
        let org_id = org.insert(&conn).unwrap();
        let mut host = Host::new(org_id, "web01".to_string());
        let host_id = host.insert(&conn).unwrap();
        let policy = RetryPolicy {
            attempts: 1,
            base_delay_ms: 1,
        };

        let first = [
            TraceEntry::new("sshd", Some("systemctl restart sshd"), "daemon"),
            TraceEntry::new("bash", None, "session"),
        ];
        assert_eq!(import_tracer_profile(&conn, &host, &first, &policy).unwrap(), 1);

        let second = [TraceEntry::new("kernel", Some("reboot"), "static")];
        import_tracer_profile(&conn, &host, &second, &policy).unwrap();

        let stored = HostTrace::list_for_host(&conn, host_id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].application, "kernel");
    }
}
