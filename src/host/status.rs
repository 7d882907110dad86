// src/host/status.rs

//! Derived host statuses
//!
//! Statuses are computed from stored facts. A `StatusCache` lives for one
//! call (a report, a batch) and computes each host's status at most once;
//! it never outlives the facts it was computed from.

use crate::db::models::HostTrace;
use crate::error::Result;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use strum_macros::Display;

/// App type tracer reports for things only a reboot can refresh
const STATIC_APP_TYPE: &str = "static";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    UpToDate,
    ProcessRestart,
    Reboot,
}

impl TraceStatus {
    pub fn from_traces(traces: &[HostTrace]) -> Self {
        if traces.iter().any(|t| t.app_type == STATIC_APP_TYPE) {
            Self::Reboot
        } else if !traces.is_empty() {
            Self::ProcessRestart
        } else {
            Self::UpToDate
        }
    }
}

#[derive(Debug, Default)]
pub struct StatusCache {
    traces: HashMap<i64, TraceStatus>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trace_status(&mut self, conn: &Connection, host_id: i64) -> Result<TraceStatus> {
        if let Some(status) = self.traces.get(&host_id) {
            return Ok(*status);
        }
        let status = TraceStatus::from_traces(&HostTrace::list_for_host(conn, host_id)?);
        self.traces.insert(host_id, status);
        Ok(status)
    }

    /// Drop a host's cached statuses after its facts change
    pub fn invalidate(&mut self, host_id: i64) {
        self.traces.remove(&host_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::db;
    use crate::db::models::{Host, Organization};
    use crate::host::traces::{TraceEntry, import_tracer_profile};

    fn trace(app_type: &str) -> HostTrace {
        HostTrace {
            id: None,
            host_id: 1,
            application: "app".to_string(),
            helper: "restart".to_string(),
            app_type: app_type.to_string(),
        }
    }

    #[test]
    fn test_status_from_traces() {
        assert_eq!(TraceStatus::from_traces(&[]), TraceStatus::UpToDate);
        assert_eq!(TraceStatus::from_traces(&[trace("daemon")]), TraceStatus::ProcessRestart);
        assert_eq!(
            TraceStatus::from_traces(&[trace("daemon"), trace("static")]),
            TraceStatus::Reboot
        );
        assert_eq!(TraceStatus::ProcessRestart.to_string(), "process_restart");
    }

    #[test]
    fn test_cache_holds_until_invalidated() {
        let conn = db::open_in_memory().unwrap();
        let mut org = Organization::new("Acme".to_string(), "acme".to_string());
        let org_id = org.insert(&conn).unwrap();
        let mut host = Host::new(org_id, "web01".to_string());
        let host_id = host.insert(&conn).unwrap();
        let policy = RetryPolicy {
            attempts: 1,
            base_delay_ms: 1,
        };

        let mut cache = StatusCache::new();
        assert_eq!(cache.trace_status(&conn, host_id).unwrap(), TraceStatus::UpToDate);

        import_tracer_profile(&conn, &host, &[TraceEntry::new("kernel", Some("reboot"), "static")], &policy)
            .unwrap();
        assert_eq!(cache.trace_status(&conn, host_id).unwrap(), TraceStatus::UpToDate);

        cache.invalidate(host_id);
        assert_eq!(cache.trace_status(&conn, host_id).unwrap(), TraceStatus::Reboot);
    }
}
