// src/host/batch.rs

//! Reconciling fact reports from many hosts
//!
//! Hosts are independent: each report is reconciled on its own connection
//! and a failure (including exhausted contention retries) fails only that
//! host's cycle. Within a cycle every section commits on its own, so a
//! failed section is reported next to the sections that did land.

use crate::config::EngineConfig;
use crate::db;
use crate::db::models::Host;
use crate::error::{Error, Result};
use rayon::prelude::*;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::{info, warn};

use super::debs::{DebEntry, import_deb_profile};
use super::module_streams::{ModuleStreamEntry, import_module_streams};
use super::packages::{PackageEntry, import_package_profile};
use super::traces::{TraceEntry, import_tracer_profile};
use super::ReconcileSummary;

/// Facts reported by one host; absent sections are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostReport {
    pub host: String,
    #[serde(default)]
    pub packages: Option<Vec<PackageEntry>>,
    #[serde(default)]
    pub module_streams: Option<Vec<ModuleStreamEntry>>,
    #[serde(default)]
    pub debs: Option<Vec<DebEntry>>,
    #[serde(default)]
    pub traces: Option<Vec<TraceEntry>>,
}

impl HostReport {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FactSection {
    Packages,
    ModuleStreams,
    Debs,
    Traces,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionFailure {
    pub section: FactSection,
    pub error: String,
}

/// Committed sections of one cycle, plus the sections that failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub packages: Option<ReconcileSummary>,
    pub module_streams: Option<ReconcileSummary>,
    pub debs: Option<ReconcileSummary>,
    pub traces: Option<usize>,
    pub failed: Vec<SectionFailure>,
}

impl CycleSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record<T>(&mut self, host: &str, section: FactSection, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Host {}: {} reconciliation failed: {}", host, section, e);
                self.failed.push(SectionFailure {
                    section,
                    error: e.to_string(),
                });
                None
            }
        }
    }
}

#[derive(Debug)]
pub struct HostOutcome {
    pub host: String,
    /// `Err` only when the cycle could not start
    pub result: Result<CycleSummary>,
}

impl HostOutcome {
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(summary) if summary.is_complete())
    }
}

/// Reconcile every section present in one host's report
pub fn reconcile_host(conn: &Connection, config: &EngineConfig, report: &HostReport) -> Result<CycleSummary> {
    let host = Host::find_by_name(conn, &report.host)?
        .ok_or_else(|| Error::NotFound(format!("host {}", report.host)))?;
    let policy = &config.reconcile;
    let name = report.host.as_str();

    let mut summary = CycleSummary::default();
    if let Some(packages) = &report.packages {
        let result = import_package_profile(conn, &host, packages, policy);
        summary.packages = summary.record(name, FactSection::Packages, result);
    }
    if let Some(streams) = &report.module_streams {
        let result = import_module_streams(conn, &host, streams, policy);
        summary.module_streams = summary.record(name, FactSection::ModuleStreams, result);
    }
    if let Some(debs) = &report.debs {
        let result = import_deb_profile(conn, &host, debs, policy);
        summary.debs = summary.record(name, FactSection::Debs, result);
    }
    if let Some(traces) = &report.traces {
        let result = import_tracer_profile(conn, &host, traces, policy);
        summary.traces = summary.record(name, FactSection::Traces, result);
    }
    Ok(summary)
}

/// Reconcile many hosts in parallel, one outcome per report in input order
pub fn reconcile_batch(config: &EngineConfig, reports: &[HostReport]) -> Vec<HostOutcome> {
    let outcomes: Vec<HostOutcome> = reports
        .par_iter()
        .map(|report| {
            let result = db::open(&config.db_path).and_then(|conn| reconcile_host(&conn, config, report));
            if let Err(e) = &result {
                warn!("Host {}: reconciliation failed: {}", report.host, e);
            }
            HostOutcome {
                host: report.host.clone(),
                result,
            }
        })
        .collect();

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    info!(
        "Reconciled {} hosts ({} failed)",
        outcomes.len(),
        failed
    );
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{InstalledPackage, Organization};
    use tempfile::TempDir;

    fn setup(hosts: &[&str]) -> (TempDir, EngineConfig) {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("cvflow.db");
        let db_path = db_path.to_str().unwrap().to_string();
        db::init(&db_path).unwrap();

        let conn = db::open(&db_path).unwrap();
        let mut org = Organization::new("Acme".to_string(), "acme".to_string());
        let org_id = org.insert(&conn).unwrap();
        for name in hosts {
            Host::new(org_id, name.to_string()).insert(&conn).unwrap();
        }
        (temp, EngineConfig::for_db(db_path))
    }

    #[test]
    fn test_batch_reports_per_host() {
        let (_temp, config) = setup(&["web01", "web02"]);

        let mut web01 = HostReport::new("web01");
        web01.packages = Some(vec![PackageEntry::new("bash", "5.1", "1", "x86_64")]);
        let mut web02 = HostReport::new("web02");
        web02.traces = Some(vec![TraceEntry::new("sshd", Some("systemctl restart sshd"), "daemon")]);
        let ghost = HostReport::new("ghost");

        let outcomes = reconcile_batch(&config, &[web01, web02, ghost]);
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].host, "web01");
        assert!(outcomes[0].is_success());
        assert!(outcomes[1].is_success());
        assert!(matches!(outcomes[2].result, Err(Error::NotFound(_))));

        let summary = outcomes[0].result.as_ref().unwrap();
        assert_eq!(summary.packages.unwrap().added, 1);
        assert!(summary.traces.is_none());

        let conn = db::open(&config.db_path).unwrap();
        let web01 = Host::find_by_name(&conn, "web01").unwrap().unwrap();
        assert_eq!(InstalledPackage::list_for_host(&conn, web01.id.unwrap()).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_section_reported_beside_committed_ones() {
        let (_temp, config) = setup(&["web01"]);
        let conn = db::open(&config.db_path).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_debs BEFORE INSERT ON host_installed_debs
             BEGIN SELECT RAISE(ABORT, 'debs rejected'); END;",
        )
        .unwrap();

        let mut report = HostReport::new("web01");
        report.packages = Some(vec![PackageEntry::new("bash", "5.1", "1", "x86_64")]);
        report.debs = Some(vec![DebEntry::new("libc6", "2.36-9", "amd64")]);
        report.traces = Some(vec![TraceEntry::new("sshd", Some("systemctl restart sshd"), "daemon")]);

        let outcomes = reconcile_batch(&config, &[report]);
        assert!(!outcomes[0].is_success());

        let summary = outcomes[0].result.as_ref().unwrap();
        assert_eq!(summary.packages.unwrap().added, 1);
        assert_eq!(summary.traces, Some(1));
        assert!(summary.debs.is_none());
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].section, FactSection::Debs);

        let web01 = Host::find_by_name(&conn, "web01").unwrap().unwrap();
        assert_eq!(InstalledPackage::list_for_host(&conn, web01.id.unwrap()).unwrap().len(), 1);
    }
}
