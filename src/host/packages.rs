// src/host/packages.rs

//! Installed package profile import

use crate::config::RetryPolicy;
use crate::db::models::{AssociationTable, Host, InstalledPackage};
use crate::error::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use super::{ReconcileSummary, retry, sync_associations, write_transaction};

/// One package as reported by a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub name: String,
    #[serde(default)]
    pub epoch: Option<String>,
    pub version: String,
    pub release: String,
    pub arch: String,
    #[serde(default)]
    pub vendor: Option<String>,
}

impl PackageEntry {
    pub fn new(name: &str, version: &str, release: &str, arch: &str) -> Self {
        Self {
            name: name.to_string(),
            epoch: None,
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
            vendor: None,
        }
    }

    pub fn with_epoch(mut self, epoch: &str) -> Self {
        self.epoch = Some(epoch.to_string());
        self
    }

    pub fn with_vendor(mut self, vendor: &str) -> Self {
        self.vendor = Some(vendor.to_string());
        self
    }

    pub fn nvra(&self) -> String {
        format!("{}-{}-{}.{}", self.name, self.version, self.release, self.arch)
    }

    /// nvra with the epoch spliced in; a missing or zero epoch is omitted
    pub fn nvrea(&self) -> String {
        match self.epoch.as_deref() {
            Some(epoch) if !epoch.is_empty() && epoch != "0" => format!(
                "{}-{}:{}-{}.{}",
                self.name, epoch, self.version, self.release, self.arch
            ),
            _ => self.nvra(),
        }
    }

    fn to_catalog_row(&self) -> InstalledPackage {
        InstalledPackage {
            id: None,
            name: self.name.clone(),
            nvra: self.nvra(),
            nvrea: self.nvrea(),
            epoch: self.epoch.clone(),
            version: self.version.clone(),
            release: self.release.clone(),
            arch: self.arch.clone(),
            vendor: self.vendor.clone(),
        }
    }
}

/// Collapse duplicates by nvrea; a later entry carrying a vendor supplies it
fn dedupe(entries: &[PackageEntry]) -> BTreeMap<String, PackageEntry> {
    let mut unique: BTreeMap<String, PackageEntry> = BTreeMap::new();
    for entry in entries {
        match unique.get_mut(&entry.nvrea()) {
            Some(existing) => {
                if existing.vendor.is_none() {
                    existing.vendor = entry.vendor.clone();
                }
            }
            None => {
                unique.insert(entry.nvrea(), entry.clone());
            }
        }
    }
    unique
}

/// Make the host's installed-package associations match `entries`
///
/// Catalog rows are created as needed and a missing vendor is backfilled
/// from the report. Associations for packages still installed keep their
/// ids.
pub fn import_package_profile(
    conn: &Connection,
    host: &Host,
    entries: &[PackageEntry],
    policy: &RetryPolicy,
) -> Result<ReconcileSummary> {
    let host_id = host.require_id()?;
    let unique = dedupe(entries);
    let nvreas: Vec<String> = unique.keys().cloned().collect();
    debug!(
        "Host {}: {} package entries ({} unique)",
        host.name,
        entries.len(),
        unique.len()
    );

    let summary = retry::with_retry(&host.name, policy, || {
        let tx = write_transaction(conn)?;
        for entry in unique.values() {
            entry.to_catalog_row().insert_or_ignore(&tx)?;
            if let Some(vendor) = &entry.vendor {
                InstalledPackage::backfill_vendor(&tx, &entry.nvrea(), vendor)?;
            }
        }

        let desired: BTreeSet<i64> = InstalledPackage::find_by_nvreas(&tx, &nvreas)?
            .into_iter()
            .filter_map(|p| p.id)
            .collect();
        let summary = sync_associations(&tx, AssociationTable::Packages, host_id, &desired)?;
        tx.commit()?;
        Ok(summary)
    })?;

    info!(
        "Host {}: packages +{} -{} ={}",
        host.name, summary.added, summary.removed, summary.unchanged
    );
    Ok(summary)
}
