// src/host/mod.rs

//! Host content reconciliation
//!
//! Facts reported by a host (installed packages, debs, module streams,
//! traces) are reconciled against its stored associations. Packages, debs
//! and module streams are diffed so unchanged association rows keep their
//! ids; traces are replaced wholesale. Each import runs in one write
//! transaction and is retried under contention.

pub mod batch;
pub mod content_state;
pub mod debs;
pub mod module_streams;
pub mod overrides;
pub mod packages;
pub mod retry;
pub mod status;
pub mod traces;

pub use batch::{CycleSummary, FactSection, HostOutcome, HostReport, SectionFailure, reconcile_batch, reconcile_host};
pub use content_state::{ContentAssignmentRequest, HostContentState, assign_single_environment};
pub use debs::{DebEntry, import_deb_profile};
pub use module_streams::{ModuleStreamEntry, effective_status, import_module_streams};
pub use overrides::{OverrideRequest, OverrideSummary, OverrideValue, available_content_labels, update_content_overrides};
pub use packages::{PackageEntry, import_package_profile};
pub use retry::with_retry;
pub use status::{StatusCache, TraceStatus};
pub use traces::{TraceEntry, import_tracer_profile};

use crate::db::models::AssociationTable;
use crate::error::Result;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::collections::BTreeSet;

/// What one reconciliation changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Start a write transaction that takes the database write lock immediately,
/// so contention shows up at BEGIN rather than halfway through
pub(crate) fn write_transaction(conn: &Connection) -> Result<Transaction<'_>> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}

/// Make a host's associations in `table` exactly `desired`: one DELETE for
/// the removed ids, one INSERT for the added ones, nothing for the rest
pub(crate) fn sync_associations(
    conn: &Connection,
    table: AssociationTable,
    host_id: i64,
    desired: &BTreeSet<i64>,
) -> Result<ReconcileSummary> {
    let current: BTreeSet<i64> = table
        .list_for_host(conn, host_id)?
        .into_iter()
        .map(|a| a.entity_id)
        .collect();

    let removed: Vec<i64> = current.difference(desired).copied().collect();
    let added: Vec<i64> = desired.difference(&current).copied().collect();

    if !removed.is_empty() {
        table.delete_for_host(conn, host_id, &removed)?;
    }
    if !added.is_empty() {
        table.insert_for_host(conn, host_id, &added)?;
    }

    Ok(ReconcileSummary {
        added: added.len(),
        removed: removed.len(),
        updated: 0,
        unchanged: current.intersection(desired).count(),
    })
}
