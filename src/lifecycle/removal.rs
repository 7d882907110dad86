// src/lifecycle/removal.rs

//! Removing versions from environments and deleting versions
//!
//! A binding cannot be removed while hosts or activation keys use the
//! content view in that environment. A version cannot be deleted while any
//! environment or composite version still references it.

use crate::db::models::{
    ActivationKey, ContentViewComponent, ContentViewEnvironment, ContentViewVersion, HostContentAssignment,
    Repository,
};
use crate::error::{Error, Result};
use crate::store::ContentStore;
use rusqlite::Connection;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub version_id: i64,
    pub repositories_deleted: usize,
}

/// Unbind the version active for `content_view_id` in `environment_id` and
/// delete its clones for that environment
pub fn remove_from_environment(
    conn: &Connection,
    store: &dyn ContentStore,
    content_view_id: i64,
    environment_id: i64,
) -> Result<RemovalOutcome> {
    let binding = ContentViewEnvironment::find(conn, content_view_id, environment_id)?.ok_or_else(|| {
        Error::NotFound(format!(
            "binding of content view {} in environment {}",
            content_view_id, environment_id
        ))
    })?;

    let hosts = HostContentAssignment::count_for(conn, content_view_id, environment_id)?;
    let keys = ActivationKey::count_for(conn, content_view_id, environment_id)?;
    if hosts > 0 || keys > 0 {
        return Err(Error::InUse(format!(
            "Content view {} in environment {} ({} hosts, {} activation keys)",
            content_view_id, environment_id, hosts, keys
        )));
    }

    let clones = Repository::environment_clones(conn, binding.content_view_version_id, environment_id)?;

    let tx = conn.unchecked_transaction()?;
    ContentViewEnvironment::remove(&tx, content_view_id, environment_id)?;
    for clone in &clones {
        Repository::delete(&tx, clone.require_id()?)?;
    }
    tx.commit()?;
    delete_from_store(store, &clones);

    info!(
        "Removed version {} from environment {}",
        binding.content_view_version_id, environment_id
    );
    Ok(RemovalOutcome {
        version_id: binding.content_view_version_id,
        repositories_deleted: clones.len(),
    })
}

/// Delete an unreferenced version and every clone it owns
pub fn delete_version(conn: &Connection, store: &dyn ContentStore, version_id: i64) -> Result<RemovalOutcome> {
    let version = ContentViewVersion::find_by_id(conn, version_id)?
        .ok_or_else(|| Error::NotFound(format!("content view version {}", version_id)))?;

    let bindings = ContentViewEnvironment::list_for_version(conn, version_id)?;
    if !bindings.is_empty() {
        return Err(Error::InUse(format!(
            "Version {} (bound in {} environments)",
            version.number(),
            bindings.len()
        )));
    }
    let composites = ContentViewVersion::composite_version_ids(conn, version_id)?;
    if !composites.is_empty() {
        return Err(Error::InUse(format!(
            "Version {} (captured by {} composite versions)",
            version.number(),
            composites.len()
        )));
    }
    let pinned = ContentViewComponent::list_for_component(conn, version.content_view_id)?
        .into_iter()
        .any(|c| !c.latest && c.content_view_version_id == Some(version_id));
    if pinned {
        return Err(Error::InUse(format!(
            "Version {} (pinned by a composite content view)",
            version.number()
        )));
    }

    let clones = Repository::list_for_version(conn, version_id)?;

    let tx = conn.unchecked_transaction()?;
    for clone in &clones {
        Repository::delete(&tx, clone.require_id()?)?;
    }
    ContentViewVersion::delete(&tx, version_id)?;
    tx.commit()?;
    delete_from_store(store, &clones);

    info!("Deleted version {} ({} clones)", version.number(), clones.len());
    Ok(RemovalOutcome {
        version_id,
        repositories_deleted: clones.len(),
    })
}

/// Store cleanup after the rows are gone; a leftover store repository is only logged
fn delete_from_store(store: &dyn ContentStore, clones: &[Repository]) {
    for clone in clones {
        if let Err(e) = store.delete_repository(&clone.backend_id) {
            warn!("Failed to delete store repository {}: {}", clone.backend_id, e);
        }
    }
}
