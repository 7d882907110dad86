// src/lifecycle/compatibility.rs

//! Pre-import compatibility check
//!
//! Runs before anything is written. Every problem found is collected so a
//! failed check reports all of them at once.

use crate::db::models::{ContentView, Repository};
use crate::error::{Error, Result};
use crate::store::{file_checksum, listing_path};
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

use super::export::ExportMetadata;

/// An export entry matched to the local library repository it imports into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRepository {
    pub export_name: String,
    pub library: Repository,
}

/// Validate an import of `metadata` from `path` into `view`
pub fn check(
    conn: &Connection,
    view: &ContentView,
    path: &Path,
    metadata: &ExportMetadata,
) -> Result<Vec<MappedRepository>> {
    let mut problems = Vec::new();

    if !view.is_import_only() {
        problems.push(format!("Content view {} is not import-only", view.name));
    }

    let readable = path.is_dir();
    if !readable {
        problems.push(format!("Export path {} is not a readable directory", path.display()));
    }

    let mut mapped = Vec::with_capacity(metadata.repository_mapping.len());
    for (export_name, entry) in &metadata.repository_mapping {
        match Repository::find_library(conn, view.organization_id, &entry.product, &entry.repository)? {
            None => problems.push(format!(
                "Repository {} of product {} does not exist in this organization",
                entry.repository, entry.product
            )),
            Some(library) if library.redhat != entry.redhat => problems.push(format!(
                "Repository {} of product {} differs in origin (redhat = {})",
                entry.repository, entry.product, entry.redhat
            )),
            Some(library) => mapped.push(MappedRepository {
                export_name: export_name.clone(),
                library,
            }),
        }

        if !readable {
            continue;
        }
        let listing = listing_path(path, export_name);
        match file_checksum(&listing) {
            Ok(sum) if sum == entry.checksum => {}
            Ok(sum) => problems.push(format!(
                "Checksum mismatch for {}: expected {}, found {}",
                export_name, entry.checksum, sum
            )),
            Err(_) => problems.push(format!("Listing for {} is missing", export_name)),
        }
    }

    if !problems.is_empty() {
        debug!("Import check found {} problems", problems.len());
        return Err(Error::CompatibilityCheckFailed(problems));
    }
    Ok(mapped)
}
