// src/lifecycle/export.rs

//! Export of a content view version for import elsewhere
//!
//! Layout of an export directory:
//!
//! ```text
//! metadata.json              version numbers and repository mapping
//! repos/<export name>.json   unit listing of each archive clone
//! ```

use crate::db::models::{ContentView, ContentViewVersion, Repository, labelize};
use crate::error::{Error, Result};
use crate::store::{ContentStore, listing_path};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedVersion {
    pub major: i64,
    pub minor: i64,
}

/// Where an exported repository came from, and its listing checksum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedRepository {
    pub repository: String,
    pub product: String,
    #[serde(default)]
    pub redhat: bool,
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Label of the exported content view
    pub content_view: String,
    pub content_view_version: ExportedVersion,
    /// Export name -> source repository
    pub repository_mapping: BTreeMap<String, ExportedRepository>,
}

impl ExportMetadata {
    pub fn read(export_dir: &Path) -> Result<Self> {
        let bytes = fs::read(export_dir.join(METADATA_FILE))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn write(&self, export_dir: &Path) -> Result<()> {
        fs::create_dir_all(export_dir)?;
        fs::write(export_dir.join(METADATA_FILE), serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

/// Name a repository is exported under
pub fn export_name(repo: &Repository) -> String {
    format!("{}-{}", labelize(&repo.product), repo.label)
}

/// Write `version_id`'s archive clones and metadata into `dest`
pub fn export_version(
    conn: &Connection,
    store: &dyn ContentStore,
    version_id: i64,
    dest: &Path,
) -> Result<ExportMetadata> {
    let version = ContentViewVersion::find_by_id(conn, version_id)?
        .ok_or_else(|| Error::NotFound(format!("content view version {}", version_id)))?;
    let view = ContentView::find_by_id(conn, version.content_view_id)?
        .ok_or_else(|| Error::NotFound(format!("content view {}", version.content_view_id)))?;

    if dest.join(METADATA_FILE).exists() {
        return Err(Error::InvalidInput(format!(
            "{} already contains an export",
            dest.display()
        )));
    }

    let mut repository_mapping = BTreeMap::new();
    for clone in Repository::archive_clones(conn, version_id)? {
        let name = export_name(&clone);
        let checksum = store.export_repository(&clone.backend_id, &listing_path(dest, &name))?;
        repository_mapping.insert(
            name,
            ExportedRepository {
                repository: clone.name.clone(),
                product: clone.product.clone(),
                redhat: clone.redhat,
                checksum,
            },
        );
    }

    let metadata = ExportMetadata {
        content_view: view.label.clone(),
        content_view_version: ExportedVersion {
            major: version.major,
            minor: version.minor,
        },
        repository_mapping,
    };
    metadata.write(dest)?;

    info!(
        "Exported {} {} ({} repositories) to {}",
        view.name,
        version.number(),
        metadata.repository_mapping.len(),
        dest.display()
    );
    Ok(metadata)
}
