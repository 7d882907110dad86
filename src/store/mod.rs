// src/store/mod.rs

//! Repository content store
//!
//! The content store holds the actual units behind every repository. The
//! engine only ever addresses it through [`ContentStore`]: create and delete
//! repositories, copy units between them, drive importers, and write export
//! listings. Store operations are safe to call from several plan steps at once.

mod local;
mod memory;
mod units;

pub use local::LocalContentStore;
pub use memory::MemoryContentStore;
pub use units::{
    CopyOptions, CopyStatus, Unit, UnitFilter, UnitListing, UnitType, apply_filters, copy_units, file_checksum,
    read_listing, write_listing,
};

use crate::db::models::ContentType;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// What the store needs to know to create a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySpec {
    pub name: String,
    pub content_type: ContentType,
}

/// Handle to an importer created over an export directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImporterHandle(pub String);

impl std::fmt::Display for ImporterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Importer state: where the export lives and which repository each
/// exported listing goes into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterSpec {
    pub path: PathBuf,
    /// Export name -> target repository id
    pub mapping: BTreeMap<String, String>,
}

/// Listing file for an exported repository inside an export directory
pub fn listing_path(export_dir: &Path, export_name: &str) -> PathBuf {
    export_dir.join("repos").join(format!("{}.json", export_name))
}

/// Remote content storage consumed by the plan engine
pub trait ContentStore: Send + Sync {
    /// Create an empty repository and return its id
    fn create_repository(&self, spec: &RepositorySpec) -> Result<String>;

    /// Delete a repository and its units
    fn delete_repository(&self, id: &str) -> Result<()>;

    /// Add units directly (library synchronization stand-in)
    fn add_units(&self, id: &str, units: &[Unit]) -> Result<()>;

    /// Units currently in a repository
    fn list_units(&self, id: &str) -> Result<Vec<Unit>>;

    /// Copy units from `source` into `target`
    fn copy_content(&self, source: &str, target: &str, options: &CopyOptions) -> Result<CopyStatus>;

    /// Prepare an import of the export at `path` into the mapped repositories
    fn create_importer(&self, mapping: &BTreeMap<String, String>, path: &Path) -> Result<ImporterHandle>;

    /// Run the import, returning the units added per target repository
    fn import(&self, handle: &ImporterHandle) -> Result<BTreeMap<String, Vec<Unit>>>;

    /// Remove an importer; unknown handles are ignored
    fn destroy_importer(&self, handle: &ImporterHandle) -> Result<()>;

    /// Write the repository's unit listing to `dest`, returning its sha256
    fn export_repository(&self, id: &str, dest: &Path) -> Result<String>;
}

/// Read every mapped listing of an importer
pub(crate) fn load_import(spec: &ImporterSpec) -> Result<BTreeMap<String, Vec<Unit>>> {
    let mut by_target = BTreeMap::new();
    for (export_name, target) in &spec.mapping {
        let units = read_listing(&listing_path(&spec.path, export_name))?;
        by_target.insert(target.clone(), units);
    }
    Ok(by_target)
}
