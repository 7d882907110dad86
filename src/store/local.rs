// src/store/local.rs

//! Directory-backed content store
//!
//! Layout under the store root:
//!
//! ```text
//! repos/<id>.json        repository metadata and units
//! importers/<id>.json    importer specs
//! ```
//!
//! Files are replaced atomically (write to a temp file, then rename) so a
//! crash never leaves a half-written repository behind.

use super::{
    ContentStore, CopyOptions, CopyStatus, ImporterHandle, ImporterSpec, RepositorySpec, Unit, copy_units,
    load_import, write_listing,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct RepositoryFile {
    spec: RepositorySpec,
    units: BTreeSet<Unit>,
}

pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("repos"))?;
        fs::create_dir_all(root.join("importers"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repo_path(&self, id: &str) -> PathBuf {
        self.root.join("repos").join(format!("{}.json", id))
    }

    fn importer_path(&self, handle: &str) -> PathBuf {
        self.root.join("importers").join(format!("{}.json", handle))
    }

    fn load_repo(&self, id: &str) -> Result<RepositoryFile> {
        read_json(&self.repo_path(id)).map_err(|e| match e {
            Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                Error::Store(format!("Unknown repository {}", id))
            }
            other => other,
        })
    }

    fn save_repo(&self, id: &str, repo: &RepositoryFile) -> Result<()> {
        write_json_atomic(&self.repo_path(id), repo)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
    fs::write(&tmp, serde_json::to_vec(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl ContentStore for LocalContentStore {
    fn create_repository(&self, spec: &RepositorySpec) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.save_repo(
            &id,
            &RepositoryFile {
                spec: spec.clone(),
                units: BTreeSet::new(),
            },
        )?;
        debug!("Created repository {} ({})", id, spec.name);
        Ok(id)
    }

    fn delete_repository(&self, id: &str) -> Result<()> {
        let path = self.repo_path(id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn add_units(&self, id: &str, units: &[Unit]) -> Result<()> {
        let mut repo = self.load_repo(id)?;
        repo.units.extend(units.iter().cloned());
        self.save_repo(id, &repo)
    }

    fn list_units(&self, id: &str) -> Result<Vec<Unit>> {
        Ok(self.load_repo(id)?.units.into_iter().collect())
    }

    fn copy_content(&self, source: &str, target: &str, options: &CopyOptions) -> Result<CopyStatus> {
        let failure = |reason: String| Error::CopyFailure {
            source_repo: source.to_string(),
            target_repo: target.to_string(),
            reason,
        };

        let source_repo = self.load_repo(source).map_err(|e| failure(e.to_string()))?;
        let mut target_repo = self.load_repo(target).map_err(|e| failure(e.to_string()))?;

        let status = copy_units(&source_repo.units, &mut target_repo.units, options)?;
        self.save_repo(target, &target_repo)
            .map_err(|e| failure(e.to_string()))?;
        Ok(status)
    }

    fn create_importer(&self, mapping: &BTreeMap<String, String>, path: &Path) -> Result<ImporterHandle> {
        for target in mapping.values() {
            if !self.repo_path(target).exists() {
                return Err(Error::Store(format!("Unknown import target {}", target)));
            }
        }
        let handle = format!("importer-{}", Uuid::new_v4());
        write_json_atomic(
            &self.importer_path(&handle),
            &ImporterSpec {
                path: path.to_path_buf(),
                mapping: mapping.clone(),
            },
        )?;
        Ok(ImporterHandle(handle))
    }

    fn import(&self, handle: &ImporterHandle) -> Result<BTreeMap<String, Vec<Unit>>> {
        let spec: ImporterSpec = read_json(&self.importer_path(&handle.0))
            .map_err(|e| Error::Store(format!("Unknown importer {}: {}", handle, e)))?;
        let imported = load_import(&spec)?;
        for (target, units) in &imported {
            self.add_units(target, units)?;
        }
        Ok(imported)
    }

    fn destroy_importer(&self, handle: &ImporterHandle) -> Result<()> {
        let path = self.importer_path(&handle.0);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn export_repository(&self, id: &str, dest: &Path) -> Result<String> {
        let repo = self.load_repo(id)?;
        write_listing(dest, &repo.units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ContentType;
    use tempfile::TempDir;

    #[test]
    fn test_repository_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let id = {
            let store = LocalContentStore::open(temp.path()).unwrap();
            let id = store
                .create_repository(&RepositorySpec {
                    name: "baseos".to_string(),
                    content_type: ContentType::Yum,
                })
                .unwrap();
            store
                .add_units(&id, &[Unit::rpm("bash", "5.1-1", "x86_64")])
                .unwrap();
            id
        };

        let store = LocalContentStore::open(temp.path()).unwrap();
        assert_eq!(store.list_units(&id).unwrap().len(), 1);

        store.delete_repository(&id).unwrap();
        assert!(matches!(store.list_units(&id), Err(Error::Store(_))));
    }

    #[test]
    fn test_copy_from_unknown_source_is_copy_failure() {
        let temp = TempDir::new().unwrap();
        let store = LocalContentStore::open(temp.path()).unwrap();
        let target = store
            .create_repository(&RepositorySpec {
                name: "t".to_string(),
                content_type: ContentType::Yum,
            })
            .unwrap();

        let err = store
            .copy_content("missing", &target, &CopyOptions::all())
            .unwrap_err();
        assert!(matches!(err, Error::CopyFailure { .. }));
    }
}
