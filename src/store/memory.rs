// src/store/memory.rs

//! In-process content store
//!
//! Holds repositories in memory behind a mutex. Used by tests and by callers
//! that only need the engine's bookkeeping. Copies from chosen source
//! repositories can be made to fail to exercise failure paths.

use super::{
    ContentStore, CopyOptions, CopyStatus, ImporterHandle, ImporterSpec, RepositorySpec, Unit, copy_units,
    load_import, write_listing,
};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Default)]
struct MemoryState {
    repos: HashMap<String, BTreeSet<Unit>>,
    importers: HashMap<String, ImporterSpec>,
    next_id: u64,
    failing_sources: HashSet<String>,
    copies: usize,
}

#[derive(Default)]
pub struct MemoryContentStore {
    state: Mutex<MemoryState>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }

    /// Make every copy reading from `source` fail
    pub fn fail_copies_from(&self, source: &str) -> Result<()> {
        self.state()?.failing_sources.insert(source.to_string());
        Ok(())
    }

    pub fn repository_count(&self) -> Result<usize> {
        Ok(self.state()?.repos.len())
    }

    pub fn importer_count(&self) -> Result<usize> {
        Ok(self.state()?.importers.len())
    }

    pub fn copy_count(&self) -> Result<usize> {
        Ok(self.state()?.copies)
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.state()?.repos.contains_key(id))
    }
}

impl ContentStore for MemoryContentStore {
    fn create_repository(&self, spec: &RepositorySpec) -> Result<String> {
        let mut state = self.state()?;
        state.next_id += 1;
        let id = format!("mem-{}-{}", state.next_id, spec.name);
        state.repos.insert(id.clone(), BTreeSet::new());
        debug!("Created repository {}", id);
        Ok(id)
    }

    fn delete_repository(&self, id: &str) -> Result<()> {
        self.state()?.repos.remove(id);
        Ok(())
    }

    fn add_units(&self, id: &str, units: &[Unit]) -> Result<()> {
        let mut state = self.state()?;
        let repo = state
            .repos
            .get_mut(id)
            .ok_or_else(|| Error::Store(format!("Unknown repository {}", id)))?;
        repo.extend(units.iter().cloned());
        Ok(())
    }

    fn list_units(&self, id: &str) -> Result<Vec<Unit>> {
        let state = self.state()?;
        let repo = state
            .repos
            .get(id)
            .ok_or_else(|| Error::Store(format!("Unknown repository {}", id)))?;
        Ok(repo.iter().cloned().collect())
    }

    fn copy_content(&self, source: &str, target: &str, options: &CopyOptions) -> Result<CopyStatus> {
        let mut state = self.state()?;
        let failure = |reason: &str| Error::CopyFailure {
            source_repo: source.to_string(),
            target_repo: target.to_string(),
            reason: reason.to_string(),
        };

        if state.failing_sources.contains(source) {
            return Err(failure("source repository unavailable"));
        }
        let source_units = state
            .repos
            .get(source)
            .cloned()
            .ok_or_else(|| failure("unknown source repository"))?;
        let target_units = state
            .repos
            .get_mut(target)
            .ok_or_else(|| failure("unknown target repository"))?;

        let status = copy_units(&source_units, target_units, options)?;
        state.copies += 1;
        Ok(status)
    }

    fn create_importer(&self, mapping: &BTreeMap<String, String>, path: &Path) -> Result<ImporterHandle> {
        let mut state = self.state()?;
        for target in mapping.values() {
            if !state.repos.contains_key(target) {
                return Err(Error::Store(format!("Unknown import target {}", target)));
            }
        }
        state.next_id += 1;
        let handle = format!("importer-{}", state.next_id);
        state.importers.insert(
            handle.clone(),
            ImporterSpec {
                path: path.to_path_buf(),
                mapping: mapping.clone(),
            },
        );
        Ok(ImporterHandle(handle))
    }

    fn import(&self, handle: &ImporterHandle) -> Result<BTreeMap<String, Vec<Unit>>> {
        let spec = self
            .state()?
            .importers
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| Error::Store(format!("Unknown importer {}", handle)))?;

        // Read listings without holding the lock
        let imported = load_import(&spec)?;

        let mut state = self.state()?;
        for (target, units) in &imported {
            let repo = state
                .repos
                .get_mut(target)
                .ok_or_else(|| Error::Store(format!("Unknown import target {}", target)))?;
            repo.extend(units.iter().cloned());
        }
        Ok(imported)
    }

    fn destroy_importer(&self, handle: &ImporterHandle) -> Result<()> {
        self.state()?.importers.remove(&handle.0);
        Ok(())
    }

    fn export_repository(&self, id: &str, dest: &Path) -> Result<String> {
        let units = self
            .state()?
            .repos
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Store(format!("Unknown repository {}", id)))?;
        write_listing(dest, &units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ContentType;

    fn spec(name: &str) -> RepositorySpec {
        RepositorySpec {
            name: name.to_string(),
            content_type: ContentType::Yum,
        }
    }

    #[test]
    fn test_copy_between_repositories() {
        let store = MemoryContentStore::new();
        let source = store.create_repository(&spec("src")).unwrap();
        let target = store.create_repository(&spec("dst")).unwrap();
        store
            .add_units(&source, &[Unit::rpm("bash", "5.1-1", "x86_64")])
            .unwrap();

        let status = store.copy_content(&source, &target, &CopyOptions::all()).unwrap();
        assert_eq!(status.copied, 1);
        assert_eq!(store.list_units(&target).unwrap().len(), 1);
    }

    #[test]
    fn test_injected_copy_failure() {
        let store = MemoryContentStore::new();
        let source = store.create_repository(&spec("src")).unwrap();
        let target = store.create_repository(&spec("dst")).unwrap();
        store.fail_copies_from(&source).unwrap();

        let err = store
            .copy_content(&source, &target, &CopyOptions::all())
            .unwrap_err();
        assert!(matches!(err, Error::CopyFailure { .. }));
        assert_eq!(store.copy_count().unwrap(), 0);
    }

    #[test]
    fn test_destroy_unknown_importer_is_ok() {
        let store = MemoryContentStore::new();
        store
            .destroy_importer(&ImporterHandle("nope".to_string()))
            .unwrap();
    }
}
