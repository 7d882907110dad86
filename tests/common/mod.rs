// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use cvflow::EngineConfig;
use cvflow::db;
use cvflow::db::models::{ContentType, ContentView, ContentViewFlags, Host, Repository};
use cvflow::lifecycle::{create_environment, create_organization};
use cvflow::plan::PlanExecutor;
use cvflow::store::{ContentStore, MemoryContentStore, RepositorySpec, Unit};
use rusqlite::Connection;
use std::path::Path;
use tempfile::TempDir;

/// A migrated database in a temp dir, an in-memory content store, and an
/// organization with its Library environment.
///
/// Keep the fixture alive for the whole test; dropping it removes the
/// database and journals.
pub struct Fixture {
    pub temp: TempDir,
    pub config: EngineConfig,
    pub conn: Connection,
    pub store: MemoryContentStore,
    pub org_id: i64,
    pub library_id: i64,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("cvflow.db").to_str().unwrap().to_string();

        db::init(&db_path).unwrap();
        let conn = db::open(&db_path).unwrap();
        let config = EngineConfig::for_db(db_path.as_str());

        let (org, library) = create_organization(&conn, "Acme Corp").unwrap();

        Self {
            temp,
            config,
            conn,
            store: MemoryContentStore::new(),
            org_id: org.id.unwrap(),
            library_id: library.id.unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn executor(&self) -> PlanExecutor<'_> {
        PlanExecutor::new(&self.conn, &self.store, &self.config)
    }

    /// Add an environment after `prior_id` and return its id
    pub fn environment(&self, name: &str, prior_id: i64) -> i64 {
        create_environment(&self.conn, self.org_id, name, prior_id)
            .unwrap()
            .id
            .unwrap()
    }

    /// A synced library repository holding `units`
    pub fn library_repo(&self, product: &str, name: &str, units: &[Unit]) -> Repository {
        let backend_id = self
            .store
            .create_repository(&RepositorySpec {
                name: name.to_string(),
                content_type: ContentType::Yum,
            })
            .unwrap();
        self.store.add_units(&backend_id, units).unwrap();

        let mut repo = Repository::library(
            self.org_id,
            product.to_string(),
            name.to_string(),
            ContentType::Yum,
            backend_id,
        );
        repo.insert(&self.conn).unwrap();
        repo
    }

    /// A standard content view over `repos`
    pub fn view(&self, name: &str, repos: &[&Repository]) -> ContentView {
        let view = self.view_with_flags(name, ContentViewFlags::default());
        for repo in repos {
            view.add_repository(&self.conn, repo.id.unwrap()).unwrap();
        }
        view
    }

    pub fn view_with_flags(&self, name: &str, flags: ContentViewFlags) -> ContentView {
        let mut view = ContentView::new(self.org_id, name.to_string(), flags);
        view.insert(&self.conn).unwrap();
        view
    }

    pub fn host(&self, name: &str) -> Host {
        let mut host = Host::new(self.org_id, name.to_string());
        host.insert(&self.conn).unwrap();
        host
    }

    pub fn count(&self, table: &str) -> i64 {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    /// Sorted unit names held by a store repository
    pub fn unit_names(&self, backend_id: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .store
            .list_units(backend_id)
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        names.sort();
        names
    }
}

/// x86_64 RPMs at version 1.0, one per name
pub fn rpms(names: &[&str]) -> Vec<Unit> {
    names.iter().map(|name| Unit::rpm(name, "1.0", "x86_64")).collect()
}
