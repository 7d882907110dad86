// src/commands/mod.rs
//! Command handlers for the cvflow CLI

mod cv;
mod env;
mod host;
mod lifecycle;
mod org;
pub mod progress;
mod repo;

pub use cv::{
    CreateViewArgs, cmd_cv_add_component, cmd_cv_add_filter, cmd_cv_add_repo, cmd_cv_create, cmd_cv_delete_version, cmd_cv_list,
    cmd_cv_remove_from_env, cmd_cv_versions,
};
pub use env::{cmd_env_create, cmd_env_list};
pub use host::{
    cmd_host_assign, cmd_host_import_debs, cmd_host_import_modules, cmd_host_import_packages,
    cmd_host_import_traces, cmd_host_override, cmd_host_reconcile, cmd_host_register, cmd_host_show,
};
pub use lifecycle::{PublishArgs, cmd_export, cmd_import, cmd_promote, cmd_publish, cmd_recover};
pub use org::{cmd_init, cmd_org_create, cmd_org_list};
pub use repo::{cmd_repo_create, cmd_repo_list, cmd_repo_sync};

use anyhow::{Context, Result, anyhow};
use cvflow::EngineConfig;
use cvflow::db;
use cvflow::db::models::{ContentView, ContentViewVersion, Host, LifecycleEnvironment, Organization};
use cvflow::store::LocalContentStore;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;

/// Configuration shared by every handler of one invocation
pub struct Session {
    pub config: EngineConfig,
}

impl Session {
    pub fn new(config_path: &str, db_path: Option<String>) -> Result<Self> {
        let mut config = EngineConfig::load(Path::new(config_path))
            .with_context(|| format!("Failed to load configuration {}", config_path))?;
        if let Some(db_path) = db_path {
            config.db_path = db_path;
        }
        debug!("Using database {}", config.db_path);
        Ok(Self { config })
    }

    pub fn open(&self) -> Result<Connection> {
        db::open(&self.config.db_path).with_context(|| format!("Failed to open database {}", self.config.db_path))
    }

    pub fn store(&self) -> Result<LocalContentStore> {
        let root = self.config.store_dir();
        LocalContentStore::open(&root).with_context(|| format!("Failed to open content store {}", root.display()))
    }
}

pub(crate) fn find_org(conn: &Connection, label: &str) -> Result<Organization> {
    Organization::find_by_label(conn, label)?.ok_or_else(|| anyhow!("Organization '{}' not found", label))
}

pub(crate) fn find_env(conn: &Connection, org: &Organization, label: &str) -> Result<LifecycleEnvironment> {
    let org_id = org.require_id()?;
    LifecycleEnvironment::find_by_label(conn, org_id, label)?
        .ok_or_else(|| anyhow!("Environment '{}' not found in {}", label, org.name))
}

pub(crate) fn find_view(conn: &Connection, org: &Organization, label: &str) -> Result<ContentView> {
    let org_id = org.require_id()?;
    ContentView::find_by_label(conn, org_id, label)?
        .ok_or_else(|| anyhow!("Content view '{}' not found in {}", label, org.name))
}

pub(crate) fn find_version(conn: &Connection, view: &ContentView, number: &str) -> Result<ContentViewVersion> {
    let (major, minor) = parse_version(number)?;
    ContentViewVersion::find_by_number(conn, view.require_id()?, major, minor)?
        .ok_or_else(|| anyhow!("Version {} of {} not found", number, view.name))
}

pub(crate) fn find_host(conn: &Connection, name: &str) -> Result<Host> {
    Host::find_by_name(conn, name)?.ok_or_else(|| anyhow!("Host '{}' not found", name))
}

/// Parse "MAJOR.MINOR"; a bare "MAJOR" means minor 0
pub(crate) fn parse_version(number: &str) -> Result<(i64, i64)> {
    let (major, minor) = number.split_once('.').unwrap_or((number, "0"));
    let major = major
        .parse::<i64>()
        .with_context(|| format!("Invalid version number '{}'", number))?;
    let minor = minor
        .parse::<i64>()
        .with_context(|| format!("Invalid version number '{}'", number))?;
    Ok((major, minor))
}

pub(crate) fn read_json_file<T: DeserializeOwned>(path: &str) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("2.1").unwrap(), (2, 1));
        assert_eq!(parse_version("10").unwrap(), (10, 0));
        assert!(parse_version("1.x").is_err());
        assert!(parse_version("").is_err());
    }
}
