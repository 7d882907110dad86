// src/commands/repo.rs
//! Library repository commands

use super::{Session, find_org};
use anyhow::{Result, anyhow};
use cvflow::db::models::{ContentType, Organization, Repository};
use cvflow::store::{ContentStore, RepositorySpec, read_listing};
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

fn find_repo(conn: &Connection, org: &Organization, label: &str) -> Result<Repository> {
    Repository::list_library(conn, org.require_id()?)?
        .into_iter()
        .find(|r| r.label == label)
        .ok_or_else(|| anyhow!("Repository '{}' not found in {}", label, org.name))
}

pub fn cmd_repo_create(
    session: &Session,
    org: &str,
    product: &str,
    name: &str,
    content_type: &str,
    redhat: bool,
) -> Result<()> {
    let conn = session.open()?;
    let store = session.store()?;
    let org = find_org(&conn, org)?;
    let content_type: ContentType = content_type
        .parse()
        .map_err(|_| anyhow!("Unknown content type '{}' (expected yum, deb or file)", content_type))?;

    let backend_id = store.create_repository(&RepositorySpec {
        name: name.to_string(),
        content_type,
    })?;
    let mut repo = Repository::library(
        org.require_id()?,
        product.to_string(),
        name.to_string(),
        content_type,
        backend_id,
    );
    repo.redhat = redhat;
    if let Err(e) = repo.insert(&conn) {
        store.delete_repository(&repo.backend_id)?;
        return Err(e.into());
    }

    println!("Created repository {} (label: {})", repo.name, repo.label);
    println!("  Product: {}", repo.product);
    println!("  Store id: {}", repo.backend_id);
    Ok(())
}

pub fn cmd_repo_sync(session: &Session, org: &str, repo: &str, listing: &str) -> Result<()> {
    let conn = session.open()?;
    let store = session.store()?;
    let org = find_org(&conn, org)?;
    let repo = find_repo(&conn, &org, repo)?;

    let units = read_listing(Path::new(listing))?;
    info!("Loading {} units into {}", units.len(), repo.label);
    store.add_units(&repo.backend_id, &units)?;
    println!(
        "Synced {} units into {} ({} total)",
        units.len(),
        repo.label,
        store.list_units(&repo.backend_id)?.len()
    );
    Ok(())
}

pub fn cmd_repo_list(session: &Session, org: &str) -> Result<()> {
    let conn = session.open()?;
    let org = find_org(&conn, org)?;
    let repos = Repository::list_library(&conn, org.require_id()?)?;
    if repos.is_empty() {
        println!("No repositories in {}", org.name);
        return Ok(());
    }
    println!("Repositories in {}:", org.name);
    for repo in repos {
        let vendor = if repo.redhat { " [redhat]" } else { "" };
        println!(
            "  {} / {} ({}, {}){}",
            repo.product, repo.name, repo.label, repo.content_type, vendor
        );
    }
    Ok(())
}
