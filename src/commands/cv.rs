// src/commands/cv.rs
//! Content view definition and version commands

use super::{Session, find_env, find_org, find_version, find_view};
use anyhow::{Result, anyhow};
use cvflow::db::models::{
    ContentView, ContentViewComponent, ContentViewEnvironment, ContentViewFilter, ContentViewFlags,
    ContentViewVersion, LifecycleEnvironment, Repository,
};
use cvflow::lifecycle;
use cvflow::store::UnitType;
use std::collections::BTreeMap;

pub struct CreateViewArgs<'a> {
    pub org: &'a str,
    pub name: &'a str,
    pub flags: ContentViewFlags,
    pub description: Option<String>,
}

pub fn cmd_cv_create(session: &Session, args: CreateViewArgs<'_>) -> Result<()> {
    let conn = session.open()?;
    let org = find_org(&conn, args.org)?;

    let mut view = ContentView::new(org.require_id()?, args.name.to_string(), args.flags);
    view.description = args.description;
    if view.flags != args.flags {
        println!("Note: conflicting flags were adjusted");
    }
    view.insert(&conn)?;

    println!("Created content view {} (label: {})", view.name, view.label);
    let flags = view.flags;
    println!(
        "  composite: {}, import-only: {}, solve dependencies: {}, auto-publish: {}",
        flags.composite, flags.import_only, flags.solve_dependencies, flags.auto_publish
    );
    Ok(())
}

pub fn cmd_cv_add_repo(session: &Session, org: &str, view: &str, repo: &str) -> Result<()> {
    let conn = session.open()?;
    let org = find_org(&conn, org)?;
    let view = find_view(&conn, &org, view)?;
    let repo = Repository::list_library(&conn, org.require_id()?)?
        .into_iter()
        .find(|r| r.label == repo)
        .ok_or_else(|| anyhow!("Repository '{}' not found in {}", repo, org.name))?;

    view.add_repository(&conn, repo.require_id()?)?;
    println!("Added {} to {}", repo.label, view.label);
    Ok(())
}

pub fn cmd_cv_add_filter(
    session: &Session,
    org: &str,
    view: &str,
    name: &str,
    pattern: &str,
    unit_type: &str,
    exclude: bool,
) -> Result<()> {
    let conn = session.open()?;
    let org = find_org(&conn, org)?;
    let view = find_view(&conn, &org, view)?;
    let unit_type: UnitType = unit_type
        .parse()
        .map_err(|_| anyhow!("Unknown unit type '{}'", unit_type))?;

    let mut filter = ContentViewFilter::new(
        view.require_id()?,
        name.to_string(),
        !exclude,
        unit_type,
        pattern.to_string(),
    );
    filter.insert(&conn)?;
    let kind = if exclude { "exclude" } else { "include" };
    println!("Added {} filter {} ({} {}) to {}", kind, name, unit_type, pattern, view.label);
    Ok(())
}

pub fn cmd_cv_add_component(
    session: &Session,
    org: &str,
    composite: &str,
    component: &str,
    version: Option<&str>,
) -> Result<()> {
    let conn = session.open()?;
    let org = find_org(&conn, org)?;
    let composite = find_view(&conn, &org, composite)?;
    let component = find_view(&conn, &org, component)?;

    let mut membership = match version {
        Some(number) => {
            let pinned = find_version(&conn, &component, number)?;
            ContentViewComponent::pinned(composite.require_id()?, component.require_id()?, pinned.require_id()?)
        }
        None => ContentViewComponent::latest(composite.require_id()?, component.require_id()?),
    };
    membership.insert(&conn)?;

    match version {
        Some(number) => println!("Added {} {} to {}", component.label, number, composite.label),
        None => println!("Added {} (latest) to {}", component.label, composite.label),
    }
    Ok(())
}

pub fn cmd_cv_list(session: &Session, org: &str) -> Result<()> {
    let conn = session.open()?;
    let org = find_org(&conn, org)?;
    let views = ContentView::list_for_organization(&conn, org.require_id()?)?;
    if views.is_empty() {
        println!("No content views in {}", org.name);
        return Ok(());
    }
    for view in views {
        let kind = if view.flags.import_only {
            "import-only"
        } else if view.is_composite() {
            "composite"
        } else {
            "standard"
        };
        let versions = ContentViewVersion::count_for_view(&conn, view.require_id()?)?;
        println!("  {} ({}, {}, {} versions)", view.name, view.label, kind, versions);
    }
    Ok(())
}

pub fn cmd_cv_versions(session: &Session, org: &str, view: &str) -> Result<()> {
    let conn = session.open()?;
    let org = find_org(&conn, org)?;
    let view = find_view(&conn, &org, view)?;
    let view_id = view.require_id()?;

    let mut bound: BTreeMap<i64, Vec<String>> = BTreeMap::new();
    for binding in ContentViewEnvironment::list_for_view(&conn, view_id)? {
        let env = LifecycleEnvironment::find_by_id(&conn, binding.environment_id)?
            .map(|e| e.name)
            .unwrap_or_else(|| binding.environment_id.to_string());
        bound.entry(binding.content_view_version_id).or_default().push(env);
    }

    println!("Versions of {}:", view.name);
    for version in ContentViewVersion::list_for_view(&conn, view_id)? {
        let envs = version
            .id
            .and_then(|id| bound.get(&id))
            .map(|names| names.join(", "))
            .unwrap_or_else(|| "-".to_string());
        let imported = if version.imported { " [imported]" } else { "" };
        println!("  {}{}  environments: {}", version.number(), imported, envs);
    }
    Ok(())
}

pub fn cmd_cv_remove_from_env(session: &Session, org: &str, view: &str, env: &str) -> Result<()> {
    let conn = session.open()?;
    let store = session.store()?;
    let org = find_org(&conn, org)?;
    let view = find_view(&conn, &org, view)?;
    let env = find_env(&conn, &org, env)?;

    let outcome = lifecycle::remove_from_environment(&conn, &store, view.require_id()?, env.require_id()?)?;
    println!(
        "Removed {} from {} ({} repositories deleted)",
        view.label, env.name, outcome.repositories_deleted
    );
    Ok(())
}

pub fn cmd_cv_delete_version(session: &Session, org: &str, view: &str, version: &str) -> Result<()> {
    let conn = session.open()?;
    let store = session.store()?;
    let org = find_org(&conn, org)?;
    let view = find_view(&conn, &org, view)?;
    let version = find_version(&conn, &view, version)?;

    let outcome = lifecycle::delete_version(&conn, &store, version.require_id()?)?;
    println!(
        "Deleted {} {} ({} repositories deleted)",
        view.label,
        version.number(),
        outcome.repositories_deleted
    );
    Ok(())
}
