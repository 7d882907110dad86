// src/commands/host.rs
//! Host registration, assignment and fact import commands

use super::{Session, find_env, find_host, find_org, find_view, read_json_file};
use anyhow::{Result, anyhow};
use cvflow::db::models::{
    ContentView, Host, HostContentAssignment, HostModuleStream, InstalledDeb, InstalledPackage,
    LifecycleEnvironment, Organization, OverrideOwner,
};
use cvflow::host::{
    self, ContentAssignmentRequest, DebEntry, HostContentState, HostReport, ModuleStreamEntry, OverrideRequest,
    PackageEntry, ReconcileSummary, StatusCache, TraceEntry,
};
use rusqlite::Connection;

fn print_summary(what: &str, host: &str, summary: &ReconcileSummary) {
    println!(
        "{}: {} added, {} removed, {} updated, {} unchanged for {}",
        what, summary.added, summary.removed, summary.updated, summary.unchanged, host
    );
}

fn host_org(conn: &Connection, host: &Host) -> Result<Organization> {
    Organization::find_by_id(conn, host.organization_id)?
        .ok_or_else(|| anyhow!("Organization {} not found", host.organization_id))
}

pub fn cmd_host_register(session: &Session, org: &str, name: &str) -> Result<()> {
    let conn = session.open()?;
    let org = find_org(&conn, org)?;
    let mut host = Host::new(org.require_id()?, name.to_string());
    host.insert(&conn)?;
    println!("Registered host {} in {}", host.name, org.name);
    Ok(())
}

pub fn cmd_host_assign(session: &Session, name: &str, view: Option<&str>, env: Option<&str>) -> Result<()> {
    let conn = session.open()?;
    let host = find_host(&conn, name)?;
    let org = host_org(&conn, &host)?;

    let view_id = view
        .map(|label| find_view(&conn, &org, label).and_then(|v| Ok(v.require_id()?)))
        .transpose()?;
    let env_id = env
        .map(|label| find_env(&conn, &org, label).and_then(|e| Ok(e.require_id()?)))
        .transpose()?;

    let request = ContentAssignmentRequest::new(view_id, env_id).inheriting();
    match HostContentState::default().apply(&conn, &host, request)? {
        Some(assignment) => {
            let view = ContentView::find_by_id(&conn, assignment.content_view_id)?;
            let env = LifecycleEnvironment::find_by_id(&conn, assignment.environment_id)?;
            println!(
                "Assigned {} to {} in {}",
                host.name,
                view.map(|v| v.name).unwrap_or_default(),
                env.map(|e| e.name).unwrap_or_default()
            );
        }
        None => println!("Nothing to assign for {}", host.name),
    }
    Ok(())
}

pub fn cmd_host_import_packages(session: &Session, name: &str, file: &str) -> Result<()> {
    let conn = session.open()?;
    let host = find_host(&conn, name)?;
    let entries: Vec<PackageEntry> = read_json_file(file)?;
    let summary = host::import_package_profile(&conn, &host, &entries, &session.config.reconcile)?;
    print_summary("Packages", &host.name, &summary);
    Ok(())
}

pub fn cmd_host_import_modules(session: &Session, name: &str, file: &str) -> Result<()> {
    let conn = session.open()?;
    let host = find_host(&conn, name)?;
    let entries: Vec<ModuleStreamEntry> = read_json_file(file)?;
    let summary = host::import_module_streams(&conn, &host, &entries, &session.config.reconcile)?;
    print_summary("Module streams", &host.name, &summary);
    Ok(())
}

pub fn cmd_host_import_traces(session: &Session, name: &str, file: &str) -> Result<()> {
    let conn = session.open()?;
    let host = find_host(&conn, name)?;
    let entries: Vec<TraceEntry> = read_json_file(file)?;
    let stored = host::import_tracer_profile(&conn, &host, &entries, &session.config.reconcile)?;
    println!("Traces: {} stored for {}", stored, host.name);
    Ok(())
}

pub fn cmd_host_import_debs(session: &Session, name: &str, file: &str) -> Result<()> {
    let conn = session.open()?;
    let host = find_host(&conn, name)?;
    let entries: Vec<DebEntry> = read_json_file(file)?;
    let summary = host::import_deb_profile(&conn, &host, &entries, &session.config.reconcile)?;
    print_summary("Debs", &host.name, &summary);
    Ok(())
}

pub fn cmd_host_reconcile(session: &Session, file: &str) -> Result<()> {
    let reports: Vec<HostReport> = read_json_file(file)?;
    let outcomes = host::reconcile_batch(&session.config, &reports);

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(_) => println!("  [ok] {}", outcome.host),
            Err(e) => {
                failed += 1;
                println!("  [FAILED] {}: {}", outcome.host, e);
            }
        }
    }
    println!("Reconciled {} hosts, {} failed", outcomes.len(), failed);
    if failed > 0 {
        return Err(anyhow!("{} of {} hosts failed to reconcile", failed, outcomes.len()));
    }
    Ok(())
}

/// Parse `LABEL=VALUE`
fn parse_override(spec: &str) -> Result<OverrideRequest> {
    let (label, value) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("Override '{}' must look like LABEL=enabled|disabled|default", spec))?;
    Ok(OverrideRequest::new(label, value.parse()?))
}

pub fn cmd_host_override(session: &Session, name: &str, overrides: &[String], prune_invalid: bool) -> Result<()> {
    let conn = session.open()?;
    let host = find_host(&conn, name)?;
    let requests = overrides
        .iter()
        .map(|spec| parse_override(spec))
        .collect::<Result<Vec<_>>>()?;

    let summary = host::update_content_overrides(
        &conn,
        OverrideOwner::Host(host.require_id()?),
        &requests,
        prune_invalid,
    )?;
    println!(
        "Overrides for {}: {} set, {} removed, {} pruned",
        host.name, summary.set, summary.removed, summary.pruned
    );
    Ok(())
}

pub fn cmd_host_show(session: &Session, name: &str) -> Result<()> {
    let conn = session.open()?;
    let host = find_host(&conn, name)?;
    let host_id = host.require_id()?;

    println!("Host: {}", host.name);
    match HostContentAssignment::find_for_host(&conn, host_id)? {
        Some(assignment) => {
            let view = ContentView::find_by_id(&conn, assignment.content_view_id)?;
            let env = LifecycleEnvironment::find_by_id(&conn, assignment.environment_id)?;
            println!(
                "  Content view: {} in {}",
                view.map(|v| v.name).unwrap_or_default(),
                env.map(|e| e.name).unwrap_or_default()
            );
        }
        None => println!("  Content view: (unassigned)"),
    }
    println!("  Packages: {}", InstalledPackage::list_for_host(&conn, host_id)?.len());
    println!("  Debs: {}", InstalledDeb::list_for_host(&conn, host_id)?.len());
    println!("  Module streams: {}", HostModuleStream::list_for_host(&conn, host_id)?.len());

    let mut cache = StatusCache::new();
    println!("  Trace status: {}", cache.trace_status(&conn, host_id)?);
    Ok(())
}
