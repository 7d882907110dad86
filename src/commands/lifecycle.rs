// src/commands/lifecycle.rs
//! Publish, promote, export, import and recovery commands

use super::progress::CliProgress;
use super::{Session, find_env, find_org, find_version, find_view, parse_version};
use anyhow::Result;
use cvflow::{CopyMode, LogProgress, ProgressTracker};
use cvflow::lifecycle::{self, PromoteRequest, PublishRequest};
use cvflow::plan::{ExecutionOptions, PlanExecutor, RecoveryOutcome, recover_all};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Progress bar on a terminal, log lines otherwise
fn with_progress(operation: &str) -> ExecutionOptions {
    let progress: Arc<dyn ProgressTracker> = if std::io::stderr().is_terminal() {
        Arc::new(CliProgress::new(operation))
    } else {
        Arc::new(LogProgress::new(operation))
    };
    ExecutionOptions::new().with_progress(progress)
}

pub struct PublishArgs<'a> {
    pub org: &'a str,
    pub view: &'a str,
    pub version: Option<&'a str>,
    pub env: Option<&'a str>,
    pub incremental: bool,
    pub description: Option<String>,
}

pub fn cmd_publish(session: &Session, args: PublishArgs<'_>) -> Result<()> {
    let conn = session.open()?;
    let store = session.store()?;
    let org = find_org(&conn, args.org)?;
    let view = find_view(&conn, &org, args.view)?;

    let mut request = PublishRequest::new(view.require_id()?);
    if let Some(number) = args.version {
        let (major, minor) = parse_version(number)?;
        request = request.with_version(major, minor);
    }
    if let Some(env) = args.env {
        request = request.to_environment(find_env(&conn, &org, env)?.require_id()?);
    }
    if args.incremental {
        request = request.with_copy_mode(CopyMode::Incremental);
    }
    if let Some(description) = args.description {
        request = request.with_description(description);
    }

    let executor = PlanExecutor::new(&conn, &store, &session.config).with_options(with_progress("Publishing"));
    let outcome = lifecycle::publish(&executor, &request)?;

    println!(
        "Published {} version {}.{} ({} repositories)",
        view.name,
        outcome.major,
        outcome.minor,
        outcome.clones.len()
    );
    if let Some(replaced) = outcome.replaced_version_id {
        info!("Replaced version id {} in environment {}", replaced, outcome.environment_id);
    }
    Ok(())
}

pub fn cmd_promote(session: &Session, org: &str, view: &str, version: &str, env: &str, force: bool) -> Result<()> {
    let conn = session.open()?;
    let store = session.store()?;
    let org = find_org(&conn, org)?;
    let view = find_view(&conn, &org, view)?;
    let version = find_version(&conn, &view, version)?;
    let env = find_env(&conn, &org, env)?;

    let mut request = PromoteRequest::new(version.require_id()?, env.require_id()?);
    if force {
        request = request.forced();
    }

    let executor = PlanExecutor::new(&conn, &store, &session.config).with_options(with_progress("Promoting"));
    let outcome = lifecycle::promote(&executor, &request)?;
    println!(
        "Promoted {} {} to {} ({} repositories)",
        view.name,
        version.number(),
        env.name,
        outcome.clones.len()
    );
    Ok(())
}

pub fn cmd_export(session: &Session, org: &str, view: &str, version: &str, dest: Option<&str>) -> Result<()> {
    let conn = session.open()?;
    let store = session.store()?;
    let org = find_org(&conn, org)?;
    let view = find_view(&conn, &org, view)?;
    let version = find_version(&conn, &view, version)?;

    let dest = match dest {
        Some(dest) => PathBuf::from(dest),
        None => session
            .config
            .export_dir()
            .join(format!("{}-{}", view.label, version.number())),
    };
    let metadata = lifecycle::export_version(&conn, &store, version.require_id()?, &dest)?;
    println!(
        "Exported {} {} to {} ({} repositories)",
        view.name,
        version.number(),
        dest.display(),
        metadata.repository_mapping.len()
    );
    Ok(())
}

pub fn cmd_import(session: &Session, org: &str, view: &str, path: &str) -> Result<()> {
    let conn = session.open()?;
    let store = session.store()?;
    let org = find_org(&conn, org)?;
    let view = find_view(&conn, &org, view)?;

    let executor = PlanExecutor::new(&conn, &store, &session.config).with_options(with_progress("Importing"));
    let outcome = lifecycle::import_from_dir(&executor, view.require_id()?, Path::new(path))?;
    println!(
        "Imported {} version {}.{} ({} repositories)",
        view.name,
        outcome.major,
        outcome.minor,
        outcome.clones.len()
    );
    Ok(())
}

pub fn cmd_recover(session: &Session) -> Result<()> {
    let conn = session.open()?;
    let store = session.store()?;
    let executor = PlanExecutor::new(&conn, &store, &session.config)
        .with_options(ExecutionOptions::new().with_progress(Arc::new(LogProgress::new("Recovery"))));

    let outcomes = recover_all(&executor)?;
    if outcomes.is_empty() {
        println!("No interrupted plans");
        return Ok(());
    }
    for outcome in outcomes {
        match outcome {
            RecoveryOutcome::RolledForward { plan_id } => println!("  {} rolled forward", plan_id),
            RecoveryOutcome::Aborted { plan_id, reason } => println!("  {} aborted: {}", plan_id, reason),
            RecoveryOutcome::Failed { plan_id, error } => println!("  {} FAILED: {}", plan_id, error),
            RecoveryOutcome::Corrupted { plan_id, error } => {
                println!("  {} left in place (unreadable journal): {}", plan_id, error)
            }
        }
    }
    Ok(())
}
