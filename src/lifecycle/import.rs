// src/lifecycle/import.rs

//! Import: reproduce an exported version in an import-only content view
//!
//! The version numbers in the export metadata are kept as they are. The
//! plan mirrors publish (create version, create clones, attach) with the copy
//! replaced by an importer pass, and the imported units are also copied into
//! the permanent library repositories. The importer is a finalize step, so it
//! is destroyed whether the import succeeds or fails.

use crate::db::models::{ContentView, LifecycleEnvironment};
use crate::error::{Error, Result};
use crate::plan::action::{CreateReposOutput, CreateVersionOutput};
use crate::plan::{ActionKind, ClonedRepository, Inputs, Plan, PlanExecutor, StepId};
use crate::store::CopyOptions;
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

use super::compatibility::{self, MappedRepository};
use super::export::ExportMetadata;
use super::version;

#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub plan: Plan,
    pub major: i64,
    pub minor: i64,
    pub create_version: StepId,
    pub create_repos: StepId,
    pub create_importer: StepId,
    pub destroy_importer: StepId,
    pub attach: StepId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub version_id: i64,
    pub major: i64,
    pub minor: i64,
    pub clones: Vec<ClonedRepository>,
}

/// Check the import and build its plan; nothing is written
pub fn plan_import(
    conn: &Connection,
    content_view_id: i64,
    path: &Path,
    metadata: &ExportMetadata,
) -> Result<ImportPlan> {
    let view = ContentView::find_by_id(conn, content_view_id)?
        .ok_or_else(|| Error::NotFound(format!("content view {}", content_view_id)))?;

    let major = metadata.content_view_version.major;
    let minor = metadata.content_view_version.minor;
    version::ensure_available(conn, &view, major, minor)?;

    let mapped = compatibility::check(conn, &view, path, metadata)?;

    let library = LifecycleEnvironment::find_library(conn, view.organization_id)?;
    let library_id = library
        .id
        .ok_or_else(|| Error::InvalidInput("Library has no id".to_string()))?;

    build(&view, path, major, minor, &mapped, library_id)
}

fn build(
    view: &ContentView,
    path: &Path,
    major: i64,
    minor: i64,
    mapped: &[MappedRepository],
    library_id: i64,
) -> Result<ImportPlan> {
    let view_id = view.require_id()?;
    let mut plan = Plan::new(format!("Import {} {}.{}", view.name, major, minor));

    let create_version = plan.add_step(
        ActionKind::CreateVersion,
        Inputs::new()
            .literal("content_view_id", view_id)?
            .literal("major", major)?
            .literal("minor", minor)?
            .literal("description", format!("Imported from {}", path.display()))?
            .literal("imported", true)?,
    );

    let sources = mapped
        .iter()
        .map(|m| m.library.require_id())
        .collect::<Result<Vec<_>>>()?;
    let create_repos = plan.add_step(
        ActionKind::CreateRepos,
        Inputs::new()
            .wire("version_id", create_version, "/version_id")
            .literal("environment_id", Option::<i64>::None)?
            .literal("sources", &sources)?,
    );

    let export_names: Vec<&str> = mapped.iter().map(|m| m.export_name.as_str()).collect();
    let create_importer = plan.add_step(
        ActionKind::CreateImporter,
        Inputs::new()
            .literal("path", path)?
            .literal("export_names", &export_names)?
            .wire("clones", create_repos, "/clones"),
    );
    let import = plan.add_step(
        ActionKind::ImportContent,
        Inputs::new().wire("handle", create_importer, "/handle"),
    );

    let attach = plan.add_step(
        ActionKind::AttachEnvironment,
        Inputs::new()
            .literal("content_view_id", view_id)?
            .wire("version_id", create_version, "/version_id")
            .literal("environment_id", library_id)?,
    );
    plan.order_after(attach, import)?;

    for (index, repo) in mapped.iter().enumerate() {
        let copy = plan.add_step(
            ActionKind::CopyContent,
            Inputs::new()
                .wire("source", create_repos, &format!("/clones/{}/backend_id", index))
                .literal("target", &repo.library.backend_id)?
                .literal("options", CopyOptions::all())?,
        );
        plan.order_after(copy, import)?;
        plan.order_after(attach, copy)?;
    }

    let destroy_importer = plan.add_finalize_step(
        ActionKind::DestroyImporter,
        Inputs::new().wire("handle", create_importer, "/handle"),
    );

    Ok(ImportPlan {
        plan,
        major,
        minor,
        create_version,
        create_repos,
        create_importer,
        destroy_importer,
        attach,
    })
}

/// Check, plan and run an import
pub fn import(
    executor: &PlanExecutor<'_>,
    content_view_id: i64,
    path: &Path,
    metadata: &ExportMetadata,
) -> Result<ImportOutcome> {
    let built = plan_import(executor.conn(), content_view_id, path, metadata)?;
    let report = executor.execute(&built.plan)?;

    let version: CreateVersionOutput = report.output(built.create_version)?;
    let repos: CreateReposOutput = report.output(built.create_repos)?;

    info!(
        "Imported version {}.{} from {}",
        built.major,
        built.minor,
        path.display()
    );
    Ok(ImportOutcome {
        version_id: version.version_id,
        major: built.major,
        minor: built.minor,
        clones: repos.clones,
    })
}

/// Import reading the metadata from the export directory
pub fn import_from_dir(executor: &PlanExecutor<'_>, content_view_id: i64, path: &Path) -> Result<ImportOutcome> {
    let metadata = ExportMetadata::read(path).map_err(|e| {
        Error::CompatibilityCheckFailed(vec![format!(
            "Cannot read export metadata in {}: {}",
            path.display(),
            e
        )])
    })?;
    import(executor, content_view_id, path, &metadata)
}
