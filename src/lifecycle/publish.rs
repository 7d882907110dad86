// src/lifecycle/publish.rs

//! Publish: cut a new version of a content view
//!
//! The plan creates the version row, one empty archive clone per source
//! repository, fills every clone with a content copy (these run in parallel),
//! and only then attaches the version to the target environment. Composite
//! views that follow this view's latest version and auto-publish are
//! republished once the attach committed.

use crate::config::{CopyMode, EngineConfig};
use crate::db::models::{
    ContentView, ContentViewComponent, ContentViewFilter, ContentViewVersion, LifecycleEnvironment, Repository,
};
use crate::error::{Error, Result};
use crate::plan::action::{AttachOutput, CreateReposOutput, CreateVersionOutput};
use crate::plan::{ActionKind, ClonedRepository, Inputs, Plan, PlanExecutor, StepId};
use crate::store::{CopyOptions, UnitFilter};
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use super::version::{self, VersionRequest};

#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    pub content_view_id: i64,
    pub version: VersionRequest,
    pub description: Option<String>,
    /// Environment to attach to; the organization's Library when `None`
    pub environment_id: Option<i64>,
    /// Copy mode; the configured default when `None`
    pub copy_mode: Option<CopyMode>,
}

impl PublishRequest {
    pub fn new(content_view_id: i64) -> Self {
        Self {
            content_view_id,
            ..Self::default()
        }
    }

    pub fn with_version(mut self, major: i64, minor: i64) -> Self {
        self.version = VersionRequest::Explicit { major, minor };
        self
    }

    pub fn to_environment(mut self, environment_id: i64) -> Self {
        self.environment_id = Some(environment_id);
        self
    }

    pub fn with_copy_mode(mut self, mode: CopyMode) -> Self {
        self.copy_mode = Some(mode);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A built publish plan and the steps callers read results from
#[derive(Debug, Clone)]
pub struct PublishPlan {
    pub plan: Plan,
    pub major: i64,
    pub minor: i64,
    pub environment_id: i64,
    pub create_version: StepId,
    pub create_repos: StepId,
    pub attach: StepId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub version_id: i64,
    pub major: i64,
    pub minor: i64,
    pub environment_id: i64,
    pub clones: Vec<ClonedRepository>,
    pub replaced_version_id: Option<i64>,
}

/// Repositories a version of `view` is cut from, and the component versions
/// a composite captures
pub fn resolve_sources(conn: &Connection, view: &ContentView) -> Result<(Vec<Repository>, Vec<i64>)> {
    let view_id = view.require_id()?;

    if !view.is_composite() {
        let repos = view
            .repository_ids(conn)?
            .into_iter()
            .map(|id| {
                Repository::find_by_id(conn, id)?.ok_or_else(|| Error::NotFound(format!("repository {}", id)))
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok((repos, Vec::new()));
    }

    let mut repos = Vec::new();
    let mut component_versions = Vec::new();
    let mut seen_library = BTreeSet::new();

    for component in ContentViewComponent::list_for_composite(conn, view_id)? {
        let version = component_version(conn, &component)?;
        let version_id = version.require_id()?;
        component_versions.push(version_id);

        for clone in Repository::archive_clones(conn, version_id)? {
            if !seen_library.insert(clone.library_instance()?) {
                return Err(Error::InvalidInput(format!(
                    "Repository {} is provided by more than one component of {}",
                    clone.name, view.name
                )));
            }
            repos.push(clone);
        }
    }

    Ok((repos, component_versions))
}

fn component_version(conn: &Connection, component: &ContentViewComponent) -> Result<ContentViewVersion> {
    let found = match component.content_view_version_id {
        Some(id) if !component.latest => ContentViewVersion::find_by_id(conn, id)?,
        _ => ContentViewVersion::latest(conn, component.component_content_view_id)?,
    };
    found.ok_or_else(|| {
        Error::NotFound(format!(
            "published version of component content view {}",
            component.component_content_view_id
        ))
    })
}

/// Target environment of a publish, checked against the view's organization
fn target_environment(conn: &Connection, view: &ContentView, environment_id: Option<i64>) -> Result<i64> {
    let env = match environment_id {
        Some(id) => LifecycleEnvironment::find_by_id(conn, id)?
            .ok_or_else(|| Error::NotFound(format!("environment {}", id)))?,
        None => LifecycleEnvironment::find_library(conn, view.organization_id)?,
    };
    if env.organization_id != view.organization_id {
        return Err(Error::InvalidInput(format!(
            "Environment {} belongs to a different organization than {}",
            env.name, view.name
        )));
    }
    env.id
        .ok_or_else(|| Error::InvalidInput(format!("Environment {} has no id", env.name)))
}

/// Build the publish plan without executing anything
pub fn plan_publish(conn: &Connection, config: &EngineConfig, request: &PublishRequest) -> Result<PublishPlan> {
    let view = ContentView::find_by_id(conn, request.content_view_id)?
        .ok_or_else(|| Error::NotFound(format!("content view {}", request.content_view_id)))?;
    if view.is_import_only() {
        return Err(Error::InvalidInput(format!(
            "Content view {} is import-only and cannot be published",
            view.name
        )));
    }

    let environment_id = target_environment(conn, &view, request.environment_id)?;
    let (major, minor) = version::resolve(conn, &view, request.version)?;
    let (sources, component_versions) = resolve_sources(conn, &view)?;

    let filters: Vec<UnitFilter> = ContentViewFilter::list_for_view(conn, view.require_id()?)?
        .iter()
        .map(ContentViewFilter::to_unit_filter)
        .collect();

    // Prior clones by library instance, for incremental seeding
    let mode = request.copy_mode.unwrap_or(config.default_copy_mode);
    let prior_clones: BTreeMap<i64, String> = match (mode, ContentViewVersion::latest(conn, view.require_id()?)?) {
        (CopyMode::Incremental, Some(prior)) => Repository::archive_clones(conn, prior.require_id()?)?
            .into_iter()
            .map(|r| Ok((r.library_instance()?, r.backend_id)))
            .collect::<Result<_>>()?,
        _ => BTreeMap::new(),
    };

    let mut plan = Plan::new(format!("Publish {} {}.{}", view.name, major, minor));

    let create_version = plan.add_step(
        ActionKind::CreateVersion,
        Inputs::new()
            .literal("content_view_id", view.require_id()?)?
            .literal("major", major)?
            .literal("minor", minor)?
            .literal("description", &request.description)?
            .literal("imported", false)?
            .literal("component_version_ids", &component_versions)?,
    );

    let source_ids = sources
        .iter()
        .map(Repository::require_id)
        .collect::<Result<Vec<_>>>()?;
    let create_repos = plan.add_step(
        ActionKind::CreateRepos,
        Inputs::new()
            .wire("version_id", create_version, "/version_id")
            .literal("environment_id", Option::<i64>::None)?
            .literal("sources", &source_ids)?,
    );

    let mut copies = Vec::with_capacity(sources.len());
    for (index, source) in sources.iter().enumerate() {
        let target = format!("/clones/{}/backend_id", index);
        let prior = prior_clones.get(&source.library_instance()?);

        let options = match prior {
            Some(_) => CopyOptions::filtered(filters.clone(), true),
            None => CopyOptions::filtered(filters.clone(), false),
        };
        let copy = plan.add_step(
            ActionKind::CopyContent,
            Inputs::new()
                .literal("source", &source.backend_id)?
                .wire("target", create_repos, &target)
                .literal("options", options)?,
        );

        if let Some(prior_backend) = prior {
            let seed = plan.add_step(
                ActionKind::CopyContent,
                Inputs::new()
                    .literal("source", prior_backend)?
                    .wire("target", create_repos, &target)
                    .literal("options", CopyOptions::all())?,
            );
            plan.order_after(copy, seed)?;
        }
        copies.push(copy);
    }

    let attach = plan.add_step(
        ActionKind::AttachEnvironment,
        Inputs::new()
            .literal("content_view_id", view.require_id()?)?
            .wire("version_id", create_version, "/version_id")
            .literal("environment_id", environment_id)?,
    );
    plan.order_after(attach, create_repos)?;
    for copy in copies {
        plan.order_after(attach, copy)?;
    }

    if has_auto_publish_dependents(conn, &view)? {
        let auto = plan.add_step(
            ActionKind::AutoPublishComposites,
            Inputs::new().literal("content_view_id", view.require_id()?)?,
        );
        plan.order_after(auto, attach)?;
    }

    Ok(PublishPlan {
        plan,
        major,
        minor,
        environment_id,
        create_version,
        create_repos,
        attach,
    })
}

/// Composites that follow this view's latest version and auto-publish
fn auto_publish_dependents(conn: &Connection, view: &ContentView) -> Result<Vec<ContentView>> {
    if view.is_composite() {
        return Ok(Vec::new());
    }
    let mut seen = BTreeSet::new();
    let mut composites = Vec::new();
    for component in view.composites_including(conn)? {
        if !component.latest || !seen.insert(component.composite_content_view_id) {
            continue;
        }
        if let Some(composite) = ContentView::find_by_id(conn, component.composite_content_view_id)?
            && composite.flags.auto_publish
        {
            composites.push(composite);
        }
    }
    Ok(composites)
}

fn has_auto_publish_dependents(conn: &Connection, view: &ContentView) -> Result<bool> {
    Ok(!auto_publish_dependents(conn, view)?.is_empty())
}

/// Build and run a publish plan
pub fn publish(executor: &PlanExecutor<'_>, request: &PublishRequest) -> Result<PublishOutcome> {
    let built = plan_publish(executor.conn(), executor.config(), request)?;
    let report = executor.execute(&built.plan)?;

    let version: CreateVersionOutput = report.output(built.create_version)?;
    let repos: CreateReposOutput = report.output(built.create_repos)?;
    let attach: AttachOutput = report.output(built.attach)?;

    info!(
        "Published version {}.{} (id {}) with {} repositories",
        built.major,
        built.minor,
        version.version_id,
        repos.clones.len()
    );
    Ok(PublishOutcome {
        version_id: version.version_id,
        major: built.major,
        minor: built.minor,
        environment_id: built.environment_id,
        clones: repos.clones,
        replaced_version_id: attach.replaced_version_id,
    })
}

/// Republish auto-publishing composites that include `content_view_id`.
///
/// A failing composite is logged and skipped; the others still publish.
pub fn auto_publish_composites(executor: &PlanExecutor<'_>, content_view_id: i64) -> Result<Vec<i64>> {
    let view = ContentView::find_by_id(executor.conn(), content_view_id)?
        .ok_or_else(|| Error::NotFound(format!("content view {}", content_view_id)))?;

    let mut published = Vec::new();
    for composite in auto_publish_dependents(executor.conn(), &view)? {
        let composite_id = composite.require_id()?;
        match publish(executor, &PublishRequest::new(composite_id)) {
            Ok(outcome) => {
                info!(
                    "Auto-published composite {} as {}.{}",
                    composite.name, outcome.major, outcome.minor
                );
                published.push(outcome.version_id);
            }
            Err(e) => warn!("Auto-publish of composite {} failed: {}", composite.name, e),
        }
    }
    Ok(published)
}
