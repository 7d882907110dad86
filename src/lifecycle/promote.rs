// src/lifecycle/promote.rs

//! Promote: bind an existing version to the next environment of its path

use crate::db::models::{ContentView, ContentViewEnvironment, ContentViewVersion, LifecycleEnvironment, Repository};
use crate::error::{Error, Result};
use crate::plan::action::{AttachOutput, CreateReposOutput};
use crate::plan::{ActionKind, ClonedRepository, Inputs, Plan, PlanExecutor, StepId};
use crate::store::CopyOptions;
use rusqlite::Connection;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromoteRequest {
    pub version_id: i64,
    pub environment_id: i64,
    /// Skip the promotion path check
    pub force: bool,
}

impl PromoteRequest {
    pub fn new(version_id: i64, environment_id: i64) -> Self {
        Self {
            version_id,
            environment_id,
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PromotePlan {
    pub plan: Plan,
    pub content_view_id: i64,
    /// Creates the environment clones the version does not have yet
    pub create_repos: Option<StepId>,
    /// Environment clones left by an earlier promotion
    pub reused: Vec<ClonedRepository>,
    pub attach: StepId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoteOutcome {
    pub version_id: i64,
    pub environment_id: i64,
    pub clones: Vec<ClonedRepository>,
    pub replaced_version_id: Option<i64>,
}

/// Check that `version` may be promoted into `env`
pub fn check_promotion_path(
    conn: &Connection,
    view: &ContentView,
    version: &ContentViewVersion,
    env: &LifecycleEnvironment,
    force: bool,
) -> Result<()> {
    let version_id = version.require_id()?;
    let env_id = env
        .id
        .ok_or_else(|| Error::InvalidInput(format!("Environment {} has no id", env.name)))?;

    if env.organization_id != view.organization_id {
        return Err(Error::InvalidInput(format!(
            "Environment {} belongs to a different organization than {}",
            env.name, view.name
        )));
    }
    if env.library {
        return Err(Error::InvalidInput(
            "Versions reach the Library by publishing, not promotion".to_string(),
        ));
    }
    if ContentViewEnvironment::version_in_environment(conn, version_id, env_id)? {
        return Err(Error::InvalidInput(format!(
            "{} {} is already in {}",
            view.name,
            version.number(),
            env.name
        )));
    }
    if force {
        return Ok(());
    }

    let prior = env
        .prior(conn)?
        .ok_or_else(|| Error::NotFound(format!("prior environment of {}", env.name)))?;
    let prior_id = prior
        .id
        .ok_or_else(|| Error::InvalidInput(format!("Environment {} has no id", prior.name)))?;
    if !ContentViewEnvironment::version_in_environment(conn, version_id, prior_id)? {
        return Err(Error::PromotionOrder {
            version: format!("{} {}", view.name, version.number()),
            prior: prior.name,
            target: env.name.clone(),
        });
    }
    Ok(())
}

pub fn plan_promote(conn: &Connection, request: &PromoteRequest) -> Result<PromotePlan> {
    let version = ContentViewVersion::find_by_id(conn, request.version_id)?
        .ok_or_else(|| Error::NotFound(format!("content view version {}", request.version_id)))?;
    let view = ContentView::find_by_id(conn, version.content_view_id)?
        .ok_or_else(|| Error::NotFound(format!("content view {}", version.content_view_id)))?;
    let env = LifecycleEnvironment::find_by_id(conn, request.environment_id)?
        .ok_or_else(|| Error::NotFound(format!("environment {}", request.environment_id)))?;

    check_promotion_path(conn, &view, &version, &env, request.force)?;

    let archives = Repository::archive_clones(conn, request.version_id)?;
    let existing = Repository::environment_clones(conn, request.version_id, request.environment_id)?;

    let mut plan = Plan::new(format!("Promote {} {} to {}", view.name, version.number(), env.name));
    let mut copies = Vec::with_capacity(archives.len());
    let mut reused = Vec::new();
    let mut missing = Vec::new();

    // Clones left by an earlier promotion are refreshed; any the version lacks are created
    for archive in &archives {
        let library = archive.library_instance()?;
        match existing
            .iter()
            .find(|c| c.library_instance().ok() == Some(library))
        {
            Some(clone) => {
                copies.push(plan.add_step(
                    ActionKind::CopyContent,
                    Inputs::new()
                        .literal("source", &archive.backend_id)?
                        .literal("target", &clone.backend_id)?
                        .literal("options", CopyOptions::all_mirrored())?,
                ));
                reused.push(ClonedRepository {
                    source_id: archive.require_id()?,
                    repository_id: clone.require_id()?,
                    backend_id: clone.backend_id.clone(),
                });
            }
            None => missing.push(archive),
        }
    }

    let mut create_repos = None;
    if !missing.is_empty() {
        let source_ids = missing
            .iter()
            .map(|archive| archive.require_id())
            .collect::<Result<Vec<_>>>()?;
        let step = plan.add_step(
            ActionKind::CreateRepos,
            Inputs::new()
                .literal("version_id", request.version_id)?
                .literal("environment_id", Some(request.environment_id))?
                .literal("sources", &source_ids)?,
        );
        for (index, archive) in missing.iter().enumerate() {
            copies.push(plan.add_step(
                ActionKind::CopyContent,
                Inputs::new()
                    .literal("source", &archive.backend_id)?
                    .wire("target", step, &format!("/clones/{}/backend_id", index))
                    .literal("options", CopyOptions::all_mirrored())?,
            ));
        }
        create_repos = Some(step);
    }

    let attach = plan.add_step(
        ActionKind::AttachEnvironment,
        Inputs::new()
            .literal("content_view_id", view.require_id()?)?
            .literal("version_id", request.version_id)?
            .literal("environment_id", request.environment_id)?,
    );
    if let Some(step) = create_repos {
        plan.order_after(attach, step)?;
    }
    for copy in copies {
        plan.order_after(attach, copy)?;
    }

    Ok(PromotePlan {
        plan,
        content_view_id: view.require_id()?,
        create_repos,
        reused,
        attach,
    })
}

/// Build and run a promote plan
pub fn promote(executor: &PlanExecutor<'_>, request: &PromoteRequest) -> Result<PromoteOutcome> {
    let built = plan_promote(executor.conn(), request)?;
    let report = executor.execute(&built.plan)?;

    let mut clones = built.reused;
    if let Some(step) = built.create_repos {
        clones.extend(report.output::<CreateReposOutput>(step)?.clones);
    }
    let attach: AttachOutput = report.output(built.attach)?;

    info!(
        "Promoted version {} to environment {}",
        request.version_id, request.environment_id
    );
    Ok(PromoteOutcome {
        version_id: request.version_id,
        environment_id: request.environment_id,
        clones,
        replaced_version_id: attach.replaced_version_id,
    })
}
