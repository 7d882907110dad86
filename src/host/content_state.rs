// src/host/content_state.rs

//! Host content view/environment assignment
//!
//! Every change to a host's assignment runs through a `HostContentState`
//! pipeline before it is saved. Stages run in order and may fill in or
//! reject the request.

use crate::db::models::{ContentView, ContentViewEnvironment, Host, HostContentAssignment, LifecycleEnvironment};
use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// A requested assignment; either side may be missing before inheritance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentAssignmentRequest {
    pub content_view_id: Option<i64>,
    pub environment_id: Option<i64>,
    /// Fill missing sides from the host's current assignment
    pub inherit: bool,
}

impl ContentAssignmentRequest {
    pub fn new(content_view_id: Option<i64>, environment_id: Option<i64>) -> Self {
        Self {
            content_view_id,
            environment_id,
            inherit: false,
        }
    }

    pub fn inheriting(mut self) -> Self {
        self.inherit = true;
        self
    }
}

pub type Stage = fn(&Connection, &Host, &mut ContentAssignmentRequest) -> Result<()>;

/// Ordered pre-save stages for host assignments
pub struct HostContentState {
    stages: Vec<(&'static str, Stage)>,
}

impl Default for HostContentState {
    fn default() -> Self {
        Self {
            stages: vec![
                ("inherit", inherit_missing),
                ("pair", require_pair),
                ("organization", same_organization),
                ("published", published_in_environment),
            ],
        }
    }
}

impl HostContentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage after the built-in ones
    pub fn with_stage(mut self, name: &'static str, stage: Stage) -> Self {
        self.stages.push((name, stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|(name, _)| *name).collect()
    }

    /// Run every stage and save the result
    ///
    /// Returns `None` when the request names neither a content view nor an
    /// environment; nothing is written then.
    pub fn apply(
        &self,
        conn: &Connection,
        host: &Host,
        mut request: ContentAssignmentRequest,
    ) -> Result<Option<HostContentAssignment>> {
        for (name, stage) in &self.stages {
            debug!("Host {}: assignment stage {}", host.name, name);
            stage(conn, host, &mut request)?;
        }

        let (Some(content_view_id), Some(environment_id)) = (request.content_view_id, request.environment_id) else {
            return Ok(None);
        };

        let assignment = HostContentAssignment {
            host_id: host.require_id()?,
            content_view_id,
            environment_id,
        };
        assignment.save(conn)?;
        info!(
            "Host {} assigned to content view {} in environment {}",
            host.name, content_view_id, environment_id
        );
        Ok(Some(assignment))
    }
}

fn inherit_missing(conn: &Connection, host: &Host, request: &mut ContentAssignmentRequest) -> Result<()> {
    if !request.inherit {
        return Ok(());
    }
    if let Some(current) = HostContentAssignment::find_for_host(conn, host.require_id()?)? {
        request.content_view_id.get_or_insert(current.content_view_id);
        request.environment_id.get_or_insert(current.environment_id);
    }
    Ok(())
}

fn require_pair(_conn: &Connection, _host: &Host, request: &mut ContentAssignmentRequest) -> Result<()> {
    if request.content_view_id.is_some() != request.environment_id.is_some() {
        return Err(Error::InvalidInput(
            "Content view and lifecycle environment must be provided together".to_string(),
        ));
    }
    Ok(())
}

fn same_organization(conn: &Connection, host: &Host, request: &mut ContentAssignmentRequest) -> Result<()> {
    if let Some(id) = request.content_view_id {
        let view = ContentView::find_by_id(conn, id)?.ok_or_else(|| Error::NotFound(format!("content view {}", id)))?;
        if view.organization_id != host.organization_id {
            return Err(Error::InvalidInput(format!(
                "Content view {} is not in the organization of host {}",
                view.name, host.name
            )));
        }
    }
    if let Some(id) = request.environment_id {
        let env = LifecycleEnvironment::find_by_id(conn, id)?
            .ok_or_else(|| Error::NotFound(format!("lifecycle environment {}", id)))?;
        if env.organization_id != host.organization_id {
            return Err(Error::InvalidInput(format!(
                "Lifecycle environment {} is not in the organization of host {}",
                env.name, host.name
            )));
        }
    }
    Ok(())
}

fn published_in_environment(conn: &Connection, _host: &Host, request: &mut ContentAssignmentRequest) -> Result<()> {
    if let (Some(view), Some(env)) = (request.content_view_id, request.environment_id) {
        if ContentViewEnvironment::find(conn, view, env)?.is_none() {
            return Err(Error::InvalidInput(format!(
                "Content view {} has no version in environment {}",
                view, env
            )));
        }
    }
    Ok(())
}

/// Assign a host to exactly one content view environment
pub fn assign_single_environment(
    conn: &Connection,
    host: &Host,
    content_view_id: i64,
    environment_id: i64,
) -> Result<HostContentAssignment> {
    HostContentState::default()
        .apply(
            conn,
            host,
            ContentAssignmentRequest::new(Some(content_view_id), Some(environment_id)),
        )?
        .ok_or_else(|| Error::InvalidInput(format!("No assignment produced for host {}", host.name)))
}
