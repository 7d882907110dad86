// src/plan/action.rs

//! Step actions and their typed inputs/outputs
//!
//! Inputs and outputs travel through the plan as JSON so they can be wired
//! between steps and written to the journal; each action deserializes its
//! own typed view. Remote actions only touch the content store and may run
//! concurrently; local actions touch the database and run on the executor
//! thread.

use crate::db::models::{ContentViewEnvironment, ContentViewVersion, Repository};
use crate::error::{Error, Result};
use crate::store::{ContentStore, CopyOptions, CopyStatus, ImporterHandle, RepositorySpec};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use strum_macros::Display;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateVersion,
    CreateRepos,
    CopyContent,
    CreateImporter,
    ImportContent,
    DestroyImporter,
    AttachEnvironment,
    AutoPublishComposites,
}

impl ActionKind {
    /// Remote steps only talk to the content store
    pub fn is_remote(self) -> bool {
        matches!(
            self,
            Self::CopyContent | Self::CreateImporter | Self::ImportContent | Self::DestroyImporter
        )
    }

    pub fn is_attach(self) -> bool {
        self == Self::AttachEnvironment
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVersionInput {
    pub content_view_id: i64,
    pub major: i64,
    pub minor: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub imported: bool,
    /// Component versions captured by a composite version
    #[serde(default)]
    pub component_version_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVersionOutput {
    pub version_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReposInput {
    pub version_id: i64,
    #[serde(default)]
    pub environment_id: Option<i64>,
    /// Repositories to clone (library repositories or earlier clones)
    pub sources: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClonedRepository {
    pub source_id: i64,
    pub repository_id: i64,
    pub backend_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReposOutput {
    pub clones: Vec<ClonedRepository>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyContentInput {
    pub source: String,
    pub target: String,
    pub options: CopyOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateImporterInput {
    pub path: PathBuf,
    /// Export names, index-aligned with `clones`
    pub export_names: Vec<String>,
    pub clones: Vec<ClonedRepository>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterOutput {
    pub handle: ImporterHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportContentOutput {
    /// Units imported per target repository
    pub units: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachInput {
    pub content_view_id: i64,
    pub version_id: i64,
    pub environment_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachOutput {
    pub binding_id: i64,
    pub replaced_version_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoPublishInput {
    pub content_view_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoPublishOutput {
    pub published: Vec<i64>,
}

pub(crate) fn parse<T: DeserializeOwned>(input: &Value) -> Result<T> {
    Ok(serde_json::from_value(input.clone())?)
}

pub(crate) fn output<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Execute a remote step against the content store
pub fn run_remote(kind: ActionKind, store: &dyn ContentStore, input: &Value) -> Result<Value> {
    match kind {
        ActionKind::CopyContent => {
            let input: CopyContentInput = parse(input)?;
            let status: CopyStatus = store.copy_content(&input.source, &input.target, &input.options)?;
            debug!(
                "Copied {} -> {}: {} added, {} removed",
                input.source, input.target, status.copied, status.removed
            );
            output(&status)
        }
        ActionKind::CreateImporter => {
            let input: CreateImporterInput = parse(input)?;
            if input.export_names.len() != input.clones.len() {
                return Err(Error::InvalidInput(format!(
                    "{} export names for {} clones",
                    input.export_names.len(),
                    input.clones.len()
                )));
            }
            let mapping: BTreeMap<String, String> = input
                .export_names
                .into_iter()
                .zip(input.clones.into_iter().map(|c| c.backend_id))
                .collect();
            let handle = store.create_importer(&mapping, &input.path)?;
            info!("Created importer {} for {}", handle, input.path.display());
            output(&ImporterOutput { handle })
        }
        ActionKind::ImportContent => {
            let input: ImporterOutput = parse(input)?;
            let imported = store.import(&input.handle)?;
            let units = imported
                .into_iter()
                .map(|(target, units)| (target, units.len()))
                .collect();
            output(&ImportContentOutput { units })
        }
        ActionKind::DestroyImporter => {
            let input: ImporterOutput = parse(input)?;
            store.destroy_importer(&input.handle)?;
            info!("Destroyed importer {}", input.handle);
            Ok(Value::Object(Default::default()))
        }
        other => Err(Error::InvalidInput(format!("{} is not a remote action", other))),
    }
}

/// Create the version row (and composite component links)
pub fn create_version(conn: &Connection, input: &Value) -> Result<Value> {
    let input: CreateVersionInput = parse(input)?;

    if let Some(existing) =
        ContentViewVersion::find_by_number(conn, input.content_view_id, input.major, input.minor)?
    {
        return Err(version_conflict(conn, &existing));
    }

    let tx = conn.unchecked_transaction()?;
    let mut version = ContentViewVersion::new(input.content_view_id, input.major, input.minor);
    version.description = input.description;
    version.imported = input.imported;
    let version_id = match version.insert(&tx) {
        Ok(id) => id,
        Err(e) if e.is_constraint_violation() => return Err(version_conflict(&tx, &version)),
        Err(e) => return Err(e),
    };
    for component in &input.component_version_ids {
        ContentViewVersion::add_component_version(&tx, version_id, *component)?;
    }
    tx.commit()?;

    info!(
        "Created version {} of content view {}",
        version.number(),
        input.content_view_id
    );
    output(&CreateVersionOutput { version_id })
}

fn version_conflict(conn: &Connection, version: &ContentViewVersion) -> Error {
    let content_view = crate::db::models::ContentView::find_by_id(conn, version.content_view_id)
        .ok()
        .flatten()
        .map(|cv| cv.name)
        .unwrap_or_else(|| version.content_view_id.to_string());
    Error::VersionConflict {
        content_view,
        major: version.major,
        minor: version.minor,
    }
}

/// Create one empty clone per source repository
pub fn create_repos(conn: &Connection, store: &dyn ContentStore, input: &Value) -> Result<Value> {
    let input: CreateReposInput = parse(input)?;
    let mut clones = Vec::with_capacity(input.sources.len());

    for source_id in input.sources {
        let source = Repository::find_by_id(conn, source_id)?
            .ok_or_else(|| Error::NotFound(format!("repository {}", source_id)))?;
        let backend_id = store.create_repository(&RepositorySpec {
            name: format!("{}-v{}", source.label, input.version_id),
            content_type: source.content_type,
        })?;

        let mut clone = Repository::clone_of(&source, input.version_id, input.environment_id, backend_id.clone())?;
        if let Err(e) = clone.insert(conn) {
            if let Err(cleanup) = store.delete_repository(&backend_id) {
                warn!("Failed to remove store repository {}: {}", backend_id, cleanup);
            }
            return Err(e);
        }

        clones.push(ClonedRepository {
            source_id,
            repository_id: clone.require_id()?,
            backend_id,
        });
    }

    output(&CreateReposOutput { clones })
}

/// Bind a version to an environment, replacing the current binding
pub fn attach_environment(conn: &Connection, input: &Value) -> Result<Value> {
    let input: AttachInput = parse(input)?;

    let tx = conn.unchecked_transaction()?;
    let (binding_id, replaced_version_id) =
        ContentViewEnvironment::attach(&tx, input.content_view_id, input.version_id, input.environment_id)?;
    tx.commit()?;

    info!(
        "Attached version {} to environment {}",
        input.version_id, input.environment_id
    );
    output(&AttachOutput {
        binding_id,
        replaced_version_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryContentStore, Unit};
    use serde_json::json;

    #[test]
    fn test_remote_classification() {
        assert!(ActionKind::CopyContent.is_remote());
        assert!(ActionKind::DestroyImporter.is_remote());
        assert!(!ActionKind::CreateRepos.is_remote());
        assert!(!ActionKind::AttachEnvironment.is_remote());
        assert!(ActionKind::AttachEnvironment.is_attach());
    }

    #[test]
    fn test_copy_content_step() {
        let store = MemoryContentStore::new();
        let spec = RepositorySpec {
            name: "r".to_string(),
            content_type: crate::db::models::ContentType::Yum,
        };
        let source = store.create_repository(&spec).unwrap();
        let target = store.create_repository(&spec).unwrap();
        store
            .add_units(&source, &[Unit::rpm("bash", "5.1-1", "x86_64")])
            .unwrap();

        let input = json!({
            "source": source,
            "target": target,
            "options": {"copy_all": true, "filters": [], "mirror": false},
        });
        let out = run_remote(ActionKind::CopyContent, &store, &input).unwrap();
        assert_eq!(out["copied"], 1);
    }

    #[test]
    fn test_local_action_rejected_by_remote_runner() {
        let store = MemoryContentStore::new();
        assert!(run_remote(ActionKind::CreateVersion, &store, &json!({})).is_err());
    }
}
