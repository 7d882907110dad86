// src/host/overrides.rs

//! Content override updates for hosts and activation keys

use crate::db::models::{
    ActivationKey, ContentOverride, ContentViewEnvironment, HostContentAssignment, OverrideOwner, OverrideState,
    Repository,
};
use crate::error::{Error, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Requested value for a content label; `Default` removes the override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideValue {
    Enabled,
    Disabled,
    Default,
}

impl FromStr for OverrideValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "enabled" | "true" | "1" => Ok(Self::Enabled),
            "disabled" | "false" | "0" => Ok(Self::Disabled),
            "default" => Ok(Self::Default),
            other => Err(Error::InvalidInput(format!(
                "Override value must be enabled, disabled or default, got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OverrideValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub content_label: String,
    pub value: OverrideValue,
}

impl OverrideRequest {
    pub fn new(content_label: &str, value: OverrideValue) -> Self {
        Self {
            content_label: content_label.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverrideSummary {
    pub set: usize,
    pub removed: usize,
    pub pruned: usize,
}

/// Content labels the owner can currently consume: the labels of the
/// repositories in the version bound for its content view and environment
pub fn available_content_labels(conn: &Connection, owner: OverrideOwner) -> Result<BTreeSet<String>> {
    let assignment = match owner {
        OverrideOwner::Host(host_id) => {
            HostContentAssignment::find_for_host(conn, host_id)?.map(|a| (a.content_view_id, a.environment_id))
        }
        OverrideOwner::ActivationKey(key_id) => {
            let key = ActivationKey::find_by_id(conn, key_id)?
                .ok_or_else(|| Error::NotFound(format!("activation key {}", key_id)))?;
            key.content_view_id.zip(key.environment_id)
        }
    };

    let Some((content_view_id, environment_id)) = assignment else {
        return Ok(BTreeSet::new());
    };
    let Some(binding) = ContentViewEnvironment::find(conn, content_view_id, environment_id)? else {
        return Ok(BTreeSet::new());
    };

    Ok(Repository::list_for_version(conn, binding.content_view_version_id)?
        .into_iter()
        .map(|r| r.label)
        .collect())
}

/// Apply `overrides` in order, then optionally prune overrides for content
/// the owner can no longer see
///
/// Writes are idempotent per (owner, label): repeating a request leaves the
/// same single row.
pub fn update_content_overrides(
    conn: &Connection,
    owner: OverrideOwner,
    overrides: &[OverrideRequest],
    prune_invalid: bool,
) -> Result<OverrideSummary> {
    let tx = conn.unchecked_transaction()?;
    let mut summary = OverrideSummary::default();

    for request in overrides {
        match request.value {
            OverrideValue::Enabled => {
                ContentOverride::upsert(&tx, owner, &request.content_label, OverrideState::Enabled)?;
                summary.set += 1;
            }
            OverrideValue::Disabled => {
                ContentOverride::upsert(&tx, owner, &request.content_label, OverrideState::Disabled)?;
                summary.set += 1;
            }
            OverrideValue::Default => {
                if ContentOverride::delete(&tx, owner, &request.content_label)? {
                    summary.removed += 1;
                }
            }
        }
    }

    if prune_invalid {
        let available = available_content_labels(&tx, owner)?;
        for stale in ContentOverride::list_for_owner(&tx, owner)?
            .into_iter()
            .filter(|o| !available.contains(&o.content_label))
        {
            debug!("Pruning override for unavailable content {}", stale.content_label);
            ContentOverride::delete(&tx, owner, &stale.content_label)?;
            summary.pruned += 1;
        }
    }

    tx.commit()?;
    info!(
        "Overrides for {:?}: {} set, {} removed, {} pruned",
        owner, summary.set, summary.removed, summary.pruned
    );
    Ok(summary)
}
