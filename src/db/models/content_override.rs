// src/db/models/content_override.rs

//! Content override model
//!
//! An override forces a content label enabled or disabled for a host or an
//! activation key. Absence of a row means the label uses its default.

use crate::error::Result;
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// Who an override belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum OverrideOwner {
    Host(i64),
    ActivationKey(i64),
}

impl OverrideOwner {
    fn column(self) -> &'static str {
        match self {
            Self::Host(_) => "host_id",
            Self::ActivationKey(_) => "activation_key_id",
        }
    }

    fn id(self) -> i64 {
        match self {
            Self::Host(id) | Self::ActivationKey(id) => id,
        }
    }
}

/// Stored override state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OverrideState {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentOverride {
    pub id: i64,
    pub owner: OverrideOwner,
    pub content_label: String,
    pub name: String,
    pub state: OverrideState,
}

impl ContentOverride {
    /// Insert or update the override for (owner, label)
    pub fn upsert(conn: &Connection, owner: OverrideOwner, content_label: &str, state: OverrideState) -> Result<()> {
        let column = owner.column();
        conn.execute(
            &format!(
                "INSERT INTO content_overrides ({column}, content_label, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT({column}, content_label) DO UPDATE SET
                    value = excluded.value,
                    updated_at = CURRENT_TIMESTAMP"
            ),
            params![owner.id(), content_label, state.to_string()],
        )?;
        Ok(())
    }

    pub fn delete(conn: &Connection, owner: OverrideOwner, content_label: &str) -> Result<bool> {
        let deleted = conn.execute(
            &format!(
                "DELETE FROM content_overrides WHERE {} = ?1 AND content_label = ?2",
                owner.column()
            ),
            params![owner.id(), content_label],
        )?;
        Ok(deleted > 0)
    }

    pub fn list_for_owner(conn: &Connection, owner: OverrideOwner) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, content_label, name, value FROM content_overrides
             WHERE {} = ?1 ORDER BY content_label",
            owner.column()
        ))?;
        let rows = stmt
            .query_map([owner.id()], |row| Self::from_row(row, owner))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn from_row(row: &Row, owner: OverrideOwner) -> rusqlite::Result<Self> {
        let value: String = row.get(3)?;
        Ok(Self {
            id: row.get(0)?,
            owner,
            content_label: row.get(1)?,
            name: row.get(2)?,
            state: OverrideState::from_str(&value).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?,
        })
    }
}
