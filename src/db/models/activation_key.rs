// src/db/models/activation_key.rs

//! Activation key model
//!
//! Activation keys carry a content view environment and content overrides
//! that registering hosts start from.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationKey {
    pub id: Option<i64>,
    pub organization_id: i64,
    pub name: String,
    pub content_view_id: Option<i64>,
    pub environment_id: Option<i64>,
}

impl ActivationKey {
    pub fn new(organization_id: i64, name: String) -> Self {
        Self {
            id: None,
            organization_id,
            name,
            content_view_id: None,
            environment_id: None,
        }
    }

    pub fn with_content(mut self, content_view_id: i64, environment_id: i64) -> Self {
        self.content_view_id = Some(content_view_id);
        self.environment_id = Some(environment_id);
        self
    }

    pub fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InvalidInput(format!("Activation key {} has no id", self.name)))
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO activation_keys (organization_id, name, content_view_id, environment_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.organization_id,
                &self.name,
                self.content_view_id,
                self.environment_id
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let key = conn
            .query_row(
                "SELECT id, organization_id, name, content_view_id, environment_id
                 FROM activation_keys WHERE id = ?1",
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(key)
    }

    pub fn find_by_name(conn: &Connection, organization_id: i64, name: &str) -> Result<Option<Self>> {
        let key = conn
            .query_row(
                "SELECT id, organization_id, name, content_view_id, environment_id
                 FROM activation_keys WHERE organization_id = ?1 AND name = ?2",
                params![organization_id, name],
                Self::from_row,
            )
            .optional()?;
        Ok(key)
    }

    /// Number of activation keys pointing at a content view environment
    pub fn count_for(conn: &Connection, content_view_id: i64, environment_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM activation_keys WHERE content_view_id = ?1 AND environment_id = ?2",
            params![content_view_id, environment_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            organization_id: row.get(1)?,
            name: row.get(2)?,
            content_view_id: row.get(3)?,
            environment_id: row.get(4)?,
        })
    }
}
