// src/db/models/organization.rs

//! Organization model - the owner of environments, views and repositories

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub id: Option<i64>,
    pub name: String,
    pub label: String,
}

impl Organization {
    pub fn new(name: String, label: String) -> Self {
        Self {
            id: None,
            name,
            label,
        }
    }

    pub fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InvalidInput(format!("Organization {} has no id", self.name)))
    }

    /// Insert this organization into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO organizations (name, label) VALUES (?1, ?2)",
            params![&self.name, &self.label],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let org = conn
            .query_row(
                "SELECT id, name, label FROM organizations WHERE id = ?1",
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(org)
    }

    pub fn find_by_label(conn: &Connection, label: &str) -> Result<Option<Self>> {
        let org = conn
            .query_row(
                "SELECT id, name, label FROM organizations WHERE label = ?1",
                [label],
                Self::from_row,
            )
            .optional()?;
        Ok(org)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT id, name, label FROM organizations ORDER BY name")?;
        let orgs = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(orgs)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            label: row.get(2)?,
        })
    }
}
