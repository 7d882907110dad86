// src/db/models/host.rs

//! Host and host content assignment models

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub id: Option<i64>,
    pub organization_id: i64,
    pub name: String,
}

impl Host {
    pub fn new(organization_id: i64, name: String) -> Self {
        Self {
            id: None,
            organization_id,
            name,
        }
    }

    pub fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InvalidInput(format!("Host {} has no id", self.name)))
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO hosts (organization_id, name) VALUES (?1, ?2)",
            params![self.organization_id, &self.name],
        )?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let host = conn
            .query_row(
                "SELECT id, organization_id, name FROM hosts WHERE id = ?1",
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(host)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let host = conn
            .query_row(
                "SELECT id, organization_id, name FROM hosts WHERE name = ?1",
                [name],
                Self::from_row,
            )
            .optional()?;
        Ok(host)
    }

    pub fn list_for_organization(conn: &Connection, organization_id: i64) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT id, organization_id, name FROM hosts WHERE organization_id = ?1 ORDER BY name")?;
        let hosts = stmt
            .query_map([organization_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(hosts)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            organization_id: row.get(1)?,
            name: row.get(2)?,
        })
    }
}

/// The single content view environment a host consumes content from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostContentAssignment {
    pub host_id: i64,
    pub content_view_id: i64,
    pub environment_id: i64,
}

impl HostContentAssignment {
    pub fn find_for_host(conn: &Connection, host_id: i64) -> Result<Option<Self>> {
        let assignment = conn
            .query_row(
                "SELECT host_id, content_view_id, environment_id
                 FROM host_content_view_environments WHERE host_id = ?1",
                [host_id],
                |row| {
                    Ok(Self {
                        host_id: row.get(0)?,
                        content_view_id: row.get(1)?,
                        environment_id: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(assignment)
    }

    /// Replace the host's assignment
    pub fn save(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO host_content_view_environments (host_id, content_view_id, environment_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(host_id) DO UPDATE SET
                content_view_id = excluded.content_view_id,
                environment_id = excluded.environment_id",
            params![self.host_id, self.content_view_id, self.environment_id],
        )?;
        Ok(())
    }

    /// Number of hosts consuming a content view in an environment
    pub fn count_for(conn: &Connection, content_view_id: i64, environment_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM host_content_view_environments
             WHERE content_view_id = ?1 AND environment_id = ?2",
            params![content_view_id, environment_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
