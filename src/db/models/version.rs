// src/db/models/version.rs

//! Content view version model - immutable numbered snapshots

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "id, content_view_id, major, minor, description, imported, created_at";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentViewVersion {
    pub id: Option<i64>,
    pub content_view_id: i64,
    pub major: i64,
    pub minor: i64,
    pub description: Option<String>,
    pub imported: bool,
    pub created_at: Option<String>,
}

impl ContentViewVersion {
    pub fn new(content_view_id: i64, major: i64, minor: i64) -> Self {
        Self {
            id: None,
            content_view_id,
            major,
            minor,
            description: None,
            imported: false,
            created_at: None,
        }
    }

    /// "major.minor"
    pub fn number(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    pub fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InvalidInput(format!("Version {} has no id", self.number())))
    }

    /// Insert the version. A duplicate (view, major, minor) fails on the
    /// UNIQUE constraint.
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO content_view_versions (content_view_id, major, minor, description, imported)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.content_view_id,
                self.major,
                self.minor,
                &self.description,
                self.imported as i32,
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let version = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM content_view_versions WHERE id = ?1"),
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(version)
    }

    pub fn find_by_number(conn: &Connection, content_view_id: i64, major: i64, minor: i64) -> Result<Option<Self>> {
        let version = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM content_view_versions
                     WHERE content_view_id = ?1 AND major = ?2 AND minor = ?3"
                ),
                params![content_view_id, major, minor],
                Self::from_row,
            )
            .optional()?;
        Ok(version)
    }

    /// Highest-numbered version of a view
    pub fn latest(conn: &Connection, content_view_id: i64) -> Result<Option<Self>> {
        let version = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM content_view_versions
                     WHERE content_view_id = ?1 ORDER BY major DESC, minor DESC LIMIT 1"
                ),
                [content_view_id],
                Self::from_row,
            )
            .optional()?;
        Ok(version)
    }

    pub fn list_for_view(conn: &Connection, content_view_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM content_view_versions
             WHERE content_view_id = ?1 ORDER BY major, minor"
        ))?;
        let versions = stmt
            .query_map([content_view_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    pub fn count_for_view(conn: &Connection, content_view_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM content_view_versions WHERE content_view_id = ?1",
            [content_view_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Record that a composite version captured a component version
    pub fn add_component_version(conn: &Connection, composite_version_id: i64, component_version_id: i64) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO content_view_version_components (composite_version_id, component_version_id)
             VALUES (?1, ?2)",
            params![composite_version_id, component_version_id],
        )?;
        Ok(())
    }

    /// Composite versions that captured this version
    pub fn composite_version_ids(conn: &Connection, component_version_id: i64) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT composite_version_id FROM content_view_version_components
             WHERE component_version_id = ?1 ORDER BY composite_version_id",
        )?;
        let ids = stmt
            .query_map([component_version_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM content_view_versions WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            content_view_id: row.get(1)?,
            major: row.get(2)?,
            minor: row.get(3)?,
            description: row.get(4)?,
            imported: row.get::<_, i32>(5)? != 0,
            created_at: row.get(6)?,
        })
    }
}
