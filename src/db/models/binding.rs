// src/db/models/binding.rs

//! Content view environment bindings
//!
//! A binding records which version of a content view is active in an
//! environment. There is at most one per (content view, environment); attaching
//! a new version replaces the old binding in place.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "id, content_view_id, content_view_version_id, environment_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentViewEnvironment {
    pub id: i64,
    pub content_view_id: i64,
    pub content_view_version_id: i64,
    pub environment_id: i64,
}

impl ContentViewEnvironment {
    /// Bind `version_id` in `environment_id`, returning the version it replaced.
    ///
    /// Callers must run this inside a transaction to keep the read and the
    /// upsert together.
    pub fn attach(conn: &Connection, content_view_id: i64, version_id: i64, environment_id: i64) -> Result<(i64, Option<i64>)> {
        let previous = Self::find(conn, content_view_id, environment_id)?;

        conn.execute(
            "INSERT INTO content_view_environments (content_view_id, content_view_version_id, environment_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(content_view_id, environment_id) DO UPDATE SET
                content_view_version_id = excluded.content_view_version_id,
                updated_at = CURRENT_TIMESTAMP",
            params![content_view_id, version_id, environment_id],
        )?;

        let binding = Self::find(conn, content_view_id, environment_id)?
            .map(|b| b.id)
            .unwrap_or_else(|| conn.last_insert_rowid());

        let replaced = previous
            .map(|b| b.content_view_version_id)
            .filter(|&old| old != version_id);
        Ok((binding, replaced))
    }

    pub fn find(conn: &Connection, content_view_id: i64, environment_id: i64) -> Result<Option<Self>> {
        let binding = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM content_view_environments
                     WHERE content_view_id = ?1 AND environment_id = ?2"
                ),
                params![content_view_id, environment_id],
                Self::from_row,
            )
            .optional()?;
        Ok(binding)
    }

    /// Is this exact version bound in the environment?
    pub fn version_in_environment(conn: &Connection, version_id: i64, environment_id: i64) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM content_view_environments
             WHERE content_view_version_id = ?1 AND environment_id = ?2",
            params![version_id, environment_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list_for_version(conn: &Connection, version_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM content_view_environments
             WHERE content_view_version_id = ?1 ORDER BY environment_id"
        ))?;
        let bindings = stmt
            .query_map([version_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bindings)
    }

    pub fn list_for_view(conn: &Connection, content_view_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM content_view_environments
             WHERE content_view_id = ?1 ORDER BY environment_id"
        ))?;
        let bindings = stmt
            .query_map([content_view_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bindings)
    }

    pub fn remove(conn: &Connection, content_view_id: i64, environment_id: i64) -> Result<bool> {
        let removed = conn.execute(
            "DELETE FROM content_view_environments WHERE content_view_id = ?1 AND environment_id = ?2",
            params![content_view_id, environment_id],
        )?;
        Ok(removed > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content_view_id: row.get(1)?,
            content_view_version_id: row.get(2)?,
            environment_id: row.get(3)?,
        })
    }
}
