// src/db/models/repository.rs

//! Repository model - library repositories and the clones cut from them
//!
//! A library repository is the organization's canonical copy of some content.
//! Publishing a version clones every library repository the view resolves to
//! into an archive clone (no environment); promoting clones the archive clones
//! again into environment clones. Every clone records its library instance.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

const COLUMNS: &str = "id, organization_id, product, name, label, content_type, redhat, backend_id, \
                       library_instance_id, content_view_version_id, environment_id";

/// Kind of content a repository carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Yum,
    Deb,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: Option<i64>,
    pub organization_id: i64,
    pub product: String,
    pub name: String,
    pub label: String,
    pub content_type: ContentType,
    pub redhat: bool,
    /// Identifier of the repository in the content store
    pub backend_id: String,
    pub library_instance_id: Option<i64>,
    pub content_view_version_id: Option<i64>,
    pub environment_id: Option<i64>,
}

impl Repository {
    /// A new library repository
    pub fn library(
        organization_id: i64,
        product: String,
        name: String,
        content_type: ContentType,
        backend_id: String,
    ) -> Self {
        let label = super::content_view::labelize(&name);
        Self {
            id: None,
            organization_id,
            product,
            name,
            label,
            content_type,
            redhat: false,
            backend_id,
            library_instance_id: None,
            content_view_version_id: None,
            environment_id: None,
        }
    }

    /// A clone of `library` belonging to a version (and optionally an environment)
    pub fn clone_of(
        library: &Repository,
        version_id: i64,
        environment_id: Option<i64>,
        backend_id: String,
    ) -> Result<Self> {
        Ok(Self {
            id: None,
            organization_id: library.organization_id,
            product: library.product.clone(),
            name: library.name.clone(),
            label: library.label.clone(),
            content_type: library.content_type,
            redhat: library.redhat,
            backend_id,
            library_instance_id: Some(library.library_instance()?),
            content_view_version_id: Some(version_id),
            environment_id,
        })
    }

    pub fn is_library(&self) -> bool {
        self.library_instance_id.is_none()
    }

    /// Id of the library repository this one derives from (itself for library repositories)
    pub fn library_instance(&self) -> Result<i64> {
        match self.library_instance_id {
            Some(id) => Ok(id),
            None => self
                .id
                .ok_or_else(|| Error::InvalidInput(format!("Repository {} has no id", self.name))),
        }
    }

    pub fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InvalidInput(format!("Repository {} has no id", self.name)))
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO repositories
                (organization_id, product, name, label, content_type, redhat, backend_id,
                 library_instance_id, content_view_version_id, environment_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                self.organization_id,
                &self.product,
                &self.name,
                &self.label,
                self.content_type.to_string(),
                self.redhat as i32,
                &self.backend_id,
                self.library_instance_id,
                self.content_view_version_id,
                self.environment_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let repo = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM repositories WHERE id = ?1"),
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(repo)
    }

    pub fn find_by_backend_id(conn: &Connection, backend_id: &str) -> Result<Option<Self>> {
        let repo = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM repositories WHERE backend_id = ?1"),
                [backend_id],
                Self::from_row,
            )
            .optional()?;
        Ok(repo)
    }

    /// Find a library repository by product and repository name
    pub fn find_library(conn: &Connection, organization_id: i64, product: &str, name: &str) -> Result<Option<Self>> {
        let repo = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM repositories
                     WHERE organization_id = ?1 AND product = ?2 AND name = ?3
                       AND library_instance_id IS NULL"
                ),
                params![organization_id, product, name],
                Self::from_row,
            )
            .optional()?;
        Ok(repo)
    }

    pub fn list_library(conn: &Connection, organization_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM repositories
             WHERE organization_id = ?1 AND library_instance_id IS NULL
             ORDER BY product, name"
        ))?;
        let repos = stmt
            .query_map([organization_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(repos)
    }

    /// Every clone belonging to a version, archive and environment clones alike
    pub fn list_for_version(conn: &Connection, version_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM repositories WHERE content_view_version_id = ?1 ORDER BY id"
        ))?;
        let repos = stmt
            .query_map([version_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(repos)
    }

    /// Archive clones of a version (not tied to an environment)
    pub fn archive_clones(conn: &Connection, version_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM repositories
             WHERE content_view_version_id = ?1 AND environment_id IS NULL
             ORDER BY library_instance_id"
        ))?;
        let repos = stmt
            .query_map([version_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(repos)
    }

    /// Clones of a version made for one environment
    pub fn environment_clones(conn: &Connection, version_id: i64, environment_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM repositories
             WHERE content_view_version_id = ?1 AND environment_id = ?2
             ORDER BY library_instance_id"
        ))?;
        let repos = stmt
            .query_map(params![version_id, environment_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(repos)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM repositories WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let content_type: String = row.get(5)?;
        Ok(Self {
            id: Some(row.get(0)?),
            organization_id: row.get(1)?,
            product: row.get(2)?,
            name: row.get(3)?,
            label: row.get(4)?,
            content_type: ContentType::from_str(&content_type).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
            })?,
            redhat: row.get::<_, i32>(6)? != 0,
            backend_id: row.get(7)?,
            library_instance_id: row.get(8)?,
            content_view_version_id: row.get(9)?,
            environment_id: row.get(10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ContentView, ContentViewFlags, ContentViewVersion, Organization};

    #[test]
    fn test_library_and_clone_roundtrip() {
        let conn = crate::db::open_in_memory().unwrap();
        let org_id = Organization::new("Acme".into(), "acme".into())
            .insert(&conn)
            .unwrap();

        let mut library = Repository::library(
            org_id,
            "RHEL".into(),
            "BaseOS".into(),
            ContentType::Yum,
            "lib-1".into(),
        );
        let library_id = library.insert(&conn).unwrap();

        let cv = ContentView::new(org_id, "Base".into(), ContentViewFlags::default())
            .insert(&conn)
            .unwrap();
        let version = ContentViewVersion::new(cv, 1, 0).insert(&conn).unwrap();

        let mut clone = Repository::clone_of(&library, version, None, "clone-1".into()).unwrap();
        clone.insert(&conn).unwrap();

        assert_eq!(clone.library_instance().unwrap(), library_id);
        assert_eq!(Repository::archive_clones(&conn, version).unwrap().len(), 1);
        assert_eq!(Repository::list_library(&conn, org_id).unwrap().len(), 1);
        assert!(
            Repository::find_library(&conn, org_id, "RHEL", "BaseOS")
                .unwrap()
                .is_some()
        );

        // A clone of a clone still points at the library repository
        let nested = Repository::clone_of(&clone, version, None, "clone-2".into()).unwrap();
        assert_eq!(nested.library_instance_id, Some(library_id));
    }
}
