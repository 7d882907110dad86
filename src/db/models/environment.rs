// src/db/models/environment.rs

//! Lifecycle environment model
//!
//! Environments form promotion paths. Every path starts at the organization's
//! Library; the Library may have several successors, any other environment at
//! most one.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

pub const LIBRARY_NAME: &str = "Library";

const COLUMNS: &str = "id, organization_id, name, label, description, prior_id, library";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEnvironment {
    pub id: Option<i64>,
    pub organization_id: i64,
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    pub prior_id: Option<i64>,
    pub library: bool,
}

impl LifecycleEnvironment {
    /// The root environment of an organization
    pub fn library(organization_id: i64) -> Self {
        Self {
            id: None,
            organization_id,
            name: LIBRARY_NAME.to_string(),
            label: LIBRARY_NAME.to_string(),
            description: None,
            prior_id: None,
            library: true,
        }
    }

    /// A path environment following `prior_id`
    pub fn new(organization_id: i64, name: String, label: String, prior_id: i64) -> Self {
        Self {
            id: None,
            organization_id,
            name,
            label,
            description: None,
            prior_id: Some(prior_id),
            library: false,
        }
    }

    pub fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InvalidInput(format!("Environment {} has no id", self.name)))
    }

    /// Insert this environment, validating its place in the path
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        if let Some(prior_id) = self.prior_id {
            let prior = Self::find_by_id(conn, prior_id)?
                .ok_or_else(|| Error::NotFound(format!("prior environment {}", prior_id)))?;
            if prior.organization_id != self.organization_id {
                return Err(Error::InvalidInput(format!(
                    "Environment {} belongs to a different organization",
                    prior.name
                )));
            }
            if !prior.library && !Self::successors(conn, prior_id)?.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "Environment {} already has a successor",
                    prior.name
                )));
            }
        }

        conn.execute(
            "INSERT INTO lifecycle_environments (organization_id, name, label, description, prior_id, library)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.organization_id,
                &self.name,
                &self.label,
                &self.description,
                self.prior_id,
                self.library as i32,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let env = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM lifecycle_environments WHERE id = ?1"),
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(env)
    }

    pub fn find_by_label(conn: &Connection, organization_id: i64, label: &str) -> Result<Option<Self>> {
        let env = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM lifecycle_environments
                     WHERE organization_id = ?1 AND label = ?2"
                ),
                params![organization_id, label],
                Self::from_row,
            )
            .optional()?;
        Ok(env)
    }

    /// The organization's Library, which every organization has
    pub fn find_library(conn: &Connection, organization_id: i64) -> Result<Self> {
        conn.query_row(
            &format!(
                "SELECT {COLUMNS} FROM lifecycle_environments
                 WHERE organization_id = ?1 AND library = 1"
            ),
            [organization_id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("Library for organization {}", organization_id)))
    }

    /// Environments whose prior is `id`
    pub fn successors(conn: &Connection, id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM lifecycle_environments WHERE prior_id = ?1 ORDER BY name"
        ))?;
        let envs = stmt
            .query_map([id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(envs)
    }

    pub fn list_for_organization(conn: &Connection, organization_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM lifecycle_environments
             WHERE organization_id = ?1 ORDER BY library DESC, id"
        ))?;
        let envs = stmt
            .query_map([organization_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(envs)
    }

    /// Environment immediately before this one in its path
    pub fn prior(&self, conn: &Connection) -> Result<Option<Self>> {
        match self.prior_id {
            Some(prior_id) => Self::find_by_id(conn, prior_id),
            None => Ok(None),
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            organization_id: row.get(1)?,
            name: row.get(2)?,
            label: row.get(3)?,
            description: row.get(4)?,
            prior_id: row.get(5)?,
            library: row.get::<_, i32>(6)? != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Organization;

    fn setup() -> (Connection, i64) {
        let conn = crate::db::open_in_memory().unwrap();
        let mut org = Organization::new("Acme".to_string(), "acme".to_string());
        let org_id = org.insert(&conn).unwrap();
        (conn, org_id)
    }

    #[test]
    fn test_library_is_unique_per_organization() {
        let (conn, org_id) = setup();
        LifecycleEnvironment::library(org_id).insert(&conn).unwrap();

        let mut second = LifecycleEnvironment::library(org_id);
        second.name = "Library2".to_string();
        second.label = "library2".to_string();
        assert!(second.insert(&conn).is_err());
    }

    #[test]
    fn test_path_environment_single_successor() {
        let (conn, org_id) = setup();
        let library = LifecycleEnvironment::library(org_id).insert(&conn).unwrap();
        let dev = LifecycleEnvironment::new(org_id, "Dev".into(), "dev".into(), library)
            .insert(&conn)
            .unwrap();
        LifecycleEnvironment::new(org_id, "QA".into(), "qa".into(), dev)
            .insert(&conn)
            .unwrap();

        let err = LifecycleEnvironment::new(org_id, "Stage".into(), "stage".into(), dev)
            .insert(&conn)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Library may start several paths
        LifecycleEnvironment::new(org_id, "Test".into(), "test".into(), library)
            .insert(&conn)
            .unwrap();
        assert_eq!(LifecycleEnvironment::successors(&conn, library).unwrap().len(), 2);
    }

    #[test]
    fn test_find_library_and_prior() {
        let (conn, org_id) = setup();
        let library = LifecycleEnvironment::library(org_id).insert(&conn).unwrap();
        let dev_id = LifecycleEnvironment::new(org_id, "Dev".into(), "dev".into(), library)
            .insert(&conn)
            .unwrap();

        let found = LifecycleEnvironment::find_library(&conn, org_id).unwrap();
        assert_eq!(found.id, Some(library));

        let dev = LifecycleEnvironment::find_by_id(&conn, dev_id).unwrap().unwrap();
        assert_eq!(dev.prior(&conn).unwrap().unwrap().id, Some(library));
    }
}
