// src/db/models/content_view.rs

//! Content view definition models
//!
//! A content view is the mutable definition versions are cut from: the
//! library repositories it includes, the unit filters applied to them, and
//! for composite views the component views it aggregates.

use crate::error::{Error, Result};
use crate::store::{UnitFilter, UnitType};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

const COLUMNS: &str =
    "id, organization_id, name, label, description, composite, import_only, solve_dependencies, auto_publish";

/// Behaviour flags of a content view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentViewFlags {
    pub composite: bool,
    pub import_only: bool,
    pub solve_dependencies: bool,
    pub auto_publish: bool,
}

impl ContentViewFlags {
    /// Resolve conflicting flags the way the creation form does.
    ///
    /// Import-only wins over composite; composite views never solve
    /// dependencies; only composite views auto-publish.
    pub fn normalized(mut self) -> Self {
        if self.import_only {
            self.composite = false;
            self.solve_dependencies = false;
            self.auto_publish = false;
        }
        if self.composite {
            self.solve_dependencies = false;
            self.import_only = false;
        } else {
            self.auto_publish = false;
        }
        self
    }

    /// Check the flag invariants without changing anything
    pub fn validate(&self) -> Result<()> {
        if self.import_only && (self.composite || self.solve_dependencies || self.auto_publish) {
            return Err(Error::InvalidInput(
                "Import-only content views cannot be composite, solve dependencies or auto-publish"
                    .to_string(),
            ));
        }
        if self.composite && self.solve_dependencies {
            return Err(Error::InvalidInput(
                "Composite content views cannot solve dependencies".to_string(),
            ));
        }
        if !self.composite && self.auto_publish {
            return Err(Error::InvalidInput(
                "Only composite content views can auto-publish".to_string(),
            ));
        }
        Ok(())
    }
}

/// Turn a display name into a label: alphanumerics and `-` kept, everything else `_`
pub fn labelize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentView {
    pub id: Option<i64>,
    pub organization_id: i64,
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    pub flags: ContentViewFlags,
}

impl ContentView {
    pub fn new(organization_id: i64, name: String, flags: ContentViewFlags) -> Self {
        let label = labelize(&name);
        Self {
            id: None,
            organization_id,
            name,
            label,
            description: None,
            flags: flags.normalized(),
        }
    }

    pub fn is_composite(&self) -> bool {
        self.flags.composite
    }

    pub fn is_import_only(&self) -> bool {
        self.flags.import_only
    }

    /// Database id; errors for views that were never inserted
    pub fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InvalidInput(format!("Content view {} has no id", self.name)))
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        self.flags.validate()?;
        conn.execute(
            "INSERT INTO content_views
                (organization_id, name, label, description, composite, import_only, solve_dependencies, auto_publish)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.organization_id,
                &self.name,
                &self.label,
                &self.description,
                self.flags.composite as i32,
                self.flags.import_only as i32,
                self.flags.solve_dependencies as i32,
                self.flags.auto_publish as i32,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Persist changed flags; `composite` itself cannot change once created
    pub fn update_flags(&mut self, conn: &Connection, flags: ContentViewFlags) -> Result<()> {
        let id = self.require_id()?;
        let flags = flags.normalized();
        if flags.composite != self.flags.composite {
            return Err(Error::InvalidInput(
                "The composite flag cannot be changed after creation".to_string(),
            ));
        }
        flags.validate()?;
        conn.execute(
            "UPDATE content_views SET import_only = ?1, solve_dependencies = ?2, auto_publish = ?3
             WHERE id = ?4",
            params![
                flags.import_only as i32,
                flags.solve_dependencies as i32,
                flags.auto_publish as i32,
                id
            ],
        )?;
        self.flags = flags;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let cv = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM content_views WHERE id = ?1"),
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(cv)
    }

    pub fn find_by_label(conn: &Connection, organization_id: i64, label: &str) -> Result<Option<Self>> {
        let cv = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM content_views WHERE organization_id = ?1 AND label = ?2"),
                params![organization_id, label],
                Self::from_row,
            )
            .optional()?;
        Ok(cv)
    }

    pub fn list_for_organization(conn: &Connection, organization_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM content_views WHERE organization_id = ?1 ORDER BY name"
        ))?;
        let views = stmt
            .query_map([organization_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(views)
    }

    /// Add a library repository to this (non-composite) view
    pub fn add_repository(&self, conn: &Connection, repository_id: i64) -> Result<()> {
        let id = self.require_id()?;
        if self.is_composite() {
            return Err(Error::InvalidInput(format!(
                "Composite content view {} takes components, not repositories",
                self.name
            )));
        }
        conn.execute(
            "INSERT OR IGNORE INTO content_view_repositories (content_view_id, repository_id)
             VALUES (?1, ?2)",
            params![id, repository_id],
        )?;
        Ok(())
    }

    /// Ids of the library repositories included in this view
    pub fn repository_ids(&self, conn: &Connection) -> Result<Vec<i64>> {
        let id = self.require_id()?;
        let mut stmt = conn.prepare(
            "SELECT repository_id FROM content_view_repositories
             WHERE content_view_id = ?1 ORDER BY repository_id",
        )?;
        let ids = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Composite views that include this view as a component
    pub fn composites_including(&self, conn: &Connection) -> Result<Vec<ContentViewComponent>> {
        let id = self.require_id()?;
        ContentViewComponent::list_for_component(conn, id)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            organization_id: row.get(1)?,
            name: row.get(2)?,
            label: row.get(3)?,
            description: row.get(4)?,
            flags: ContentViewFlags {
                composite: row.get::<_, i32>(5)? != 0,
                import_only: row.get::<_, i32>(6)? != 0,
                solve_dependencies: row.get::<_, i32>(7)? != 0,
                auto_publish: row.get::<_, i32>(8)? != 0,
            },
        })
    }
}

/// A unit filter attached to a content view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentViewFilter {
    pub id: Option<i64>,
    pub content_view_id: i64,
    pub name: String,
    pub inclusion: bool,
    pub unit_type: UnitType,
    pub pattern: String,
}

impl ContentViewFilter {
    pub fn new(content_view_id: i64, name: String, inclusion: bool, unit_type: UnitType, pattern: String) -> Self {
        Self {
            id: None,
            content_view_id,
            name,
            inclusion,
            unit_type,
            pattern,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        // Reject bad globs at definition time rather than at publish time
        glob::Pattern::new(&self.pattern)?;
        conn.execute(
            "INSERT INTO content_view_filters (content_view_id, name, inclusion, unit_type, pattern)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.content_view_id,
                &self.name,
                self.inclusion as i32,
                self.unit_type.to_string(),
                &self.pattern,
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn list_for_view(conn: &Connection, content_view_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, content_view_id, name, inclusion, unit_type, pattern
             FROM content_view_filters WHERE content_view_id = ?1 ORDER BY id",
        )?;
        let filters = stmt
            .query_map([content_view_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(filters)
    }

    /// Convert to the store-level filter used by copy operations
    pub fn to_unit_filter(&self) -> UnitFilter {
        UnitFilter {
            inclusion: self.inclusion,
            unit_type: self.unit_type,
            pattern: self.pattern.clone(),
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let unit_type: String = row.get(4)?;
        Ok(Self {
            id: Some(row.get(0)?),
            content_view_id: row.get(1)?,
            name: row.get(2)?,
            inclusion: row.get::<_, i32>(3)? != 0,
            unit_type: UnitType::from_str(&unit_type).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
            })?,
            pattern: row.get(5)?,
        })
    }
}

/// Membership of a component view in a composite view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentViewComponent {
    pub id: Option<i64>,
    pub composite_content_view_id: i64,
    pub component_content_view_id: i64,
    /// Pinned version; `None` when following latest
    pub content_view_version_id: Option<i64>,
    pub latest: bool,
}

impl ContentViewComponent {
    pub fn latest(composite_content_view_id: i64, component_content_view_id: i64) -> Self {
        Self {
            id: None,
            composite_content_view_id,
            component_content_view_id,
            content_view_version_id: None,
            latest: true,
        }
    }

    pub fn pinned(composite_content_view_id: i64, component_content_view_id: i64, version_id: i64) -> Self {
        Self {
            id: None,
            composite_content_view_id,
            component_content_view_id,
            content_view_version_id: Some(version_id),
            latest: false,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let composite = ContentView::find_by_id(conn, self.composite_content_view_id)?
            .ok_or_else(|| Error::NotFound(format!("content view {}", self.composite_content_view_id)))?;
        if !composite.is_composite() {
            return Err(Error::InvalidInput(format!(
                "{} is not a composite content view",
                composite.name
            )));
        }
        let component = ContentView::find_by_id(conn, self.component_content_view_id)?
            .ok_or_else(|| Error::NotFound(format!("content view {}", self.component_content_view_id)))?;
        if component.is_composite() {
            return Err(Error::InvalidInput(format!(
                "Composite content view {} cannot be a component",
                component.name
            )));
        }

        conn.execute(
            "INSERT INTO content_view_components
                (composite_content_view_id, component_content_view_id, content_view_version_id, latest)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.composite_content_view_id,
                self.component_content_view_id,
                self.content_view_version_id,
                self.latest as i32,
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn list_for_composite(conn: &Connection, composite_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, composite_content_view_id, component_content_view_id, content_view_version_id, latest
             FROM content_view_components WHERE composite_content_view_id = ?1 ORDER BY id",
        )?;
        let components = stmt
            .query_map([composite_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(components)
    }

    pub fn list_for_component(conn: &Connection, component_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, composite_content_view_id, component_content_view_id, content_view_version_id, latest
             FROM content_view_components WHERE component_content_view_id = ?1 ORDER BY id",
        )?;
        let components = stmt
            .query_map([component_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(components)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            composite_content_view_id: row.get(1)?,
            component_content_view_id: row.get(2)?,
            content_view_version_id: row.get(3)?,
            latest: row.get::<_, i32>(4)? != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Organization;

    fn setup() -> (Connection, i64) {
        let conn = crate::db::open_in_memory().unwrap();
        let org_id = Organization::new("Acme".into(), "acme".into())
            .insert(&conn)
            .unwrap();
        (conn, org_id)
    }

    #[test]
    fn test_import_only_clears_conflicting_flags() {
        let flags = ContentViewFlags {
            composite: true,
            import_only: true,
            solve_dependencies: true,
            auto_publish: true,
        }
        .normalized();

        assert!(flags.import_only);
        assert!(!flags.composite);
        assert!(!flags.solve_dependencies);
        assert!(!flags.auto_publish);
    }

    #[test]
    fn test_composite_clears_solve_dependencies() {
        let flags = ContentViewFlags {
            composite: true,
            solve_dependencies: true,
            auto_publish: true,
            ..Default::default()
        }
        .normalized();

        assert!(flags.composite);
        assert!(flags.auto_publish);
        assert!(!flags.solve_dependencies);
    }

    #[test]
    fn test_non_composite_never_auto_publishes() {
        let flags = ContentViewFlags {
            auto_publish: true,
            solve_dependencies: true,
            ..Default::default()
        }
        .normalized();
        assert!(!flags.auto_publish);
        assert!(flags.solve_dependencies);
    }

    #[test]
    fn test_labelize() {
        assert_eq!(labelize("RHEL 9 Base"), "RHEL_9_Base");
        assert_eq!(labelize("web-tier"), "web-tier");
    }

    #[test]
    fn test_component_must_not_be_composite() {
        let (conn, org_id) = setup();
        let composite_flags = ContentViewFlags {
            composite: true,
            ..Default::default()
        };
        let a = ContentView::new(org_id, "A".into(), composite_flags)
            .insert(&conn)
            .unwrap();
        let b = ContentView::new(org_id, "B".into(), composite_flags)
            .insert(&conn)
            .unwrap();

        let err = ContentViewComponent::latest(a, b).insert(&conn).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_filter_rejects_bad_pattern() {
        let (conn, org_id) = setup();
        let cv = ContentView::new(org_id, "Base".into(), ContentViewFlags::default())
            .insert(&conn)
            .unwrap();

        let mut filter = ContentViewFilter::new(cv, "bad".into(), false, UnitType::Rpm, "[".into());
        assert!(matches!(filter.insert(&conn), Err(Error::Pattern(_))));

        let mut good = ContentViewFilter::new(cv, "no-debug".into(), false, UnitType::Rpm, "*-debuginfo".into());
        good.insert(&conn).unwrap();
        let filters = ContentViewFilter::list_for_view(&conn, cv).unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].unit_type, UnitType::Rpm);
    }
}
