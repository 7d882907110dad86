// src/lifecycle/version.rs

//! Version numbering for publish and import

use crate::db::models::{ContentView, ContentViewVersion};
use crate::error::{Error, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Which version number a publish should produce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionRequest {
    /// One past the latest major, minor 0
    #[default]
    Next,
    Explicit { major: i64, minor: i64 },
}

/// Number the next version of `content_view_id` would get
pub fn next_version(conn: &Connection, content_view_id: i64) -> Result<(i64, i64)> {
    Ok(match ContentViewVersion::latest(conn, content_view_id)? {
        Some(latest) => (latest.major + 1, 0),
        None => (1, 0),
    })
}

/// Resolve a request into concrete numbers and check they are free
pub fn resolve(conn: &Connection, view: &ContentView, request: VersionRequest) -> Result<(i64, i64)> {
    let view_id = view.require_id()?;
    let (major, minor) = match request {
        VersionRequest::Next => next_version(conn, view_id)?,
        VersionRequest::Explicit { major, minor } => {
            if major < 0 || minor < 0 {
                return Err(Error::InvalidInput(format!(
                    "Version numbers must not be negative: {}.{}",
                    major, minor
                )));
            }
            (major, minor)
        }
    };
    ensure_available(conn, view, major, minor)?;
    Ok((major, minor))
}

/// Fail with `VersionConflict` when `major.minor` already exists for the view
pub fn ensure_available(conn: &Connection, view: &ContentView, major: i64, minor: i64) -> Result<()> {
    if ContentViewVersion::find_by_number(conn, view.require_id()?, major, minor)?.is_some() {
        return Err(Error::VersionConflict {
            content_view: view.name.clone(),
            major,
            minor,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::{ContentViewFlags, Organization};

    fn view(conn: &Connection) -> ContentView {
        let mut org = Organization::new("Acme".to_string(), "acme".to_string());
        let org_id = org.insert(conn).unwrap();
        let mut view = ContentView::new(org_id, "base".to_string(), ContentViewFlags::default());
        view.insert(conn).unwrap();
        view
    }

    #[test]
    fn test_next_follows_latest_major() {
        let conn = db::open_in_memory().unwrap();
        let view = view(&conn);
        let id = view.require_id().unwrap();

        assert_eq!(resolve(&conn, &view, VersionRequest::Next).unwrap(), (1, 0));
        ContentViewVersion::new(id, 3, 2).insert(&conn).unwrap();
        assert_eq!(resolve(&conn, &view, VersionRequest::Next).unwrap(), (4, 0));
    }

    #[test]
    fn test_explicit_conflict_names_version() {
        let conn = db::open_in_memory().unwrap();
        let view = view(&conn);
        ContentViewVersion::new(view.require_id().unwrap(), 1, 0)
            .insert(&conn)
            .unwrap();

        let err = resolve(&conn, &view, VersionRequest::Explicit { major: 1, minor: 0 }).unwrap_err();
        assert_eq!(err.to_string(), "Content view version base 1.0 already exists");
        assert!(resolve(&conn, &view, VersionRequest::Explicit { major: 1, minor: 1 }).is_ok());
    }
}
