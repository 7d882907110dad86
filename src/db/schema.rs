// src/db/schema.rs

//! Schema version tracking for the cvflow database
//!
//! Each migration is applied once, in order, and recorded in `schema_version`.
//! The individual migrations live in `migrations.rs`.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use super::migrations;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 3;

fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database (0 for a fresh file)
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date (version {})", current_version);
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        conn.execute_batch("BEGIN")?;
        let applied = apply_migration(conn, version).and_then(|()| set_schema_version(conn, version));
        match applied {
            Ok(()) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                conn.execute_batch("ROLLBACK")?;
                return Err(e);
            }
        }
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrations::migrate_v1(conn),
        2 => migrations::migrate_v2(conn),
        3 => migrations::migrate_v3(conn),
        _ => Err(Error::InvalidInput(format!(
            "Unknown migration version: {}",
            version
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        (temp_file, conn)
    }

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_schema_version_tracking() {
        let (_temp, conn) = create_test_db();

        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        set_schema_version(&conn, 1).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_migrate_creates_all_tables() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        let tables = table_names(&conn);
        for expected in [
            "organizations",
            "lifecycle_environments",
            "content_views",
            "content_view_versions",
            "content_view_environments",
            "repositories",
            "hosts",
            "host_installed_packages",
            "host_available_module_streams",
            "host_installed_debs",
            "host_traces",
            "activation_keys",
            "content_overrides",
            "schema_version",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let (_temp, conn) = create_test_db();

        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_version_numbers_unique_per_view() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        conn.execute_batch(
            "INSERT INTO organizations (name, label) VALUES ('Acme', 'acme');
             INSERT INTO content_views (organization_id, name, label) VALUES (1, 'Base', 'base');
             INSERT INTO content_view_versions (content_view_id, major, minor) VALUES (1, 1, 0);",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO content_view_versions (content_view_id, major, minor) VALUES (1, 1, 0)",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_content_view_flag_constraints() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO organizations (name, label) VALUES ('Acme', 'acme')",
            [],
        )
        .unwrap();

        let import_only_composite = conn.execute(
            "INSERT INTO content_views (organization_id, name, label, composite, import_only)
             VALUES (1, 'Bad', 'bad', 1, 1)",
            [],
        );
        assert!(import_only_composite.is_err());

        let auto_publish_plain = conn.execute(
            "INSERT INTO content_views (organization_id, name, label, auto_publish)
             VALUES (1, 'Bad2', 'bad2', 1)",
            [],
        );
        assert!(auto_publish_plain.is_err());
    }

    #[test]
    fn test_override_requires_single_owner() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        let orphan = conn.execute(
            "INSERT INTO content_overrides (content_label, value) VALUES ('rhel-baseos', 'enabled')",
            [],
        );
        assert!(orphan.is_err());
    }
}
