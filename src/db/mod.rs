// src/db/mod.rs

//! Database layer
//!
//! All lifecycle state lives in a single SQLite database. Uniqueness rules the
//! engine depends on (version numbers per content view, one binding per
//! content view and environment) are enforced here as UNIQUE constraints.

pub mod migrations;
pub mod models;
pub mod paths;
pub mod schema;

use crate::error::Result;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How long SQLite waits on a locked database before returning SQLITE_BUSY
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

/// Create the database file (and its parent directory) and apply migrations
pub fn init(db_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = open(db_path)?;
    schema::migrate(&conn)?;
    info!("Database ready at {}", db_path);
    Ok(())
}

/// Open an existing database with the connection settings the engine expects
pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    Ok(conn)
}

/// Open a private in-memory database, fully migrated
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

/// Run `f` inside a transaction, committing on success and rolling back on error
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_database() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state").join("cvflow.db");
        let path = path.to_str().unwrap();

        init(path).unwrap();
        assert!(Path::new(path).exists());

        let conn = open(path).unwrap();
        assert_eq!(
            schema::get_schema_version(&conn).unwrap(),
            schema::SCHEMA_VERSION
        );
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut conn = open_in_memory().unwrap();

        let result: Result<()> = transaction(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO organizations (name, label) VALUES ('Acme', 'acme')",
                [],
            )?;
            Err(crate::Error::InvalidInput("abort".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM organizations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
