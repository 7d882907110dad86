// src/db/models/installed.rs

//! Catalog rows for reported host content and their per-host associations
//!
//! Catalog rows (packages, debs, module streams) are shared between hosts and
//! never deleted by reconciliation. Association rows are per host.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::sql_placeholders;

/// Largest IN (...) list sent in one statement
pub(crate) const CHUNK_SIZE: usize = 500;

/// A package installed on at least one host, unique by nvrea
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub id: Option<i64>,
    pub name: String,
    pub nvra: String,
    pub nvrea: String,
    pub epoch: Option<String>,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub vendor: Option<String>,
}

impl InstalledPackage {
    /// Insert unless a row with the same nvrea exists
    pub fn insert_or_ignore(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO installed_packages (name, nvra, nvrea, epoch, version, release, arch, vendor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(nvrea) DO NOTHING",
            params![
                &self.name,
                &self.nvra,
                &self.nvrea,
                &self.epoch,
                &self.version,
                &self.release,
                &self.arch,
                &self.vendor,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_nvreas(conn: &Connection, nvreas: &[String]) -> Result<Vec<Self>> {
        let mut found = Vec::with_capacity(nvreas.len());
        for chunk in nvreas.chunks(CHUNK_SIZE) {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, name, nvra, nvrea, epoch, version, release, arch, vendor
                 FROM installed_packages WHERE nvrea IN ({})",
                sql_placeholders(chunk.len())
            ))?;
            let rows = stmt
                .query_map(params_from_iter(chunk.iter()), Self::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            found.extend(rows);
        }
        Ok(found)
    }

    /// Fill in the vendor of a row that has none; rows with a vendor are left alone
    pub fn backfill_vendor(conn: &Connection, nvrea: &str, vendor: &str) -> Result<bool> {
        let updated = conn.execute(
            "UPDATE installed_packages SET vendor = ?1 WHERE nvrea = ?2 AND vendor IS NULL",
            params![vendor, nvrea],
        )?;
        Ok(updated > 0)
    }

    /// Packages associated with a host, ordered by nvrea
    pub fn list_for_host(conn: &Connection, host_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT p.id, p.name, p.nvra, p.nvrea, p.epoch, p.version, p.release, p.arch, p.vendor
             FROM installed_packages p
             JOIN host_installed_packages hp ON hp.installed_package_id = p.id
             WHERE hp.host_id = ?1 ORDER BY p.nvrea",
        )?;
        let packages = stmt
            .query_map([host_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(packages)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            nvra: row.get(2)?,
            nvrea: row.get(3)?,
            epoch: row.get(4)?,
            version: row.get(5)?,
            release: row.get(6)?,
            arch: row.get(7)?,
            vendor: row.get(8)?,
        })
    }
}

/// Association row between a host and a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostAssociation {
    /// Id of the association row itself
    pub id: i64,
    pub host_id: i64,
    /// Id of the catalog row (package or deb)
    pub entity_id: i64,
}

/// Association tables that follow the (host_id, entity_id) shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationTable {
    Packages,
    Debs,
}

impl AssociationTable {
    fn table(self) -> &'static str {
        match self {
            Self::Packages => "host_installed_packages",
            Self::Debs => "host_installed_debs",
        }
    }

    fn entity_column(self) -> &'static str {
        match self {
            Self::Packages => "installed_package_id",
            Self::Debs => "installed_deb_id",
        }
    }

    pub fn list_for_host(self, conn: &Connection, host_id: i64) -> Result<Vec<HostAssociation>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, host_id, {} FROM {} WHERE host_id = ?1 ORDER BY id",
            self.entity_column(),
            self.table()
        ))?;
        let rows = stmt
            .query_map([host_id], |row| {
                Ok(HostAssociation {
                    id: row.get(0)?,
                    host_id: row.get(1)?,
                    entity_id: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// One DELETE for all removed entities of a host
    pub fn delete_for_host(self, conn: &Connection, host_id: i64, entity_ids: &[i64]) -> Result<usize> {
        let mut deleted = 0;
        for chunk in entity_ids.chunks(CHUNK_SIZE) {
            let sql = format!(
                "DELETE FROM {} WHERE host_id = ? AND {} IN ({})",
                self.table(),
                self.entity_column(),
                sql_placeholders(chunk.len())
            );
            let values = std::iter::once(host_id).chain(chunk.iter().copied());
            deleted += conn.execute(&sql, params_from_iter(values))?;
        }
        Ok(deleted)
    }

    /// One multi-row INSERT for all added entities of a host
    pub fn insert_for_host(self, conn: &Connection, host_id: i64, entity_ids: &[i64]) -> Result<usize> {
        let mut inserted = 0;
        for chunk in entity_ids.chunks(CHUNK_SIZE) {
            let rows = vec!["(?, ?)"; chunk.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} (host_id, {}) VALUES {}",
                self.table(),
                self.entity_column(),
                rows
            );
            let values = chunk.iter().flat_map(|&id| [host_id, id]);
            inserted += conn.execute(&sql, params_from_iter(values))?;
        }
        Ok(inserted)
    }
}

/// A deb package installed on at least one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledDeb {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub architecture: String,
}

impl InstalledDeb {
    /// Create the catalog row if needed and return its id
    pub fn find_or_create(conn: &Connection, name: &str, version: &str, architecture: &str) -> Result<i64> {
        conn.execute(
            "INSERT INTO installed_debs (name, version, architecture) VALUES (?1, ?2, ?3)
             ON CONFLICT(name, version, architecture) DO NOTHING",
            params![name, version, architecture],
        )?;
        let id = conn.query_row(
            "SELECT id FROM installed_debs WHERE name = ?1 AND version = ?2 AND architecture = ?3",
            params![name, version, architecture],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn list_for_host(conn: &Connection, host_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT d.id, d.name, d.version, d.architecture
             FROM installed_debs d
             JOIN host_installed_debs hd ON hd.installed_deb_id = d.id
             WHERE hd.host_id = ?1 ORDER BY d.name, d.version",
        )?;
        let debs = stmt
            .query_map([host_id], |row| {
                Ok(Self {
                    id: Some(row.get(0)?),
                    name: row.get(1)?,
                    version: row.get(2)?,
                    architecture: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(debs)
    }
}

/// A module stream known to be available on at least one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableModuleStream {
    pub id: i64,
    pub name: String,
    pub stream: String,
    pub context: String,
}

impl AvailableModuleStream {
    /// Create the catalog row if needed and return it
    pub fn find_or_create(conn: &Connection, name: &str, stream: &str, context: &str) -> Result<Self> {
        conn.execute(
            "INSERT INTO available_module_streams (name, stream, context) VALUES (?1, ?2, ?3)
             ON CONFLICT(name, stream, context) DO NOTHING",
            params![name, stream, context],
        )?;
        let row = conn.query_row(
            "SELECT id, name, stream, context FROM available_module_streams
             WHERE name = ?1 AND stream = ?2 AND context = ?3",
            params![name, stream, context],
            |row| {
                Ok(Self {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    stream: row.get(2)?,
                    context: row.get(3)?,
                })
            },
        )?;
        Ok(row)
    }
}

/// Per-host state of an available module stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostModuleStream {
    pub id: Option<i64>,
    pub host_id: i64,
    pub available_module_stream_id: i64,
    pub status: Option<String>,
    pub installed_profiles: Vec<String>,
}

impl HostModuleStream {
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO host_available_module_streams
                (host_id, available_module_stream_id, status, installed_profiles)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.host_id,
                self.available_module_stream_id,
                &self.status,
                serde_json::to_string(&self.installed_profiles)?,
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn update(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE host_available_module_streams SET status = ?1, installed_profiles = ?2
             WHERE host_id = ?3 AND available_module_stream_id = ?4",
            params![
                &self.status,
                serde_json::to_string(&self.installed_profiles)?,
                self.host_id,
                self.available_module_stream_id,
            ],
        )?;
        Ok(())
    }

    pub fn find(conn: &Connection, host_id: i64, stream_id: i64) -> Result<Option<Self>> {
        let row = conn
            .query_row(
                "SELECT id, host_id, available_module_stream_id, status, installed_profiles
                 FROM host_available_module_streams
                 WHERE host_id = ?1 AND available_module_stream_id = ?2",
                params![host_id, stream_id],
                Self::from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_for_host(conn: &Connection, host_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, host_id, available_module_stream_id, status, installed_profiles
             FROM host_available_module_streams WHERE host_id = ?1 ORDER BY available_module_stream_id",
        )?;
        let rows = stmt
            .query_map([host_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_for_streams(conn: &Connection, host_id: i64, stream_ids: &[i64]) -> Result<usize> {
        let mut deleted = 0;
        for chunk in stream_ids.chunks(CHUNK_SIZE) {
            let sql = format!(
                "DELETE FROM host_available_module_streams
                 WHERE host_id = ? AND available_module_stream_id IN ({})",
                sql_placeholders(chunk.len())
            );
            let values = std::iter::once(host_id).chain(chunk.iter().copied());
            deleted += conn.execute(&sql, params_from_iter(values))?;
        }
        Ok(deleted)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let profiles: String = row.get(4)?;
        Ok(Self {
            id: Some(row.get(0)?),
            host_id: row.get(1)?,
            available_module_stream_id: row.get(2)?,
            status: row.get(3)?,
            installed_profiles: serde_json::from_str(&profiles).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
            })?,
        })
    }
}

/// A process or service on a host that needs restarting after an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTrace {
    pub id: Option<i64>,
    pub host_id: i64,
    pub application: String,
    pub helper: String,
    pub app_type: String,
}

impl HostTrace {
    pub fn delete_for_host(conn: &Connection, host_id: i64) -> Result<usize> {
        let deleted = conn.execute("DELETE FROM host_traces WHERE host_id = ?1", [host_id])?;
        Ok(deleted)
    }

    /// Insert many traces with one statement per chunk
    pub fn insert_all(conn: &Connection, traces: &[HostTrace]) -> Result<usize> {
        let mut inserted = 0;
        for chunk in traces.chunks(CHUNK_SIZE) {
            let rows = vec!["(?, ?, ?, ?)"; chunk.len()].join(", ");
            let sql = format!(
                "INSERT INTO host_traces (host_id, application, helper, app_type) VALUES {}",
                rows
            );
            let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(chunk.len() * 4);
            for trace in chunk {
                values.push(trace.host_id.into());
                values.push(trace.application.clone().into());
                values.push(trace.helper.clone().into());
                values.push(trace.app_type.clone().into());
            }
            inserted += conn.execute(&sql, params_from_iter(values))?;
        }
        Ok(inserted)
    }

    pub fn list_for_host(conn: &Connection, host_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, host_id, application, helper, app_type
             FROM host_traces WHERE host_id = ?1 ORDER BY application",
        )?;
        let traces = stmt
            .query_map([host_id], |row| {
                Ok(Self {
                    id: Some(row.get(0)?),
                    host_id: row.get(1)?,
                    application: row.get(2)?,
                    helper: row.get(3)?,
                    app_type: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(traces)
    }
}
