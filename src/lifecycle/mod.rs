// src/lifecycle/mod.rs

//! Content view version lifecycle
//!
//! Publish cuts a version, promote moves it along an environment path,
//! import and export carry versions between systems, and removal takes them
//! out of service.

pub mod compatibility;
pub mod export;
pub mod import;
pub mod promote;
pub mod publish;
pub mod removal;
pub mod version;

pub use compatibility::{MappedRepository, check};
pub use export::{ExportMetadata, ExportedRepository, ExportedVersion, export_version};
pub use import::{ImportOutcome, import, import_from_dir, plan_import};
pub use promote::{PromoteOutcome, PromoteRequest, plan_promote, promote};
pub use publish::{PublishOutcome, PublishRequest, plan_publish, publish};
pub use removal::{RemovalOutcome, delete_version, remove_from_environment};
pub use version::VersionRequest;

use crate::db::models::{LifecycleEnvironment, Organization, labelize};
use crate::error::Result;
use rusqlite::Connection;
use tracing::info;

/// Create an organization together with its Library environment
pub fn create_organization(conn: &Connection, name: &str) -> Result<(Organization, LifecycleEnvironment)> {
    let tx = conn.unchecked_transaction()?;
    let mut org = Organization::new(name.to_string(), labelize(name));
    let org_id = org.insert(&tx)?;
    let mut library = LifecycleEnvironment::library(org_id);
    library.insert(&tx)?;
    tx.commit()?;

    info!("Created organization {}", name);
    Ok((org, library))
}

/// Append an environment to a promotion path after `prior_id`
pub fn create_environment(conn: &Connection, organization_id: i64, name: &str, prior_id: i64) -> Result<LifecycleEnvironment> {
    let mut env = LifecycleEnvironment::new(organization_id, name.to_string(), labelize(name), prior_id);
    env.insert(conn)?;
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_organization_gets_library() {
        let conn = db::open_in_memory().unwrap();
        let (org, library) = create_organization(&conn, "Acme Corp").unwrap();
        let org_id = org.id.unwrap();

        assert_eq!(org.label, "Acme_Corp");
        assert_eq!(LifecycleEnvironment::find_library(&conn, org_id).unwrap(), library);

        let dev = create_environment(&conn, org_id, "Dev", library.id.unwrap()).unwrap();
        assert_eq!(dev.prior(&conn).unwrap().unwrap().id, library.id);
    }
}
