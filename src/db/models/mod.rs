// src/db/models/mod.rs

//! Data models for cvflow database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.

mod activation_key;
mod binding;
mod content_override;
mod content_view;
mod environment;
mod host;
mod installed;
mod organization;
mod repository;
mod version;

pub use activation_key::ActivationKey;
pub use binding::ContentViewEnvironment;
pub use content_override::{ContentOverride, OverrideOwner, OverrideState};
pub use content_view::{ContentView, ContentViewComponent, ContentViewFilter, ContentViewFlags, labelize};
pub use environment::{LIBRARY_NAME, LifecycleEnvironment};
pub use host::{Host, HostContentAssignment};
pub use installed::{
    AssociationTable, AvailableModuleStream, HostAssociation, HostModuleStream, HostTrace, InstalledDeb,
    InstalledPackage,
};
pub use organization::Organization;
pub use repository::{ContentType, Repository};
pub use version::ContentViewVersion;

/// "?, ?, ?" with `n` placeholders for IN lists
pub(crate) fn sql_placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_placeholders() {
        assert_eq!(sql_placeholders(1), "?");
        assert_eq!(sql_placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_organization_roundtrip() {
        let conn = crate::db::open_in_memory().unwrap();
        let mut org = Organization::new("Acme Corp".to_string(), "acme".to_string());
        let id = org.insert(&conn).unwrap();

        let found = Organization::find_by_label(&conn, "acme").unwrap().unwrap();
        assert_eq!(found.id, Some(id));
        assert_eq!(found.name, "Acme Corp");
        assert_eq!(Organization::list_all(&conn).unwrap().len(), 1);
    }
}
