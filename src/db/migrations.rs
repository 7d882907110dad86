// src/db/migrations.rs
//! Database migration implementations
//!
//! Each function creates the tables for one schema version. They run inside a
//! transaction opened by `schema::migrate`.

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Initial schema - Version 1
///
/// Content lifecycle tables:
/// - organizations and their lifecycle environment paths
/// - content views, their repositories, filters and components
/// - content view versions and the repositories cloned for them
/// - content view environment bindings
pub fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE organizations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            label TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        -- Environments form paths rooted at the organization's Library
        CREATE TABLE lifecycle_environments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            organization_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            label TEXT NOT NULL,
            description TEXT,
            prior_id INTEGER,
            library INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(organization_id, name),
            UNIQUE(organization_id, label),
            CHECK((library = 1) = (prior_id IS NULL)),
            FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE,
            FOREIGN KEY (prior_id) REFERENCES lifecycle_environments(id)
        );

        CREATE UNIQUE INDEX idx_environments_library
            ON lifecycle_environments(organization_id) WHERE library = 1;
        CREATE INDEX idx_environments_prior ON lifecycle_environments(prior_id);

        CREATE TABLE content_views (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            organization_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            label TEXT NOT NULL,
            description TEXT,
            composite INTEGER NOT NULL DEFAULT 0,
            import_only INTEGER NOT NULL DEFAULT 0,
            solve_dependencies INTEGER NOT NULL DEFAULT 0,
            auto_publish INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(organization_id, name),
            UNIQUE(organization_id, label),
            CHECK(import_only = 0 OR (composite = 0 AND solve_dependencies = 0 AND auto_publish = 0)),
            CHECK(composite = 0 OR solve_dependencies = 0),
            CHECK(composite = 1 OR auto_publish = 0),
            FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
        );

        CREATE TABLE content_view_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_view_id INTEGER NOT NULL,
            major INTEGER NOT NULL,
            minor INTEGER NOT NULL DEFAULT 0,
            description TEXT,
            imported INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(content_view_id, major, minor),
            FOREIGN KEY (content_view_id) REFERENCES content_views(id) ON DELETE RESTRICT
        );

        CREATE INDEX idx_cvv_content_view ON content_view_versions(content_view_id);

        -- Repositories: library repositories have no version. Version clones
        -- point at the library repository they were cut from. Archive clones
        -- have no environment, environment clones do.
        CREATE TABLE repositories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            organization_id INTEGER NOT NULL,
            product TEXT NOT NULL,
            name TEXT NOT NULL,
            label TEXT NOT NULL,
            content_type TEXT NOT NULL CHECK(content_type IN ('yum', 'deb', 'file')),
            redhat INTEGER NOT NULL DEFAULT 0,
            backend_id TEXT NOT NULL UNIQUE,
            library_instance_id INTEGER,
            content_view_version_id INTEGER,
            environment_id INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK((library_instance_id IS NULL) = (content_view_version_id IS NULL)),
            FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE,
            FOREIGN KEY (library_instance_id) REFERENCES repositories(id),
            FOREIGN KEY (content_view_version_id) REFERENCES content_view_versions(id) ON DELETE CASCADE,
            FOREIGN KEY (environment_id) REFERENCES lifecycle_environments(id)
        );

        CREATE UNIQUE INDEX idx_library_repositories
            ON repositories(organization_id, product, name) WHERE library_instance_id IS NULL;
        CREATE INDEX idx_repositories_version ON repositories(content_view_version_id);
        CREATE INDEX idx_repositories_library_instance ON repositories(library_instance_id);

        CREATE TABLE content_view_repositories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_view_id INTEGER NOT NULL,
            repository_id INTEGER NOT NULL,
            UNIQUE(content_view_id, repository_id),
            FOREIGN KEY (content_view_id) REFERENCES content_views(id) ON DELETE CASCADE,
            FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE
        );

        CREATE TABLE content_view_filters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_view_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            inclusion INTEGER NOT NULL DEFAULT 0,
            unit_type TEXT NOT NULL,
            pattern TEXT NOT NULL,
            UNIQUE(content_view_id, name),
            FOREIGN KEY (content_view_id) REFERENCES content_views(id) ON DELETE CASCADE
        );

        -- Components of composite views: pinned to a version or following latest
        CREATE TABLE content_view_components (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            composite_content_view_id INTEGER NOT NULL,
            component_content_view_id INTEGER NOT NULL,
            content_view_version_id INTEGER,
            latest INTEGER NOT NULL DEFAULT 0,
            UNIQUE(composite_content_view_id, component_content_view_id),
            CHECK(latest = 1 OR content_view_version_id IS NOT NULL),
            FOREIGN KEY (composite_content_view_id) REFERENCES content_views(id) ON DELETE CASCADE,
            FOREIGN KEY (component_content_view_id) REFERENCES content_views(id),
            FOREIGN KEY (content_view_version_id) REFERENCES content_view_versions(id)
        );

        -- Component versions captured by each composite version
        CREATE TABLE content_view_version_components (
            composite_version_id INTEGER NOT NULL,
            component_version_id INTEGER NOT NULL,
            PRIMARY KEY (composite_version_id, component_version_id),
            FOREIGN KEY (composite_version_id) REFERENCES content_view_versions(id) ON DELETE CASCADE,
            FOREIGN KEY (component_version_id) REFERENCES content_view_versions(id)
        );

        CREATE TABLE content_view_environments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_view_id INTEGER NOT NULL,
            content_view_version_id INTEGER NOT NULL,
            environment_id INTEGER NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(content_view_id, environment_id),
            FOREIGN KEY (content_view_id) REFERENCES content_views(id),
            FOREIGN KEY (content_view_version_id) REFERENCES content_view_versions(id),
            FOREIGN KEY (environment_id) REFERENCES lifecycle_environments(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_cve_version ON content_view_environments(content_view_version_id);
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

/// Version 2: hosts and per-host fact tables
pub fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 2");

    conn.execute_batch(
        "
        CREATE TABLE hosts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            organization_id INTEGER NOT NULL,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
        );

        -- A host is assigned to one content view environment at a time
        CREATE TABLE host_content_view_environments (
            host_id INTEGER PRIMARY KEY,
            content_view_id INTEGER NOT NULL,
            environment_id INTEGER NOT NULL,
            FOREIGN KEY (host_id) REFERENCES hosts(id) ON DELETE CASCADE,
            FOREIGN KEY (content_view_id) REFERENCES content_views(id),
            FOREIGN KEY (environment_id) REFERENCES lifecycle_environments(id)
        );

        CREATE TABLE installed_packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            nvra TEXT NOT NULL,
            nvrea TEXT NOT NULL UNIQUE,
            epoch TEXT,
            version TEXT NOT NULL,
            release TEXT NOT NULL,
            arch TEXT NOT NULL,
            vendor TEXT
        );

        CREATE TABLE host_installed_packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            host_id INTEGER NOT NULL,
            installed_package_id INTEGER NOT NULL,
            UNIQUE(host_id, installed_package_id),
            FOREIGN KEY (host_id) REFERENCES hosts(id) ON DELETE CASCADE,
            FOREIGN KEY (installed_package_id) REFERENCES installed_packages(id)
        );

        CREATE TABLE available_module_streams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            stream TEXT NOT NULL,
            context TEXT NOT NULL DEFAULT '',
            UNIQUE(name, stream, context)
        );

        CREATE TABLE host_available_module_streams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            host_id INTEGER NOT NULL,
            available_module_stream_id INTEGER NOT NULL,
            status TEXT,
            installed_profiles TEXT NOT NULL DEFAULT '[]',
            UNIQUE(host_id, available_module_stream_id),
            FOREIGN KEY (host_id) REFERENCES hosts(id) ON DELETE CASCADE,
            FOREIGN KEY (available_module_stream_id) REFERENCES available_module_streams(id)
        );

        CREATE TABLE installed_debs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            architecture TEXT NOT NULL,
            UNIQUE(name, version, architecture)
        );

        CREATE TABLE host_installed_debs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            host_id INTEGER NOT NULL,
            installed_deb_id INTEGER NOT NULL,
            UNIQUE(host_id, installed_deb_id),
            FOREIGN KEY (host_id) REFERENCES hosts(id) ON DELETE CASCADE,
            FOREIGN KEY (installed_deb_id) REFERENCES installed_debs(id)
        );

        CREATE TABLE host_traces (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            host_id INTEGER NOT NULL,
            application TEXT NOT NULL,
            helper TEXT NOT NULL,
            app_type TEXT NOT NULL,
            FOREIGN KEY (host_id) REFERENCES hosts(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_host_traces_host ON host_traces(host_id);
        ",
    )?;

    info!("Schema version 2 created successfully");
    Ok(())
}

/// Version 3: activation keys and content overrides
pub fn migrate_v3(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 3");

    conn.execute_batch(
        "
        CREATE TABLE activation_keys (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            organization_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            content_view_id INTEGER,
            environment_id INTEGER,
            UNIQUE(organization_id, name),
            CHECK((content_view_id IS NULL) = (environment_id IS NULL)),
            FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE,
            FOREIGN KEY (content_view_id) REFERENCES content_views(id),
            FOREIGN KEY (environment_id) REFERENCES lifecycle_environments(id)
        );

        -- Exactly one owner per override; one override per owner and label
        CREATE TABLE content_overrides (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            host_id INTEGER,
            activation_key_id INTEGER,
            content_label TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT 'enabled',
            value TEXT NOT NULL CHECK(value IN ('enabled', 'disabled')),
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK((host_id IS NULL) != (activation_key_id IS NULL)),
            UNIQUE(host_id, content_label),
            UNIQUE(activation_key_id, content_label),
            FOREIGN KEY (host_id) REFERENCES hosts(id) ON DELETE CASCADE,
            FOREIGN KEY (activation_key_id) REFERENCES activation_keys(id) ON DELETE CASCADE
        );
        ",
    )?;

    info!("Schema version 3 created successfully");
    Ok(())
}
