// src/commands/org.rs
//! Database and organization commands

use super::Session;
use anyhow::Result;
use cvflow::db;
use cvflow::db::models::Organization;
use cvflow::lifecycle;
use tracing::info;

pub fn cmd_init(session: &Session) -> Result<()> {
    let db_path = &session.config.db_path;
    info!("Initializing cvflow database at: {}", db_path);
    db::init(db_path)?;
    session.store()?;
    println!("Database initialized successfully at: {}", db_path);
    Ok(())
}

pub fn cmd_org_create(session: &Session, name: &str) -> Result<()> {
    let conn = session.open()?;
    let (org, _library) = lifecycle::create_organization(&conn, name)?;
    println!("Created organization {} (label: {})", org.name, org.label);
    Ok(())
}

pub fn cmd_org_list(session: &Session) -> Result<()> {
    let conn = session.open()?;
    let orgs = Organization::list_all(&conn)?;
    if orgs.is_empty() {
        println!("No organizations");
    } else {
        for org in orgs {
            println!("  {} ({})", org.name, org.label);
        }
    }
    Ok(())
}
