// src/commands/env.rs
//! Lifecycle environment commands

use super::{Session, find_env, find_org};
use anyhow::Result;
use cvflow::db::models::LifecycleEnvironment;
use cvflow::lifecycle;
use std::collections::HashMap;

pub fn cmd_env_create(session: &Session, org: &str, name: &str, prior: &str) -> Result<()> {
    let conn = session.open()?;
    let org = find_org(&conn, org)?;
    let prior = find_env(&conn, &org, prior)?;
    let env = lifecycle::create_environment(&conn, org.require_id()?, name, prior.require_id()?)?;
    println!("Created environment {} after {}", env.name, prior.name);
    Ok(())
}

pub fn cmd_env_list(session: &Session, org: &str) -> Result<()> {
    let conn = session.open()?;
    let org = find_org(&conn, org)?;
    let envs = LifecycleEnvironment::list_for_organization(&conn, org.require_id()?)?;
    let names: HashMap<i64, String> = envs
        .iter()
        .filter_map(|e| e.id.map(|id| (id, e.name.clone())))
        .collect();

    println!("Environments in {}:", org.name);
    for env in &envs {
        match env.prior_id.and_then(|id| names.get(&id)) {
            Some(prior) => println!("  {} ({}) after {}", env.name, env.label, prior),
            None => println!("  {} ({})", env.name, env.label),
        }
    }
    Ok(())
}
