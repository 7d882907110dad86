// src/cli/org.rs
//! Organization commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum OrgCommands {
    /// Create an organization and its Library environment
    Create {
        /// Organization name
        name: String,
    },

    /// List organizations
    List,
}
