// src/cli/env.rs
//! Lifecycle environment commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum EnvCommands {
    /// Create an environment after an existing one
    Create {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Environment name
        name: String,

        /// Label of the environment it follows
        #[arg(long, default_value = "Library")]
        prior: String,
    },

    /// List environments of an organization
    List {
        /// Organization label
        #[arg(short, long)]
        org: String,
    },
}
