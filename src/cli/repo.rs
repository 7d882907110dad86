// src/cli/repo.rs
//! Library repository commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum RepoCommands {
    /// Create a library repository
    Create {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Product the repository belongs to
        product: String,

        /// Repository name
        name: String,

        /// Content type: yum, deb or file
        #[arg(long, default_value = "yum")]
        content_type: String,

        /// Mark as vendor-provided content
        #[arg(long)]
        redhat: bool,
    },

    /// Load units into a library repository from a JSON unit listing
    Sync {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Repository label
        repo: String,

        /// Unit listing file in export format ({"units": [...]})
        listing: String,
    },

    /// List library repositories
    List {
        /// Organization label
        #[arg(short, long)]
        org: String,
    },
}
