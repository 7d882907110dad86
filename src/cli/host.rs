// src/cli/host.rs
//! Host commands
//!
//! Fact files are JSON arrays in the format hosts report them.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum HostCommands {
    /// Register a host with an organization
    Register {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Host name
        name: String,
    },

    /// Assign a host to a content view in an environment
    Assign {
        /// Host name
        host: String,

        /// Content view label (inherited from the current assignment if omitted)
        #[arg(long)]
        view: Option<String>,

        /// Environment label (inherited from the current assignment if omitted)
        #[arg(long)]
        env: Option<String>,
    },

    /// Import an installed package profile
    ImportPackages {
        /// Host name
        host: String,

        /// JSON file with the package list
        file: String,
    },

    /// Import module stream facts
    ImportModules {
        /// Host name
        host: String,

        /// JSON file with the module stream list
        file: String,
    },

    /// Import tracer output
    ImportTraces {
        /// Host name
        host: String,

        /// JSON file with the trace list
        file: String,
    },

    /// Import an installed deb profile
    ImportDebs {
        /// Host name
        host: String,

        /// JSON file with the deb list
        file: String,
    },

    /// Reconcile a batch of host reports in parallel
    Reconcile {
        /// JSON file with an array of host reports
        file: String,
    },

    /// Set content overrides as LABEL=enabled|disabled|default
    Override {
        /// Host name
        host: String,

        /// Overrides to apply, in order
        #[arg(required = true)]
        overrides: Vec<String>,

        /// Also remove overrides for content the host can no longer see
        #[arg(long)]
        prune_invalid: bool,
    },

    /// Show a host's assignment, content counts and trace status
    Show {
        /// Host name
        host: String,
    },
}
