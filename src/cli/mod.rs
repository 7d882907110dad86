// src/cli/mod.rs
//! CLI definitions for cvflow
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Lifecycle commands sit at the root:
//! - `publish` / `promote` - cut a version and move it along a path
//! - `export` / `import` - carry a version between systems
//! - `recover` - finish or abort plans interrupted by a crash
//!
//! Management contexts:
//! - `org`, `env` - organizations and lifecycle environments
//! - `repo` - library repositories
//! - `cv` - content view definitions and versions
//! - `host` - hosts and their reported content

use clap::{Parser, Subcommand};

mod cv;
mod env;
mod host;
mod org;
mod repo;

pub use cv::CvCommands;
pub use env::EnvCommands;
pub use host::HostCommands;
pub use org::OrgCommands;
pub use repo::RepoCommands;

#[derive(Parser)]
#[command(name = "cvflow")]
#[command(version)]
#[command(about = "Content view lifecycle engine", long_about = None)]
pub struct Cli {
    /// Path to the engine configuration file
    #[arg(short, long, global = true, default_value = "/etc/cvflow/config.toml")]
    pub config: String,

    /// Path to the database file (overrides the configuration)
    #[arg(short, long, global = true)]
    pub db_path: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the cvflow database
    Init,

    /// Publish a new version of a content view
    Publish {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Content view label
        view: String,

        /// Explicit version number as MAJOR.MINOR (default: next major)
        #[arg(long)]
        version: Option<String>,

        /// Environment label to publish into (default: Library)
        #[arg(long)]
        env: Option<String>,

        /// Seed clones from the previous version instead of copying from scratch
        #[arg(long)]
        incremental: bool,

        /// Version description
        #[arg(long)]
        description: Option<String>,
    },

    /// Promote a version to the next environment of its path
    Promote {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Content view label
        view: String,

        /// Version number as MAJOR.MINOR
        version: String,

        /// Target environment label
        env: String,

        /// Skip the promotion path check
        #[arg(long)]
        force: bool,
    },

    /// Export a version into a directory
    Export {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Content view label
        view: String,

        /// Version number as MAJOR.MINOR
        version: String,

        /// Destination directory (default: <export dir>/<view>-<version>)
        #[arg(long)]
        dest: Option<String>,
    },

    /// Import an exported version into an import-only content view
    Import {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Content view label
        view: String,

        /// Export directory
        path: String,
    },

    /// Complete or abort plans left unfinished by a crash
    Recover,

    /// Organization management
    #[command(subcommand)]
    Org(OrgCommands),

    /// Lifecycle environment management
    #[command(subcommand)]
    Env(EnvCommands),

    /// Library repository management
    #[command(subcommand)]
    Repo(RepoCommands),

    /// Content view management
    #[command(subcommand)]
    Cv(CvCommands),

    /// Host management and fact import
    #[command(subcommand)]
    Host(HostCommands),
}
