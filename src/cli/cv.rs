// src/cli/cv.rs
//! Content view definition and version commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum CvCommands {
    /// Create a content view
    Create {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Content view name
        name: String,

        /// Aggregate other content views instead of repositories
        #[arg(long)]
        composite: bool,

        /// Only receive versions through import
        #[arg(long)]
        import_only: bool,

        /// Resolve dependencies when filtering
        #[arg(long)]
        solve_dependencies: bool,

        /// Republish automatically when a component publishes (composites only)
        #[arg(long)]
        auto_publish: bool,

        /// Description
        #[arg(long)]
        description: Option<String>,
    },

    /// Add a library repository to a content view
    AddRepo {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Content view label
        view: String,

        /// Repository label
        repo: String,
    },

    /// Add a unit filter to a content view
    AddFilter {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Content view label
        view: String,

        /// Filter name
        name: String,

        /// Glob matched against unit names
        pattern: String,

        /// Unit type: rpm, erratum, module_stream, deb, file
        #[arg(long = "type", default_value = "rpm")]
        unit_type: String,

        /// Exclude matching units instead of including them
        #[arg(long)]
        exclude: bool,
    },

    /// Add a component view to a composite content view
    AddComponent {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Composite content view label
        composite: String,

        /// Component content view label
        component: String,

        /// Pin a version (MAJOR.MINOR) instead of following the latest
        #[arg(long)]
        version: Option<String>,
    },

    /// List content views of an organization
    List {
        /// Organization label
        #[arg(short, long)]
        org: String,
    },

    /// List versions of a content view and where they are bound
    Versions {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Content view label
        view: String,
    },

    /// Remove a content view's version from an environment
    RemoveFromEnv {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Content view label
        view: String,

        /// Environment label
        env: String,
    },

    /// Delete an unbound version
    DeleteVersion {
        /// Organization label
        #[arg(short, long)]
        org: String,

        /// Content view label
        view: String,

        /// Version number as MAJOR.MINOR
        version: String,
    },
}
