// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, CvCommands, EnvCommands, HostCommands, OrgCommands, RepoCommands};
use commands::{CreateViewArgs, PublishArgs, Session};
use cvflow::db::models::ContentViewFlags;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let Some(command) = cli.command else {
        // No command provided, show help
        println!("cvflow v{}", env!("CARGO_PKG_VERSION"));
        println!("Run 'cvflow --help' for usage information");
        return Ok(());
    };

    let session = Session::new(&cli.config, cli.db_path)?;

    match command {
        Commands::Init => commands::cmd_init(&session),
        Commands::Publish {
            org,
            view,
            version,
            env,
            incremental,
            description,
        } => commands::cmd_publish(
            &session,
            PublishArgs {
                org: &org,
                view: &view,
                version: version.as_deref(),
                env: env.as_deref(),
                incremental,
                description,
            },
        ),
        Commands::Promote {
            org,
            view,
            version,
            env,
            force,
        } => commands::cmd_promote(&session, &org, &view, &version, &env, force),
        Commands::Export {
            org,
            view,
            version,
            dest,
        } => commands::cmd_export(&session, &org, &view, &version, dest.as_deref()),
        Commands::Import { org, view, path } => commands::cmd_import(&session, &org, &view, &path),
        Commands::Recover => commands::cmd_recover(&session),

        Commands::Org(cmd) => match cmd {
            OrgCommands::Create { name } => commands::cmd_org_create(&session, &name),
            OrgCommands::List => commands::cmd_org_list(&session),
        },

        Commands::Env(cmd) => match cmd {
            EnvCommands::Create { org, name, prior } => commands::cmd_env_create(&session, &org, &name, &prior),
            EnvCommands::List { org } => commands::cmd_env_list(&session, &org),
        },

        Commands::Repo(cmd) => match cmd {
            RepoCommands::Create {
                org,
                product,
                name,
                content_type,
                redhat,
            } => commands::cmd_repo_create(&session, &org, &product, &name, &content_type, redhat),
            RepoCommands::Sync { org, repo, listing } => commands::cmd_repo_sync(&session, &org, &repo, &listing),
            RepoCommands::List { org } => commands::cmd_repo_list(&session, &org),
        },

        Commands::Cv(cmd) => match cmd {
            CvCommands::Create {
                org,
                name,
                composite,
                import_only,
                solve_dependencies,
                auto_publish,
                description,
            } => commands::cmd_cv_create(
                &session,
                CreateViewArgs {
                    org: &org,
                    name: &name,
                    flags: ContentViewFlags {
                        composite,
                        import_only,
                        solve_dependencies,
                        auto_publish,
                    },
                    description,
                },
            ),
            CvCommands::AddRepo { org, view, repo } => commands::cmd_cv_add_repo(&session, &org, &view, &repo),
            CvCommands::AddFilter {
                org,
                view,
                name,
                pattern,
                unit_type,
                exclude,
            } => commands::cmd_cv_add_filter(&session, &org, &view, &name, &pattern, &unit_type, exclude),
            CvCommands::AddComponent {
                org,
                composite,
                component,
                version,
            } => commands::cmd_cv_add_component(&session, &org, &composite, &component, version.as_deref()),
            CvCommands::List { org } => commands::cmd_cv_list(&session, &org),
            CvCommands::Versions { org, view } => commands::cmd_cv_versions(&session, &org, &view),
            CvCommands::RemoveFromEnv { org, view, env } => {
                commands::cmd_cv_remove_from_env(&session, &org, &view, &env)
            }
            CvCommands::DeleteVersion { org, view, version } => {
                commands::cmd_cv_delete_version(&session, &org, &view, &version)
            }
        },

        Commands::Host(cmd) => match cmd {
            HostCommands::Register { org, name } => commands::cmd_host_register(&session, &org, &name),
            HostCommands::Assign { host, view, env } => {
                commands::cmd_host_assign(&session, &host, view.as_deref(), env.as_deref())
            }
            HostCommands::ImportPackages { host, file } => commands::cmd_host_import_packages(&session, &host, &file),
            HostCommands::ImportModules { host, file } => commands::cmd_host_import_modules(&session, &host, &file),
            HostCommands::ImportTraces { host, file } => commands::cmd_host_import_traces(&session, &host, &file),
            HostCommands::ImportDebs { host, file } => commands::cmd_host_import_debs(&session, &host, &file),
            HostCommands::Reconcile { file } => commands::cmd_host_reconcile(&session, &file),
            HostCommands::Override {
                host,
                overrides,
                prune_invalid,
            } => commands::cmd_host_override(&session, &host, &overrides, prune_invalid),
            HostCommands::Show { host } => commands::cmd_host_show(&session, &host),
        },
    }
}
