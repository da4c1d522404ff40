//! permsync command-line interface

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use permsync::core::engine::{AdminOverrideScope, ReconcileEngine, ReconcileOptions};
use permsync::directory::{DirectoryClient, DirectoryService, RestDirectory};
use permsync::drivers::{self, permission_syncer::SyncFlags};
use permsync::{Config, TopologyCache};

#[derive(Parser)]
#[command(name = "permsync", version, about = "Synchronize users, permissions, and team memberships against a project-management directory service")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "permsync.yaml", env = "PERMSYNC_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply one permission grant per input row
    LoadPermissions {
        /// Delimited input file (UserName, PermissionType, ..., ObjectID)
        file: PathBuf,
    },
    /// Mirror a source user's permissions onto a target user, per input row
    SyncPermissions {
        /// Delimited input file (TargetUserID, SourceUserID)
        file: PathBuf,
    },
    /// Grant a role on one project to every enabled user (upgrade-only)
    GrantProjectAccess {
        /// Project name or object id
        project: String,
        /// Role to grant (Viewer, Editor, Admin, No Access)
        role: String,
    },
    /// Reconcile a project's current users to one role
    UpdateProjectUsers {
        /// Project name or object id
        project: String,
        /// Role to apply (Viewer, Editor, Admin, No Access)
        role: String,
    },
    /// Enable or disable users per input row
    SetUserStatus {
        /// Delimited input file (UserName, Disabled)
        file: PathBuf,
    },
    /// Force a rebuild of the workspace/project cache
    RefreshCache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    permsync::utils::logging::init(&config.logging)?;

    info!(
        "Connecting to {} as {}",
        config.service.base_url, config.service.username
    );
    let service: Arc<dyn DirectoryService> = Arc::new(RestDirectory::new(&config.service)?);
    let topology = Arc::new(TopologyCache::new(&config.cache.dir, config.cache.policy()));

    if matches!(cli.command, Command::RefreshCache) {
        info!("Rebuilding workspace/project cache from the directory service");
        topology.refresh(service.as_ref()).await?;
        return Ok(());
    }

    info!("Preparing workspace/project cache");
    topology.ensure_fresh(service.as_ref()).await?;
    let client = DirectoryClient::new(service, topology);

    let reconcile = &config.reconcile;
    match &cli.command {
        Command::LoadPermissions { file } => {
            let records = drivers::read_records(file, reconcile.field_delimiter)?;
            let mut engine = ReconcileEngine::new(
                client,
                ReconcileOptions {
                    upgrade_only: reconcile.upgrade_only,
                    admin_override: AdminOverrideScope::None,
                    dry_run: reconcile.dry_run,
                },
            );
            drivers::permission_loader::run(&mut engine, &records).await?;
        }
        Command::SyncPermissions { file } => {
            let records = drivers::read_records(file, reconcile.field_delimiter)?;
            let mut engine = ReconcileEngine::new(
                client,
                ReconcileOptions {
                    upgrade_only: reconcile.upgrade_only,
                    admin_override: AdminOverrideScope::None,
                    dry_run: reconcile.dry_run,
                },
            );
            drivers::permission_syncer::run(&mut engine, &records, SyncFlags::from(reconcile))
                .await?;
        }
        Command::GrantProjectAccess { project, role } => {
            // Granting across the whole user base must never reduce anyone's
            // existing access
            let mut engine = ReconcileEngine::new(
                client,
                ReconcileOptions {
                    upgrade_only: true,
                    admin_override: AdminOverrideScope::WorkspaceOnly,
                    dry_run: reconcile.dry_run,
                },
            );
            drivers::project_access::grant_to_all_users(&mut engine, project, role).await?;
        }
        Command::UpdateProjectUsers { project, role } => {
            let mut engine = ReconcileEngine::new(
                client,
                ReconcileOptions {
                    upgrade_only: reconcile.upgrade_only,
                    admin_override: AdminOverrideScope::WorkspaceAndProject,
                    dry_run: reconcile.dry_run,
                },
            );
            drivers::project_access::update_project_users(&mut engine, project, role).await?;
        }
        Command::SetUserStatus { file } => {
            let records = drivers::read_records(file, reconcile.field_delimiter)?;
            let mut engine = ReconcileEngine::new(
                client,
                ReconcileOptions {
                    dry_run: reconcile.dry_run,
                    ..ReconcileOptions::default()
                },
            );
            drivers::user_status::run(&mut engine, &records).await?;
        }
        Command::RefreshCache => unreachable!("handled before cache preparation"),
    }

    Ok(())
}
