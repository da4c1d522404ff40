//! Project-wide access drivers
//!
//! `grant_to_all_users` raises every enabled user to a role on one project
//! (upgrade-only, admins left alone). `update_project_users` reconciles the
//! project's current user list to a role instead.

use tracing::{error, info};

use super::{IdentifierKind, identifier_kind};
use crate::core::engine::ReconcileEngine;
use crate::core::models::{Project, ProjectRole};
use crate::directory::DirectoryClient;
use crate::utils::error::{Result, SyncError};

/// Resolve a project from a command-line identifier (object id or name).
///
/// An ambiguous name is refused outright: guessing between namesakes is
/// worse than asking the operator for the object id.
pub async fn resolve_project(client: &DirectoryClient, identifier: &str) -> Result<Project> {
    match identifier_kind(identifier) {
        IdentifierKind::ObjectId => client
            .find_project(identifier)
            .await?
            .ok_or_else(|| SyncError::not_found(format!("project {}", identifier))),
        IdentifierKind::Name => match client.find_project_by_name(identifier).await? {
            None => Err(SyncError::not_found(format!("project {}", identifier))),
            Some((_, true)) => Err(SyncError::ambiguous_name(format!(
                "more than one project named {}; specify the project by object id",
                identifier
            ))),
            Some((project, false)) => Ok(project),
        },
    }
}

/// Grant a role on one project to every enabled user.
///
/// Runs with upgrade-only forced on and workspace-scope admin overrides, so
/// nobody's existing access is reduced and admins are merely counted.
pub async fn grant_to_all_users(
    engine: &mut ReconcileEngine,
    project_identifier: &str,
    role_text: &str,
) -> Result<()> {
    let role = ProjectRole::from_input(role_text)?;
    let project = resolve_project(engine.client(), project_identifier).await?;

    let usernames = engine.client().service().enabled_usernames().await?;
    info!(
        "Granting {} on {} to {} enabled user(s)",
        role,
        project.name,
        usernames.len()
    );

    apply_role_to_users(engine, &project, &role, &usernames).await?;

    let stats = engine.stats();
    info!("Completed granting {} access: {}", role, stats);
    info!(
        "{} subscription admin(s) and {} workspace admin(s) always have full access to {}",
        stats.skipped_subscription_admins, stats.skipped_workspace_admins, project.name
    );
    Ok(())
}

/// Reconcile every current user of a project to one role.
///
/// Uses the project-user listing and the full admin override scope, so
/// existing project admins are left alone as well.
pub async fn update_project_users(
    engine: &mut ReconcileEngine,
    project_identifier: &str,
    role_text: &str,
) -> Result<()> {
    let role = ProjectRole::from_input(role_text)?;
    let project = resolve_project(engine.client(), project_identifier).await?;

    let usernames = engine
        .client()
        .service()
        .project_usernames(&project.id)
        .await?;
    info!(
        "Updating {} user(s) of {} to {}",
        usernames.len(),
        project.name,
        role
    );

    apply_role_to_users(engine, &project, &role, &usernames).await?;
    info!("Completed project user update: {}", engine.stats());
    Ok(())
}

async fn apply_role_to_users(
    engine: &mut ReconcileEngine,
    project: &Project,
    role: &ProjectRole,
    usernames: &[String],
) -> Result<()> {
    for username in usernames {
        match engine.apply_project_role(username, project, role).await {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!("Failed to update permissions for {}: {}", username, e);
                engine.stats_mut().row_errors += 1;
            }
        }
    }
    Ok(())
}
