//! Permission loader: one permission grant per input row
//!
//! Row fields: UserName, LastName, FirstName, DisplayName, PermissionType,
//! WorkspaceName, ContainerName, PermissionLevel, TeamMember, ObjectID.
//! The name fields are optional and only used when a user has to be created.

use tracing::{error, info, warn};

use super::Record;
use crate::core::engine::ReconcileEngine;
use crate::core::models::{ProjectRole, UserFields, WorkspaceRole};
use crate::utils::error::Result;

const REQUIRED_FIELDS: [&str; 6] = [
    "UserName",
    "PermissionType",
    "ContainerName",
    "PermissionLevel",
    "TeamMember",
    "ObjectID",
];

/// Process every record, skipping bad rows with a warning.
pub async fn run(engine: &mut ReconcileEngine, records: &[Record]) -> Result<()> {
    for record in records {
        match load_row(engine, record).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!("Row failed: {}", e);
                engine.stats_mut().row_errors += 1;
            }
        }
    }
    info!("Permission load complete: {}", engine.stats());
    Ok(())
}

async fn load_row(engine: &mut ReconcileEngine, record: &Record) -> Result<()> {
    let missing = record.missing(&REQUIRED_FIELDS);
    if !missing.is_empty() {
        warn!(
            "One or more required fields missing: {}; skipping this row",
            missing.join(", ")
        );
        engine.stats_mut().rows_skipped += 1;
        return Ok(());
    }

    let username = record.require("UserName")?.to_lowercase();
    let permission_type = record.require("PermissionType")?.to_string();
    let container_name = record.require("ContainerName")?.to_string();
    let permission_level = record.require("PermissionLevel")?.to_string();
    let team_member = record.require("TeamMember")?.to_string();
    let object_id = record.require("ObjectID")?.to_string();

    let fields = UserFields {
        first_name: record.get("FirstName").map(str::to_string),
        last_name: record.get("LastName").map(str::to_string),
        display_name: record.get("DisplayName").map(str::to_string),
    };

    let user = match engine.client().find_user(&username).await? {
        Some(user) => user,
        None => {
            info!("User {} does not exist yet; creating", username);
            match engine.client().create_user(&username, &fields).await {
                Ok(user) => {
                    engine.stats_mut().users_created += 1;
                    user
                }
                Err(e) if !e.is_fatal() => {
                    error!("Could not create user {}: {}", username, e);
                    error!("The running account must be allowed to create users");
                    engine.stats_mut().row_errors += 1;
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    };

    match permission_type.as_str() {
        "WorkspacePermission" => {
            let Some(workspace) = engine.client().find_workspace(&object_id).await? else {
                error!(
                    "Workspace {} (OID {}) not found; skipping permission grant",
                    container_name, object_id
                );
                engine.stats_mut().rows_skipped += 1;
                return Ok(());
            };
            let role = match WorkspaceRole::from_input(&permission_level) {
                Ok(role) => role,
                Err(e) => {
                    error!("{}; no mutation attempted", e);
                    engine.stats_mut().invalid_roles += 1;
                    return Ok(());
                }
            };
            engine
                .apply_workspace_role(&user.username, &workspace, &role)
                .await?;
        }
        "ProjectPermission" => {
            let Some(project) = engine.client().find_project(&object_id).await? else {
                error!(
                    "Project {} (OID {}) not found; skipping permission grant",
                    container_name, object_id
                );
                engine.stats_mut().rows_skipped += 1;
                return Ok(());
            };
            let role = match ProjectRole::from_input(&permission_level) {
                Ok(role) => role,
                Err(e) => {
                    error!("{}; no mutation attempted", e);
                    engine.stats_mut().invalid_roles += 1;
                    return Ok(());
                }
            };
            engine
                .apply_project_role(&user.username, &project, &role)
                .await?;

            // Team membership only exists at Editor/Project Admin level
            let wants_membership = team_member.eq_ignore_ascii_case("yes");
            match role {
                ProjectRole::Editor | ProjectRole::ProjectAdmin => {
                    engine
                        .set_team_membership(&user.username, &project, wants_membership)
                        .await?;
                }
                _ if wants_membership => {
                    info!(
                        "  Permission level {} cannot hold team membership; Editor or Project Admin required. No team membership update",
                        role
                    );
                }
                _ => {
                    info!("  No team membership update");
                }
            }
        }
        other => {
            warn!("Unknown permission type {}; skipping this row", other);
            engine.stats_mut().rows_skipped += 1;
        }
    }

    Ok(())
}
