//! Team membership synchronization
//!
//! Membership is orthogonal to permissions but only meaningful while the
//! user holds Editor or Project Admin on the project, so callers sequence
//! membership updates after the corresponding permission grant. The two are
//! never atomic.

use std::collections::BTreeSet;

use tracing::{info, warn};

use super::ReconcileEngine;
use crate::core::models::{Project, ProjectRole, TeamMembership};
use crate::utils::error::Result;

impl ReconcileEngine {
    /// Set one user's team membership on one project to the desired state.
    ///
    /// No-ops when the current state already matches; otherwise issues
    /// exactly one remote mutation. Returns whether anything changed.
    pub async fn set_team_membership(
        &mut self,
        username: &str,
        project: &Project,
        desired: bool,
    ) -> Result<bool> {
        let user = self.resolve_user(username).await?;

        if user.is_team_member(&project.id) == desired {
            info!(
                "  {} {} - no creation of or changes to team membership",
                user.username, project.name
            );
            return Ok(false);
        }

        info!(
            "  {} {} - team membership set to {}",
            user.username,
            project.name,
            if desired { "Yes" } else { "No" }
        );
        if self.options.dry_run {
            info!("  dry run: no mutation issued");
        } else {
            self.client
                .service()
                .set_team_member(&project.id, &user.object_id, desired)
                .await?;
            self.client.refresh_user(&user.username).await?;
        }

        if desired {
            self.stats.memberships_added += 1;
        } else {
            self.stats.memberships_removed += 1;
        }
        Ok(true)
    }

    /// Mirror the source user's team memberships onto the target user as a
    /// symmetric set-difference over project identifiers.
    ///
    /// Runs after permission sync: an add requires the target to already
    /// hold Editor or Project Admin on the project.
    pub async fn sync_team_memberships(
        &mut self,
        source_username: &str,
        target_username: &str,
    ) -> Result<(u64, u64)> {
        let Some(source) = self.client.find_user(source_username).await? else {
            warn!(
                "Source user {} not found; skipping team membership sync to {}",
                source_username, target_username
            );
            self.stats.rows_skipped += 1;
            return Ok((0, 0));
        };
        let Some(target) = self.client.find_user(target_username).await? else {
            warn!(
                "Target user {} not found; skipping team membership sync from {}",
                target_username, source_username
            );
            self.stats.rows_skipped += 1;
            return Ok((0, 0));
        };

        let source_projects: BTreeSet<String> = membership_project_ids(&source.team_memberships);
        let target_projects: BTreeSet<String> = membership_project_ids(&target.team_memberships);

        let mut added = 0u64;
        for project_id in source_projects.difference(&target_projects) {
            match target.project_role(project_id) {
                Some(ProjectRole::Editor) | Some(ProjectRole::ProjectAdmin) => {}
                _ => {
                    warn!(
                        "  {} must hold Editor or Project Admin on project {} to become a team member; skipping",
                        target.username, project_id
                    );
                    continue;
                }
            }
            let Some(project) = self.client.find_project(project_id).await? else {
                continue;
            };
            info!(
                "Adding team membership on {} from {} to {}",
                project.name, source.username, target.username
            );
            if self
                .set_team_membership(&target.username, &project, true)
                .await?
            {
                added += 1;
            }
        }

        let mut removed = 0u64;
        for project_id in target_projects.difference(&source_projects) {
            let Some(project) = self.client.find_project(project_id).await? else {
                continue;
            };
            info!(
                "Removing team membership on {} from {}; source {} is not a team member",
                project.name, target.username, source.username
            );
            if self
                .set_team_membership(&target.username, &project, false)
                .await?
            {
                removed += 1;
            }
        }

        info!(
            "Team memberships added: {}; team memberships removed: {}",
            added, removed
        );
        Ok((added, removed))
    }
}

fn membership_project_ids(memberships: &[TeamMembership]) -> BTreeSet<String> {
    memberships
        .iter()
        .filter_map(|m| m.project_id())
        .map(str::to_string)
        .collect()
}
