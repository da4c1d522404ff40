//! Sync mode: mirror one user's permission set onto another
//!
//! Instead of a single proposed role, sync mode computes the full delta
//! between a source user's permissions and a target user's, partitioned by
//! container kind, and applies creates, then updates, then deletes. The
//! ordering matters: deleting a user's only permission in a workspace before
//! creating the replacement would trip the remote's retain-at-least-one
//! constraint.

use std::collections::HashMap;

use tracing::{info, warn};

use super::{Outcome, ReconcileEngine};
use crate::core::models::{
    Permission, ProjectPermission, ProjectRole, RoleScale, User, WorkspacePermission,
    WorkspaceRole,
};
use crate::utils::error::{Result, SyncError};

/// Counts of applied sync operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: u64,
    pub updated: u64,
    pub removed: u64,
}

impl ReconcileEngine {
    /// Mirror the source user's project permissions onto the target user.
    ///
    /// Creating a project permission automatically creates the minimum
    /// needed workspace permission in the owning workspace, so mirroring
    /// project permissions does not require a prior workspace pass.
    pub async fn sync_project_permissions(
        &mut self,
        source_username: &str,
        target_username: &str,
    ) -> Result<SyncReport> {
        let Some((source, target)) = self
            .resolve_sync_pair(source_username, target_username)
            .await?
        else {
            return Ok(SyncReport::default());
        };

        let source_by_project: HashMap<&str, &ProjectPermission> = source
            .permissions
            .iter()
            .filter_map(Permission::as_project)
            .map(|p| (p.project.id.as_str(), p))
            .collect();
        let target_by_project: HashMap<&str, &ProjectPermission> = target
            .permissions
            .iter()
            .filter_map(Permission::as_project)
            .map(|p| (p.project.id.as_str(), p))
            .collect();

        let mut to_create: Vec<&ProjectPermission> = Vec::new();
        let mut to_update: Vec<&ProjectPermission> = Vec::new();
        let mut to_delete: Vec<&ProjectPermission> = Vec::new();

        for (project_id, source_permission) in &source_by_project {
            if target.is_workspace_admin(&source_permission.project.workspace.id) {
                info!(
                    "  {} holds Workspace Admin over {}; project {} excluded from sync",
                    target.username, source_permission.project.workspace.name,
                    source_permission.project.name
                );
                continue;
            }
            match target_by_project.get(project_id) {
                None => to_create.push(source_permission),
                Some(existing) => {
                    if ProjectRole::is_different(Some(&existing.role), &source_permission.role) {
                        info!(
                            "Existing permission: {}: {}",
                            existing.project.name, existing.role
                        );
                        info!(
                            "Updated permission: {}: {}",
                            source_permission.project.name, source_permission.role
                        );
                        to_update.push(source_permission);
                    }
                }
            }
        }

        for (project_id, existing) in &target_by_project {
            if source_by_project.contains_key(project_id) {
                continue;
            }
            if target.is_workspace_admin(&existing.project.workspace.id) {
                continue;
            }
            to_delete.push(existing);
        }

        to_create.sort_by(|a, b| a.project.id.cmp(&b.project.id));
        to_update.sort_by(|a, b| a.project.id.cmp(&b.project.id));
        to_delete.sort_by(|a, b| a.project.id.cmp(&b.project.id));

        let mut report = SyncReport::default();

        for permission in to_create {
            info!(
                "Creating {} permission on {} from {} to {}",
                permission.role, permission.project.name, source.username, target.username
            );
            if !self.options.dry_run {
                self.client
                    .service()
                    .create_project_permission(&target, &permission.project, &permission.role)
                    .await?;
            }
            report.created += 1;
        }

        for permission in to_update {
            info!(
                "Updating {} permission on {} from {} to {}",
                permission.role, permission.project.name, source.username, target.username
            );
            if !self.options.dry_run {
                self.client
                    .service()
                    .create_project_permission(&target, &permission.project, &permission.role)
                    .await?;
            }
            report.updated += 1;
        }

        for permission in to_delete {
            if self.options.upgrade_only {
                info!(
                    "  upgrade-only mode: removing {} on {} from {} would downgrade; not applied",
                    permission.role, permission.project.name, target.username
                );
                continue;
            }
            info!(
                "Removing {} permission on {} from {}; not present on source {}",
                permission.role, permission.project.name, target.username, source.username
            );
            if !self.options.dry_run && self.delete_tolerating_constraint(&permission.ref_).await? {
                report.removed += 1;
            } else if self.options.dry_run {
                report.removed += 1;
            }
        }

        self.client.refresh_user(&target.username).await?;
        info!(
            "{} permission(s) created; {} updated; {} removed",
            report.created, report.updated, report.removed
        );
        Ok(report)
    }

    /// Mirror the source user's workspace permissions onto the target user.
    pub async fn sync_workspace_permissions(
        &mut self,
        source_username: &str,
        target_username: &str,
    ) -> Result<SyncReport> {
        let Some((source, target)) = self
            .resolve_sync_pair(source_username, target_username)
            .await?
        else {
            return Ok(SyncReport::default());
        };

        let source_by_workspace: HashMap<&str, &WorkspacePermission> = source
            .permissions
            .iter()
            .filter_map(Permission::as_workspace)
            .map(|p| (p.workspace.id.as_str(), p))
            .collect();
        let target_by_workspace: HashMap<&str, &WorkspacePermission> = target
            .permissions
            .iter()
            .filter_map(Permission::as_workspace)
            .map(|p| (p.workspace.id.as_str(), p))
            .collect();

        let mut to_create: Vec<&WorkspacePermission> = Vec::new();
        let mut to_update: Vec<&WorkspacePermission> = Vec::new();
        let mut to_delete: Vec<&WorkspacePermission> = Vec::new();

        for (workspace_id, source_permission) in &source_by_workspace {
            if target.is_workspace_admin(workspace_id) {
                info!(
                    "  {} holds Workspace Admin over {}; excluded from sync",
                    target.username, source_permission.workspace.name
                );
                continue;
            }
            match target_by_workspace.get(workspace_id) {
                None => to_create.push(source_permission),
                Some(existing) => {
                    if WorkspaceRole::is_different(Some(&existing.role), &source_permission.role) {
                        info!(
                            "Existing permission: {}: {}",
                            existing.workspace.name, existing.role
                        );
                        info!(
                            "Updated permission: {}: {}",
                            source_permission.workspace.name, source_permission.role
                        );
                        to_update.push(source_permission);
                    }
                }
            }
        }

        for (workspace_id, existing) in &target_by_workspace {
            if source_by_workspace.contains_key(workspace_id) {
                continue;
            }
            if target.is_workspace_admin(workspace_id) {
                continue;
            }
            to_delete.push(existing);
        }

        to_create.sort_by(|a, b| a.workspace.id.cmp(&b.workspace.id));
        to_update.sort_by(|a, b| a.workspace.id.cmp(&b.workspace.id));
        to_delete.sort_by(|a, b| a.workspace.id.cmp(&b.workspace.id));

        let mut report = SyncReport::default();

        for permission in to_create {
            info!(
                "Creating {} permission on {} from {} to {}",
                permission.role, permission.workspace.name, source.username, target.username
            );
            if !self.options.dry_run {
                self.client
                    .service()
                    .create_workspace_permission(&target, &permission.workspace, &permission.role)
                    .await?;
            }
            report.created += 1;
        }

        for permission in to_update {
            info!(
                "Updating {} permission on {} from {} to {}",
                permission.role, permission.workspace.name, source.username, target.username
            );
            if !self.options.dry_run {
                self.client
                    .service()
                    .create_workspace_permission(&target, &permission.workspace, &permission.role)
                    .await?;
            }
            report.updated += 1;
        }

        for permission in to_delete {
            if self.options.upgrade_only {
                info!(
                    "  upgrade-only mode: removing {} on {} from {} would downgrade; not applied",
                    permission.role, permission.workspace.name, target.username
                );
                continue;
            }
            info!(
                "Removing {} permission on {} from {}; not present on source {}",
                permission.role, permission.workspace.name, target.username, source.username
            );
            if !self.options.dry_run && self.delete_tolerating_constraint(&permission.ref_).await? {
                report.removed += 1;
            } else if self.options.dry_run {
                report.removed += 1;
            }
        }

        self.client.refresh_user(&target.username).await?;
        info!(
            "{} permission(s) created; {} updated; {} removed",
            report.created, report.updated, report.removed
        );
        Ok(report)
    }

    /// Resolve both sides of a sync, applying the admin refusals.
    ///
    /// Mirroring from a subscription administrator is refused: their
    /// permission list reflects implicit access, not explicit grants. A
    /// subscription-admin target is skipped like everywhere else.
    async fn resolve_sync_pair(
        &mut self,
        source_username: &str,
        target_username: &str,
    ) -> Result<Option<(User, User)>> {
        let Some(source) = self.client.find_user(source_username).await? else {
            warn!(
                "Source user {} not found; skipping sync of permissions to {}",
                source_username, target_username
            );
            self.stats.rows_skipped += 1;
            return Ok(None);
        };
        let Some(target) = self.client.find_user(target_username).await? else {
            warn!(
                "Target user {} not found; skipping sync of permissions from {}",
                target_username, source_username
            );
            self.stats.rows_skipped += 1;
            return Ok(None);
        };

        if source.subscription_admin {
            warn!(
                "Permissions cannot be copied from subscription administrator {}; nothing copied to {}",
                source.username, target.username
            );
            self.stats.rows_skipped += 1;
            return Ok(None);
        }
        if target.subscription_admin {
            info!(
                "Target user {} is a subscription admin with implicit full access; sync skipped",
                target.username
            );
            self.stats.record(&Outcome::SkippedSubscriptionAdmin);
            return Ok(None);
        }

        Ok(Some((source, target)))
    }

    /// Delete a permission, treating the remote's retain-at-least-one rule
    /// as a warning rather than a failure. Returns whether the record was
    /// removed.
    pub(super) async fn delete_tolerating_constraint(&self, permission_ref: &str) -> Result<bool> {
        match self.client.service().delete_permission(permission_ref).await {
            Ok(()) => Ok(true),
            Err(SyncError::ConstraintViolation(message)) => {
                warn!("Cannot remove permission {}: {}", permission_ref, message);
                warn!("The user must retain at least one permission in the enclosing scope");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
