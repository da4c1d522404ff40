//! Permission reconciliation engine
//!
//! One parameterized engine replaces what would otherwise be a copy of the
//! same decision tree in every batch driver. Per (user, container, proposed
//! role) the pipeline is: admin override check, change detection, the
//! upgrade gate (in upgrade-only mode), then the apply dispatch. Sync mode
//! ([`ReconcileEngine::sync_project_permissions`]) and team membership sync
//! live in sibling modules.

mod membership;
mod sync;
#[cfg(test)]
mod tests;

pub use sync::SyncReport;

use std::fmt;

use tracing::{info, warn};

use crate::core::models::{Project, ProjectRole, RoleScale, User, Workspace, WorkspaceRole};
use crate::directory::DirectoryClient;
use crate::utils::error::{Result, SyncError};

/// Which inherited admin roles exempt a user from reconciliation.
///
/// A subscription administrator is always exempt regardless of this setting;
/// that is an attribute-level override, not a permission-record comparison.
/// The scope selects the container-derived checks, which the drivers need in
/// different combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminOverrideScope {
    /// No container-derived exemptions
    #[default]
    None,
    /// Exempt holders of Workspace Admin on the owning workspace
    WorkspaceOnly,
    /// Additionally exempt holders of Project Admin on the exact target
    /// project
    WorkspaceAndProject,
}

impl AdminOverrideScope {
    fn checks_workspace_admin(&self) -> bool {
        matches!(
            self,
            AdminOverrideScope::WorkspaceOnly | AdminOverrideScope::WorkspaceAndProject
        )
    }

    fn checks_project_admin(&self) -> bool {
        matches!(self, AdminOverrideScope::WorkspaceAndProject)
    }
}

/// Engine behavior, fixed at construction
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Only apply changes that raise access; suppress downgrades
    pub upgrade_only: bool,
    /// Admin exemption scope for this driver
    pub admin_override: AdminOverrideScope,
    /// Decide and log, but issue no mutations
    pub dry_run: bool,
}

/// What happened to one (user, container, proposed role) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A create/update/delete was applied (or would have been, in dry-run)
    Updated,
    /// Existing and proposed state already match
    NoChange,
    /// Upgrade-only mode suppressed a downgrade
    DowngradeSuppressed,
    /// User is a subscription administrator
    SkippedSubscriptionAdmin,
    /// User holds Workspace Admin on the owning workspace
    SkippedWorkspaceAdmin,
    /// User holds Project Admin on the target project
    SkippedProjectAdmin,
}

/// Counters for one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub updated: u64,
    pub unchanged: u64,
    pub downgrades_suppressed: u64,
    pub skipped_subscription_admins: u64,
    pub skipped_workspace_admins: u64,
    pub skipped_project_admins: u64,
    pub invalid_roles: u64,
    pub rows_skipped: u64,
    pub row_errors: u64,
    pub users_created: u64,
    pub memberships_added: u64,
    pub memberships_removed: u64,
}

impl RunStats {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Updated => self.updated += 1,
            Outcome::NoChange => self.unchanged += 1,
            Outcome::DowngradeSuppressed => self.downgrades_suppressed += 1,
            Outcome::SkippedSubscriptionAdmin => self.skipped_subscription_admins += 1,
            Outcome::SkippedWorkspaceAdmin => self.skipped_workspace_admins += 1,
            Outcome::SkippedProjectAdmin => self.skipped_project_admins += 1,
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated; {} unchanged; {} downgrade(s) suppressed; \
             {} subscription admin(s), {} workspace admin(s), {} project admin(s) skipped; \
             {} invalid role(s); {} row(s) skipped; {} row error(s)",
            self.updated,
            self.unchanged,
            self.downgrades_suppressed,
            self.skipped_subscription_admins,
            self.skipped_workspace_admins,
            self.skipped_project_admins,
            self.invalid_roles,
            self.rows_skipped,
            self.row_errors
        )
    }
}

/// The reconciliation engine
pub struct ReconcileEngine {
    client: DirectoryClient,
    options: ReconcileOptions,
    stats: RunStats,
}

impl ReconcileEngine {
    pub fn new(client: DirectoryClient, options: ReconcileOptions) -> Self {
        Self {
            client,
            options,
            stats: RunStats::default(),
        }
    }

    pub fn client(&self) -> &DirectoryClient {
        &self.client
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut RunStats {
        &mut self.stats
    }

    pub(crate) async fn resolve_user(&self, username: &str) -> Result<User> {
        self.client
            .find_user(username)
            .await?
            .ok_or_else(|| SyncError::not_found(format!("user {}", username)))
    }

    fn record(&mut self, outcome: Outcome) -> Outcome {
        self.stats.record(&outcome);
        outcome
    }

    /// Reconcile one user's role in one workspace.
    pub async fn apply_workspace_role(
        &mut self,
        username: &str,
        workspace: &Workspace,
        proposed: &WorkspaceRole,
    ) -> Result<Outcome> {
        let user = self.resolve_user(username).await?;

        if user.subscription_admin {
            info!(
                "User {} is a subscription admin with implicit full access; no change to workspace {} applied",
                user.username, workspace.name
            );
            return Ok(self.record(Outcome::SkippedSubscriptionAdmin));
        }
        if self.options.admin_override.checks_workspace_admin()
            && user.is_workspace_admin(&workspace.id)
        {
            info!(
                "User {} is a workspace admin of {}; no change applied",
                user.username, workspace.name
            );
            return Ok(self.record(Outcome::SkippedWorkspaceAdmin));
        }

        if proposed.rank().is_none() {
            return Err(SyncError::invalid_role(proposed.to_string()));
        }

        let existing = user.workspace_role(&workspace.id);
        if !WorkspaceRole::is_different(existing, proposed) {
            info!(
                "  {} {} - existing and proposed permission are the same; nothing applied",
                user.username, workspace.name
            );
            return Ok(self.record(Outcome::NoChange));
        }

        if self.options.upgrade_only && !WorkspaceRole::is_upgrade(existing, proposed) {
            warn!(
                "  {} {} - existing permission: {}",
                user.username,
                workspace.name,
                existing.map(|r| r.to_string()).unwrap_or_else(|| "No Access".to_string())
            );
            warn!("  Proposed permission: {}", proposed);
            warn!("  Proposed change would downgrade permissions; nothing applied");
            return Ok(self.record(Outcome::DowngradeSuppressed));
        }

        self.apply_workspace_change(&user, workspace, proposed).await?;
        self.client.refresh_user(&user.username).await?;
        Ok(self.record(Outcome::Updated))
    }

    async fn apply_workspace_change(
        &self,
        user: &User,
        workspace: &Workspace,
        proposed: &WorkspaceRole,
    ) -> Result<()> {
        info!(
            "  {} {} - permission set to {}",
            user.username, workspace.name, proposed
        );
        if self.options.dry_run {
            info!("  dry run: no mutation issued");
            return Ok(());
        }

        if proposed.is_no_access() {
            let Some(permission) = user.workspace_permission(&workspace.id) else {
                return Ok(());
            };
            match self.client.service().delete_permission(&permission.ref_).await {
                Ok(()) => Ok(()),
                Err(SyncError::ConstraintViolation(message)) => {
                    warn!(
                        "Cannot remove workspace permission for {} in {}: {}",
                        user.username, workspace.name, message
                    );
                    warn!(
                        "The user must retain access to at least one workspace in the subscription"
                    );
                    Ok(())
                }
                Err(e) => Err(e),
            }
        } else {
            self.client
                .service()
                .create_workspace_permission(user, &workspace.to_ref(), proposed)
                .await
        }
    }

    /// Reconcile one user's role in one project.
    pub async fn apply_project_role(
        &mut self,
        username: &str,
        project: &Project,
        proposed: &ProjectRole,
    ) -> Result<Outcome> {
        let user = self.resolve_user(username).await?;

        if user.subscription_admin {
            info!(
                "User {} is a subscription admin with implicit full access; no change to project {} applied",
                user.username, project.name
            );
            return Ok(self.record(Outcome::SkippedSubscriptionAdmin));
        }
        if self.options.admin_override.checks_workspace_admin()
            && user.is_workspace_admin(&project.workspace.id)
        {
            info!(
                "User {} is a workspace admin of the workspace containing {}; no change applied",
                user.username, project.name
            );
            return Ok(self.record(Outcome::SkippedWorkspaceAdmin));
        }
        if self.options.admin_override.checks_project_admin()
            && user.is_project_admin(&project.id)
        {
            info!(
                "User {} is a project admin of {}; no change applied",
                user.username, project.name
            );
            return Ok(self.record(Outcome::SkippedProjectAdmin));
        }

        if proposed.rank().is_none() {
            return Err(SyncError::invalid_role(proposed.to_string()));
        }

        let existing = user.project_role(&project.id);
        if !ProjectRole::is_different(existing, proposed) {
            info!(
                "  {} {} - existing and proposed permission are the same; nothing applied",
                user.username, project.name
            );
            return Ok(self.record(Outcome::NoChange));
        }

        if self.options.upgrade_only && !ProjectRole::is_upgrade(existing, proposed) {
            warn!(
                "  {} {} - existing permission: {}",
                user.username,
                project.name,
                existing.map(|r| r.to_string()).unwrap_or_else(|| "No Access".to_string())
            );
            warn!("  Proposed permission: {}", proposed);
            warn!("  Proposed change would downgrade permissions; nothing applied");
            return Ok(self.record(Outcome::DowngradeSuppressed));
        }

        self.apply_project_change(&user, project, proposed).await?;
        self.client.refresh_user(&user.username).await?;
        Ok(self.record(Outcome::Updated))
    }

    async fn apply_project_change(
        &self,
        user: &User,
        project: &Project,
        proposed: &ProjectRole,
    ) -> Result<()> {
        info!(
            "  {} {} - permission set to {}",
            user.username, project.name, proposed
        );
        if self.options.dry_run {
            info!("  dry run: no mutation issued");
            return Ok(());
        }

        if proposed.is_no_access() {
            let Some(permission) = user.project_permission(&project.id) else {
                return Ok(());
            };
            match self.client.service().delete_permission(&permission.ref_).await {
                Ok(()) => Ok(()),
                Err(SyncError::ConstraintViolation(message)) => {
                    warn!(
                        "Cannot remove project permission for {} in {}: {}",
                        user.username, project.name, message
                    );
                    warn!("The user must retain access to at least one project in the workspace");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        } else {
            let project_ref = crate::core::models::ProjectRef {
                id: project.id.clone(),
                name: project.name.clone(),
                workspace: project.workspace.clone(),
            };
            self.client
                .service()
                .create_project_permission(user, &project_ref, proposed)
                .await
        }
    }
}
