//! Directory service access
//!
//! [`DirectoryService`] is the contract this crate consumes from the remote
//! platform: typed query, create, update, and delete operations, plus the two
//! non-standard endpoints (team-membership toggle, project-user listing) that
//! bypass the general query language. The REST implementation keeps all wire
//! details, including those two irregular calls, behind this trait, so the
//! reconciliation engine never sees them.

pub mod client;
pub mod memory;
pub mod query;
pub mod rest;
pub mod types;

pub use client::DirectoryClient;
pub use memory::{InMemoryDirectory, Mutation};
pub use rest::RestDirectory;

use async_trait::async_trait;

use crate::core::models::{
    Project, ProjectRef, ProjectRole, Subscription, User, UserFields, Workspace, WorkspaceRef,
    WorkspaceRole,
};
use crate::utils::error::Result;

/// Operations the synchronizer requires from the directory service.
///
/// All calls are issued strictly sequentially; implementations do not need to
/// support concurrent use beyond `Send + Sync` object safety.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// The live subscription (used to detect environment/account switches).
    async fn current_subscription(&self) -> Result<Subscription>;

    /// All workspaces under the subscription, in any state.
    async fn subscription_workspaces(&self) -> Result<Vec<Workspace>>;

    /// Open projects within a workspace.
    async fn open_projects(&self, workspace_id: &str) -> Result<Vec<Project>>;

    /// Detailed user lookup by (already lowercased) username: permissions,
    /// team memberships, subscription-admin flag, profile.
    async fn find_user(&self, username: &str) -> Result<Option<User>>;

    /// Usernames of all enabled users.
    async fn enabled_usernames(&self) -> Result<Vec<String>>;

    /// Create a user. The caller re-fetches the full object afterwards.
    async fn create_user(&self, username: &str, fields: &UserFields) -> Result<()>;

    /// Set the disabled flag on a user.
    async fn set_user_disabled(&self, user_ref: &str, disabled: bool) -> Result<()>;

    /// Open workspace by identifier.
    async fn workspace_by_id(&self, id: &str) -> Result<Option<Workspace>>;

    /// Open workspaces sharing a name. More than one result means the name is
    /// ambiguous; the caller surfaces that, it is never resolved here.
    async fn workspaces_by_name(&self, name: &str) -> Result<Vec<Workspace>>;

    /// Open project by identifier.
    async fn project_by_id(&self, id: &str) -> Result<Option<Project>>;

    /// Open projects sharing a name.
    async fn projects_by_name(&self, name: &str) -> Result<Vec<Project>>;

    /// Create (or replace; the remote upserts) a workspace permission.
    async fn create_workspace_permission(
        &self,
        user: &User,
        workspace: &WorkspaceRef,
        role: &WorkspaceRole,
    ) -> Result<()>;

    /// Create (or replace) a project permission. The remote creates the
    /// minimum required workspace permission implicitly when none exists.
    async fn create_project_permission(
        &self,
        user: &User,
        project: &ProjectRef,
        role: &ProjectRole,
    ) -> Result<()>;

    /// Delete a permission record by its object reference.
    ///
    /// Fails with `ConstraintViolation` when the deletion would leave the
    /// user without any permission in the enclosing scope; callers treat that
    /// as recoverable.
    async fn delete_permission(&self, permission_ref: &str) -> Result<()>;

    /// Toggle team membership for (project, user).
    ///
    /// NON-STANDARD: served by a direct PUT outside the query language; may
    /// require renegotiation if the remote service changes.
    async fn set_team_member(&self, project_id: &str, user_id: &str, member: bool) -> Result<()>;

    /// Usernames with access to a project.
    ///
    /// NON-STANDARD: served by a direct GET outside the query language; may
    /// require renegotiation if the remote service changes.
    async fn project_usernames(&self, project_id: &str) -> Result<Vec<String>>;
}
