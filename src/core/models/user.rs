//! User accounts

use super::membership::TeamMembership;
use super::permission::{Permission, ProjectPermission, WorkspacePermission};
use super::role::{ProjectRole, WorkspaceRole};

/// A user account as fetched from the directory service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Opaque object identifier
    pub object_id: String,
    /// Object reference path
    pub ref_: String,
    /// Globally unique lowercase username (an email address)
    pub username: String,
    /// Email address
    pub email: String,
    /// Display name
    pub display_name: Option<String>,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Whether the account is disabled
    pub disabled: bool,
    /// Subscription-administrator flag; holders have implicit full access
    /// and are skipped by all permission reconciliation
    pub subscription_admin: bool,
    /// Permission records
    pub permissions: Vec<Permission>,
    /// Team membership references
    pub team_memberships: Vec<TeamMembership>,
    /// Profile settings
    pub profile: UserProfile,
}

/// Profile settings carried on the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    /// IANA timezone name
    pub timezone: Option<String>,
    /// Default workspace identifier
    pub default_workspace_id: Option<String>,
    /// Default project identifier
    pub default_project_id: Option<String>,
}

/// Optional attributes supplied when creating or updating a user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
}

impl User {
    /// The workspace-scope permission record for a workspace, if any.
    pub fn workspace_permission(&self, workspace_id: &str) -> Option<&WorkspacePermission> {
        self.permissions
            .iter()
            .filter_map(Permission::as_workspace)
            .find(|p| p.workspace.id == workspace_id)
    }

    /// The project-scope permission record for a project, if any.
    pub fn project_permission(&self, project_id: &str) -> Option<&ProjectPermission> {
        self.permissions
            .iter()
            .filter_map(Permission::as_project)
            .find(|p| p.project.id == project_id)
    }

    /// The user's current role in a workspace. `None` means no access.
    pub fn workspace_role(&self, workspace_id: &str) -> Option<&WorkspaceRole> {
        self.workspace_permission(workspace_id).map(|p| &p.role)
    }

    /// The user's current role in a project. `None` means no access.
    pub fn project_role(&self, project_id: &str) -> Option<&ProjectRole> {
        self.project_permission(project_id).map(|p| &p.role)
    }

    /// Whether the user holds Admin on the given workspace.
    pub fn is_workspace_admin(&self, workspace_id: &str) -> bool {
        matches!(self.workspace_role(workspace_id), Some(WorkspaceRole::Admin))
    }

    /// Whether the user holds Project Admin on the given project.
    pub fn is_project_admin(&self, project_id: &str) -> bool {
        matches!(self.project_role(project_id), Some(ProjectRole::ProjectAdmin))
    }

    /// Whether the user is on the given project's team.
    pub fn is_team_member(&self, project_id: &str) -> bool {
        self.team_memberships
            .iter()
            .any(|m| m.project_id() == Some(project_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{ProjectRef, WorkspaceRef};

    fn sample_user() -> User {
        let workspace = WorkspaceRef {
            id: "100".to_string(),
            name: "Main".to_string(),
        };
        User {
            object_id: "555".to_string(),
            ref_: "/user/555".to_string(),
            username: "mark@acme.com".to_string(),
            email: "mark@acme.com".to_string(),
            display_name: Some("Mark".to_string()),
            first_name: None,
            last_name: None,
            disabled: false,
            subscription_admin: false,
            permissions: vec![
                Permission::Workspace(WorkspacePermission {
                    ref_: "/workspacepermission/1".to_string(),
                    workspace: workspace.clone(),
                    role: WorkspaceRole::Admin,
                }),
                Permission::Project(ProjectPermission {
                    ref_: "/projectpermission/2".to_string(),
                    project: ProjectRef {
                        id: "777".to_string(),
                        name: "Alpha".to_string(),
                        workspace,
                    },
                    role: ProjectRole::Editor,
                }),
            ],
            team_memberships: vec![TeamMembership::new("/project/777")],
            profile: UserProfile::default(),
        }
    }

    #[test]
    fn role_lookup_matches_container_kind() {
        let user = sample_user();
        assert_eq!(user.workspace_role("100"), Some(&WorkspaceRole::Admin));
        assert_eq!(user.project_role("777"), Some(&ProjectRole::Editor));
        assert_eq!(user.project_role("100"), None);
        assert_eq!(user.workspace_role("777"), None);
    }

    #[test]
    fn admin_checks_are_container_specific() {
        let user = sample_user();
        assert!(user.is_workspace_admin("100"));
        assert!(!user.is_workspace_admin("200"));
        assert!(!user.is_project_admin("777"));
    }

    #[test]
    fn team_membership_lookup() {
        let user = sample_user();
        assert!(user.is_team_member("777"));
        assert!(!user.is_team_member("778"));
    }
}
