//! Wire-level records and the deserialization boundary
//!
//! Everything the service returns is deserialized into the structs here and
//! converted to domain models before leaving the directory module. Records
//! that cannot be converted (unknown permission kinds, containers without an
//! owning workspace) are dropped with a warning rather than failing the whole
//! response.

use serde::Deserialize;
use std::fmt;
use tracing::warn;

use crate::core::models::{
    ContainerState, Permission, Project, ProjectPermission, ProjectRef, ProjectRole, Subscription,
    TeamMembership, User, UserProfile, Workspace, WorkspacePermission, WorkspaceRef, WorkspaceRole,
};

/// Object identifier as the service sends it (numeric or string).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Oid {
    Num(u64),
    Str(String),
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Oid::Num(n) => write!(f, "{}", n),
            Oid::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Envelope around every query response
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct QueryEnvelope<T> {
    #[serde(rename = "QueryResult")]
    pub query_result: QueryResult<T>,
}

/// Query result page
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct QueryResult<T> {
    #[serde(rename = "TotalResultCount")]
    pub total_result_count: u64,
    #[serde(rename = "Results", default)]
    pub results: Vec<T>,
    #[serde(rename = "Errors", default)]
    pub errors: Vec<String>,
    #[serde(rename = "Warnings", default)]
    pub warnings: Vec<String>,
}

/// Envelope around create responses
#[derive(Debug, Deserialize)]
pub struct CreateEnvelope {
    #[serde(rename = "CreateResult")]
    pub create_result: OperationResult,
}

/// Envelope around update/delete responses
#[derive(Debug, Deserialize)]
pub struct OperationEnvelope {
    #[serde(rename = "OperationResult")]
    pub operation_result: OperationResult,
}

/// Shared error/warning lists on mutation responses
#[derive(Debug, Default, Deserialize)]
pub struct OperationResult {
    #[serde(rename = "Errors", default)]
    pub errors: Vec<String>,
    #[serde(rename = "Warnings", default)]
    pub warnings: Vec<String>,
}

/// A bare object reference
#[derive(Debug, Clone, Deserialize)]
pub struct WireRef {
    #[serde(rename = "_ref", default)]
    pub ref_: String,
}

/// Workspace or project payload, possibly nesting its owning workspace
#[derive(Debug, Clone, Deserialize)]
pub struct WireContainer {
    #[serde(rename = "_ref", default)]
    pub ref_: String,
    #[serde(rename = "ObjectID")]
    pub object_id: Oid,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "State", default)]
    pub state: Option<String>,
    #[serde(rename = "Workspace", default)]
    pub workspace: Option<Box<WireContainer>>,
}

impl WireContainer {
    fn state(&self) -> ContainerState {
        self.state
            .as_deref()
            .map(ContainerState::parse)
            .unwrap_or(ContainerState::Open)
    }

    pub fn to_workspace_ref(&self) -> WorkspaceRef {
        WorkspaceRef {
            id: self.object_id.to_string(),
            name: self.name.clone(),
        }
    }

    pub fn into_workspace(self) -> Workspace {
        Workspace {
            id: self.object_id.to_string(),
            name: self.name.clone(),
            state: self.state(),
        }
    }

    /// Convert to a project; requires the owning workspace to be present.
    pub fn into_project(self) -> Option<Project> {
        let state = self.state();
        let Some(workspace) = self.workspace.as_deref() else {
            warn!(
                "Project {} ({}) has no owning workspace in the response; dropping",
                self.name, self.object_id
            );
            return None;
        };
        Some(Project {
            id: self.object_id.to_string(),
            name: self.name,
            state,
            workspace: WorkspaceRef {
                id: workspace.object_id.to_string(),
                name: workspace.name.clone(),
            },
        })
    }
}

/// Subscription payload, optionally carrying its workspace list
#[derive(Debug, Clone, Deserialize)]
pub struct WireSubscription {
    #[serde(rename = "SubscriptionID")]
    pub subscription_id: Oid,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Workspaces", default)]
    pub workspaces: Vec<WireContainer>,
}

impl WireSubscription {
    pub fn to_subscription(&self) -> Subscription {
        Subscription {
            id: self.subscription_id.to_string(),
            name: self.name.clone(),
        }
    }
}

/// Permission payload
#[derive(Debug, Clone, Deserialize)]
pub struct WirePermission {
    #[serde(rename = "_type", default)]
    pub type_: String,
    #[serde(rename = "_ref", default)]
    pub ref_: String,
    #[serde(rename = "Role", default)]
    pub role: String,
    #[serde(rename = "Workspace", default)]
    pub workspace: Option<WireContainer>,
    #[serde(rename = "Project", default)]
    pub project: Option<WireContainer>,
}

impl WirePermission {
    /// Convert to a domain permission. Unknown kinds and incomplete payloads
    /// are dropped with a warning.
    pub fn into_permission(self) -> Option<Permission> {
        match self.type_.as_str() {
            "WorkspacePermission" => {
                let workspace = self.workspace?;
                Some(Permission::Workspace(WorkspacePermission {
                    ref_: self.ref_,
                    workspace: workspace.to_workspace_ref(),
                    role: WorkspaceRole::from_wire(&self.role),
                }))
            }
            "ProjectPermission" => {
                let project = self.project?;
                let workspace = match (&project.workspace, self.workspace) {
                    (Some(nested), _) => nested.to_workspace_ref(),
                    (None, Some(sibling)) => sibling.to_workspace_ref(),
                    (None, None) => {
                        warn!(
                            "ProjectPermission {} has no workspace in the response; dropping",
                            self.ref_
                        );
                        return None;
                    }
                };
                Some(Permission::Project(ProjectPermission {
                    ref_: self.ref_,
                    project: ProjectRef {
                        id: project.object_id.to_string(),
                        name: project.name,
                        workspace,
                    },
                    role: ProjectRole::from_wire(&self.role),
                }))
            }
            other => {
                warn!("Unknown permission kind {} on {}; dropping", other, self.ref_);
                None
            }
        }
    }
}

/// Profile payload
#[derive(Debug, Clone, Deserialize)]
pub struct WireProfile {
    #[serde(rename = "TimeZone", default)]
    pub timezone: Option<String>,
    #[serde(rename = "DefaultWorkspace", default)]
    pub default_workspace: Option<WireContainer>,
    #[serde(rename = "DefaultProject", default)]
    pub default_project: Option<WireContainer>,
}

/// Detailed user payload
#[derive(Debug, Clone, Deserialize)]
pub struct WireUser {
    #[serde(rename = "_ref", default)]
    pub ref_: String,
    #[serde(rename = "ObjectID")]
    pub object_id: Oid,
    #[serde(rename = "UserName")]
    pub username: String,
    #[serde(rename = "EmailAddress", default)]
    pub email: Option<String>,
    #[serde(rename = "FirstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "LastName", default)]
    pub last_name: Option<String>,
    #[serde(rename = "DisplayName", default)]
    pub display_name: Option<String>,
    #[serde(rename = "Disabled", default)]
    pub disabled: bool,
    #[serde(rename = "SubscriptionAdmin", default)]
    pub subscription_admin: bool,
    #[serde(rename = "UserPermissions", default)]
    pub permissions: Vec<WirePermission>,
    #[serde(rename = "TeamMemberships", default)]
    pub team_memberships: Vec<WireRef>,
    #[serde(rename = "UserProfile", default)]
    pub profile: Option<WireProfile>,
}

/// Username-only row from the project-users listing
#[derive(Debug, Clone, Deserialize)]
pub struct WireUsername {
    #[serde(rename = "UserName")]
    pub username: String,
}

impl WireUser {
    pub fn into_user(self) -> User {
        let email = self.email.unwrap_or_else(|| self.username.clone());
        let profile = self
            .profile
            .map(|p| UserProfile {
                timezone: p.timezone,
                default_workspace_id: p.default_workspace.map(|w| w.object_id.to_string()),
                default_project_id: p.default_project.map(|p| p.object_id.to_string()),
            })
            .unwrap_or_default();

        User {
            object_id: self.object_id.to_string(),
            ref_: self.ref_,
            username: self.username,
            email,
            display_name: self.display_name,
            first_name: self.first_name,
            last_name: self.last_name,
            disabled: self.disabled,
            subscription_admin: self.subscription_admin,
            permissions: self
                .permissions
                .into_iter()
                .filter_map(WirePermission::into_permission)
                .collect(),
            team_memberships: self
                .team_memberships
                .into_iter()
                .map(|r| TeamMembership::new(r.ref_))
                .collect(),
            profile,
        }
    }
}
