//! In-process directory service
//!
//! A complete implementation of [`DirectoryService`] backed by plain maps,
//! with a log of every mutation applied. Used as the test double throughout
//! the crate: tests assert on exact mutation sequences rather than on log
//! output.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

use crate::core::models::{
    Permission, Project, ProjectPermission, ProjectRef, ProjectRole, Subscription, TeamMembership,
    User, UserFields, UserProfile, Workspace, WorkspacePermission, WorkspaceRef, WorkspaceRole,
};
use crate::directory::DirectoryService;
use crate::utils::error::{Result, SyncError};

/// One applied mutation, with the wire-level role string where applicable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateUser {
        username: String,
    },
    SetUserDisabled {
        user_ref: String,
        disabled: bool,
    },
    CreateWorkspacePermission {
        username: String,
        workspace_id: String,
        role: String,
    },
    CreateProjectPermission {
        username: String,
        project_id: String,
        role: String,
    },
    DeletePermission {
        permission_ref: String,
    },
    SetTeamMember {
        project_id: String,
        user_id: String,
        member: bool,
    },
}

#[derive(Default)]
struct MemoryState {
    subscription: Subscription,
    workspaces: Vec<Workspace>,
    projects: Vec<Project>,
    users: HashMap<String, User>,
    mutations: Vec<Mutation>,
    failing_deletes: HashSet<String>,
    next_object_id: u64,
}

/// In-memory [`DirectoryService`]
#[derive(Default)]
pub struct InMemoryDirectory {
    state: RwLock<MemoryState>,
}

impl InMemoryDirectory {
    pub fn new(subscription_id: &str, subscription_name: &str) -> Self {
        let directory = Self::default();
        directory.set_subscription(subscription_id, subscription_name);
        directory
    }

    pub fn set_subscription(&self, id: &str, name: &str) {
        let mut state = self.state.write();
        state.subscription = Subscription {
            id: id.to_string(),
            name: name.to_string(),
        };
    }

    pub fn add_workspace(&self, workspace: Workspace) {
        self.state.write().workspaces.push(workspace);
    }

    pub fn add_project(&self, project: Project) {
        self.state.write().projects.push(project);
    }

    pub fn add_user(&self, user: User) {
        self.state
            .write()
            .users
            .insert(user.username.to_lowercase(), user);
    }

    /// Make the next delete of this permission fail with a constraint
    /// violation, simulating the remote's "retain at least one permission"
    /// rule.
    pub fn fail_delete(&self, permission_ref: &str) {
        self.state
            .write()
            .failing_deletes
            .insert(permission_ref.to_string());
    }

    /// Snapshot of all mutations applied so far.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.state.read().mutations.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.read().mutations.len()
    }

    /// Current stored state of a user.
    pub fn user(&self, username: &str) -> Option<User> {
        self.state.read().users.get(&username.to_lowercase()).cloned()
    }

    fn next_ref(state: &mut MemoryState, kind: &str) -> String {
        state.next_object_id += 1;
        format!("/{}/{}", kind, 9000 + state.next_object_id)
    }
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn current_subscription(&self) -> Result<Subscription> {
        Ok(self.state.read().subscription.clone())
    }

    async fn subscription_workspaces(&self) -> Result<Vec<Workspace>> {
        Ok(self.state.read().workspaces.clone())
    }

    async fn open_projects(&self, workspace_id: &str) -> Result<Vec<Project>> {
        Ok(self
            .state
            .read()
            .projects
            .iter()
            .filter(|p| p.workspace.id == workspace_id && p.is_open())
            .cloned()
            .collect())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>> {
        Ok(self.state.read().users.get(&username.to_lowercase()).cloned())
    }

    async fn enabled_usernames(&self) -> Result<Vec<String>> {
        let mut usernames: Vec<String> = self
            .state
            .read()
            .users
            .values()
            .filter(|u| !u.disabled)
            .map(|u| u.username.clone())
            .collect();
        usernames.sort();
        Ok(usernames)
    }

    async fn create_user(&self, username: &str, fields: &UserFields) -> Result<()> {
        let mut state = self.state.write();
        let key = username.to_lowercase();
        if state.users.contains_key(&key) {
            return Err(SyncError::service(422, format!("user {} already exists", key)));
        }
        state.next_object_id += 1;
        let object_id = (9000 + state.next_object_id).to_string();
        let user = User {
            ref_: format!("/user/{}", object_id),
            object_id,
            username: key.clone(),
            email: key.clone(),
            display_name: fields.display_name.clone(),
            first_name: fields.first_name.clone(),
            last_name: fields.last_name.clone(),
            disabled: false,
            subscription_admin: false,
            permissions: vec![],
            team_memberships: vec![],
            profile: UserProfile::default(),
        };
        state.users.insert(key.clone(), user);
        state.mutations.push(Mutation::CreateUser { username: key });
        Ok(())
    }

    async fn set_user_disabled(&self, user_ref: &str, disabled: bool) -> Result<()> {
        let mut state = self.state.write();
        let user = state
            .users
            .values_mut()
            .find(|u| u.ref_ == user_ref)
            .ok_or_else(|| SyncError::not_found(format!("user ref {}", user_ref)))?;
        user.disabled = disabled;
        state.mutations.push(Mutation::SetUserDisabled {
            user_ref: user_ref.to_string(),
            disabled,
        });
        Ok(())
    }

    async fn workspace_by_id(&self, id: &str) -> Result<Option<Workspace>> {
        Ok(self
            .state
            .read()
            .workspaces
            .iter()
            .find(|w| w.id == id && w.is_open())
            .cloned())
    }

    async fn workspaces_by_name(&self, name: &str) -> Result<Vec<Workspace>> {
        Ok(self
            .state
            .read()
            .workspaces
            .iter()
            .filter(|w| w.name == name && w.is_open())
            .cloned()
            .collect())
    }

    async fn project_by_id(&self, id: &str) -> Result<Option<Project>> {
        Ok(self
            .state
            .read()
            .projects
            .iter()
            .find(|p| p.id == id && p.is_open())
            .cloned())
    }

    async fn projects_by_name(&self, name: &str) -> Result<Vec<Project>> {
        Ok(self
            .state
            .read()
            .projects
            .iter()
            .filter(|p| p.name == name && p.is_open())
            .cloned()
            .collect())
    }

    async fn create_workspace_permission(
        &self,
        user: &User,
        workspace: &WorkspaceRef,
        role: &WorkspaceRole,
    ) -> Result<()> {
        let wire_role = role.to_wire()?;
        let mut state = self.state.write();
        let ref_ = Self::next_ref(&mut state, "workspacepermission");
        let key = user.username.to_lowercase();
        let stored = state
            .users
            .get_mut(&key)
            .ok_or_else(|| SyncError::not_found(format!("user {}", key)))?;

        // Upsert-by-replacement, matching the remote's create semantics
        stored.permissions.retain(|p| {
            p.as_workspace()
                .map(|wp| wp.workspace.id != workspace.id)
                .unwrap_or(true)
        });
        stored.permissions.push(Permission::Workspace(WorkspacePermission {
            ref_,
            workspace: workspace.clone(),
            role: role.clone(),
        }));

        state.mutations.push(Mutation::CreateWorkspacePermission {
            username: key,
            workspace_id: workspace.id.clone(),
            role: wire_role.to_string(),
        });
        Ok(())
    }

    async fn create_project_permission(
        &self,
        user: &User,
        project: &ProjectRef,
        role: &ProjectRole,
    ) -> Result<()> {
        let wire_role = role.to_wire()?;
        let mut state = self.state.write();
        let permission_ref = Self::next_ref(&mut state, "projectpermission");
        let workspace_ref = Self::next_ref(&mut state, "workspacepermission");
        let key = user.username.to_lowercase();
        let stored = state
            .users
            .get_mut(&key)
            .ok_or_else(|| SyncError::not_found(format!("user {}", key)))?;

        // The remote creates the minimum workspace permission implicitly
        // when none exists for the owning workspace.
        let has_workspace_permission = stored
            .permissions
            .iter()
            .filter_map(Permission::as_workspace)
            .any(|wp| wp.workspace.id == project.workspace.id);
        if !has_workspace_permission {
            stored.permissions.push(Permission::Workspace(WorkspacePermission {
                ref_: workspace_ref,
                workspace: project.workspace.clone(),
                role: WorkspaceRole::User,
            }));
        }

        stored.permissions.retain(|p| {
            p.as_project()
                .map(|pp| pp.project.id != project.id)
                .unwrap_or(true)
        });
        stored.permissions.push(Permission::Project(ProjectPermission {
            ref_: permission_ref,
            project: project.clone(),
            role: role.clone(),
        }));

        state.mutations.push(Mutation::CreateProjectPermission {
            username: key,
            project_id: project.id.clone(),
            role: wire_role.to_string(),
        });
        Ok(())
    }

    async fn delete_permission(&self, permission_ref: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.failing_deletes.contains(permission_ref) {
            return Err(SyncError::constraint_violation(format!(
                "removing {} would leave the user without any permission in scope",
                permission_ref
            )));
        }

        let mut found = false;
        for user in state.users.values_mut() {
            let before = user.permissions.len();
            user.permissions.retain(|p| p.object_ref() != permission_ref);
            if user.permissions.len() != before {
                found = true;
                break;
            }
        }
        if !found {
            return Err(SyncError::not_found(format!(
                "permission {}",
                permission_ref
            )));
        }
        state.mutations.push(Mutation::DeletePermission {
            permission_ref: permission_ref.to_string(),
        });
        Ok(())
    }

    async fn set_team_member(&self, project_id: &str, user_id: &str, member: bool) -> Result<()> {
        let mut state = self.state.write();
        let user = state
            .users
            .values_mut()
            .find(|u| u.object_id == user_id)
            .ok_or_else(|| SyncError::not_found(format!("user {}", user_id)))?;

        if member {
            if !user.is_team_member(project_id) {
                user.team_memberships
                    .push(TeamMembership::new(format!("/project/{}", project_id)));
            }
        } else {
            user.team_memberships
                .retain(|m| m.project_id() != Some(project_id));
        }

        state.mutations.push(Mutation::SetTeamMember {
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            member,
        });
        Ok(())
    }

    async fn project_usernames(&self, project_id: &str) -> Result<Vec<String>> {
        let mut usernames: Vec<String> = self
            .state
            .read()
            .users
            .values()
            .filter(|u| u.project_permission(project_id).is_some())
            .map(|u| u.username.clone())
            .collect();
        usernames.sort();
        Ok(usernames)
    }
}
