//! Permission records
//!
//! A permission is a (container, role, user) triple of one of two kinds. A
//! `ProjectPermission` structurally implies a sufficient workspace permission
//! in its owning workspace; the remote service enforces that invariant, and
//! the engine orders its operations so it never has to violate it.

use super::container::WorkspaceRef;
use super::role::{ProjectRole, WorkspaceRole};

/// Minimal reference to a project, as embedded in permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    /// Opaque object identifier
    pub id: String,
    /// Project name
    pub name: String,
    /// Owning workspace
    pub workspace: WorkspaceRef,
}

impl ProjectRef {
    /// Object reference path used in mutation payloads.
    pub fn object_ref(&self) -> String {
        format!("/project/{}", self.id)
    }
}

/// A workspace-scope permission record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePermission {
    /// Object reference of the permission record itself
    pub ref_: String,
    /// The workspace this permission applies to
    pub workspace: WorkspaceRef,
    /// Granted role
    pub role: WorkspaceRole,
}

/// A project-scope permission record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPermission {
    /// Object reference of the permission record itself
    pub ref_: String,
    /// The project this permission applies to
    pub project: ProjectRef,
    /// Granted role
    pub role: ProjectRole,
}

/// Either kind of permission record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Workspace(WorkspacePermission),
    Project(ProjectPermission),
}

impl Permission {
    /// Identifier of the container the permission applies to.
    pub fn container_id(&self) -> &str {
        match self {
            Permission::Workspace(p) => &p.workspace.id,
            Permission::Project(p) => &p.project.id,
        }
    }

    /// Object reference of the permission record itself.
    pub fn object_ref(&self) -> &str {
        match self {
            Permission::Workspace(p) => &p.ref_,
            Permission::Project(p) => &p.ref_,
        }
    }

    pub fn as_workspace(&self) -> Option<&WorkspacePermission> {
        match self {
            Permission::Workspace(p) => Some(p),
            Permission::Project(_) => None,
        }
    }

    pub fn as_project(&self) -> Option<&ProjectPermission> {
        match self {
            Permission::Project(p) => Some(p),
            Permission::Workspace(_) => None,
        }
    }
}
