//! Ranked role vocabularies and comparison rules
//!
//! Two container scopes, each with a totally ordered role list. Upgrade and
//! difference checks are shared between the scopes through [`RoleScale`].
//!
//! The remote service reads a project-admin grant back as the string `"Admin"`
//! but requires `"Project Admin"` on create. That asymmetry lives entirely in
//! the `from_wire`/`to_wire` mapping here, so the two meanings of `"Admin"`
//! never collide anywhere else in the crate. The asymmetry is not assumed to
//! generalize: every other role maps symmetrically.

use std::fmt;

use crate::utils::error::{Result, SyncError};

/// Comparison rules shared by the workspace and project role scales.
pub trait RoleScale: PartialEq + fmt::Display + Sized {
    /// Ordinal position in the scope's ranked list.
    ///
    /// `None` is the incomparable sentinel for unrecognized role strings:
    /// such a role never counts as an upgrade or a downgrade, and always
    /// counts as different.
    fn rank(&self) -> Option<u8>;

    /// Whether this is the scope's maximal admin role.
    fn is_max_admin(&self) -> bool;

    /// Whether this role means "no access" (expressed on the wire by the
    /// absence of a permission record).
    fn is_no_access(&self) -> bool;

    /// Whether `proposed` raises access over `existing`.
    ///
    /// Absence of an existing permission is always an upgrade (a new grant).
    /// An existing maximal admin role can never be upgraded further.
    fn is_upgrade(existing: Option<&Self>, proposed: &Self) -> bool {
        match existing {
            None => true,
            Some(current) => {
                if current.is_max_admin() {
                    return false;
                }
                match (current.rank(), proposed.rank()) {
                    (Some(have), Some(want)) => want > have,
                    _ => false,
                }
            }
        }
    }

    /// Whether `proposed` differs from `existing`.
    ///
    /// Absence counts as different (a grant is needed). An unranked role on
    /// either side forces a difference.
    fn is_different(existing: Option<&Self>, proposed: &Self) -> bool {
        match existing {
            None => true,
            Some(current) => {
                current.rank().is_none() || proposed.rank().is_none() || current != proposed
            }
        }
    }
}

/// Workspace-scope role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceRole {
    /// No access to the workspace
    NoAccess,
    /// Regular workspace user
    User,
    /// Workspace administrator
    Admin,
    /// Unrecognized role string read from the service
    Other(String),
}

impl WorkspaceRole {
    /// Map a role string read from the service.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "User" => WorkspaceRole::User,
            "Admin" => WorkspaceRole::Admin,
            other => WorkspaceRole::Other(other.to_string()),
        }
    }

    /// The string written to the service when creating this permission.
    ///
    /// `NoAccess` has no wire form; it is expressed by deleting the record.
    pub fn to_wire(&self) -> Result<&'static str> {
        match self {
            WorkspaceRole::User => Ok("User"),
            WorkspaceRole::Admin => Ok("Admin"),
            WorkspaceRole::NoAccess => Err(SyncError::invalid_role(
                "No Access has no wire form; delete the permission instead",
            )),
            WorkspaceRole::Other(value) => Err(SyncError::invalid_role(value.clone())),
        }
    }

    /// Parse a role from a batch input file.
    ///
    /// Input files in the field carry `Viewer`/`Editor` in workspace rows from
    /// an older vocabulary; both map to `User`, the role that would actually
    /// be written.
    pub fn from_input(value: &str) -> Result<Self> {
        match value {
            "No Access" => Ok(WorkspaceRole::NoAccess),
            "User" | "Viewer" | "Editor" => Ok(WorkspaceRole::User),
            "Admin" => Ok(WorkspaceRole::Admin),
            other => Err(SyncError::invalid_role(other.to_string())),
        }
    }
}

impl RoleScale for WorkspaceRole {
    fn rank(&self) -> Option<u8> {
        match self {
            WorkspaceRole::NoAccess => Some(0),
            WorkspaceRole::User => Some(1),
            WorkspaceRole::Admin => Some(2),
            WorkspaceRole::Other(_) => None,
        }
    }

    fn is_max_admin(&self) -> bool {
        matches!(self, WorkspaceRole::Admin)
    }

    fn is_no_access(&self) -> bool {
        matches!(self, WorkspaceRole::NoAccess)
    }
}

impl fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceRole::NoAccess => write!(f, "No Access"),
            WorkspaceRole::User => write!(f, "User"),
            WorkspaceRole::Admin => write!(f, "Admin"),
            WorkspaceRole::Other(value) => write!(f, "{}", value),
        }
    }
}

/// Project-scope role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRole {
    /// No access to the project
    NoAccess,
    /// Read-only access
    Viewer,
    /// Read-write access
    Editor,
    /// Project administrator
    ProjectAdmin,
    /// Unrecognized role string read from the service
    Other(String),
}

impl ProjectRole {
    /// Map a role string read from the service.
    ///
    /// The service reports project admins as plain `"Admin"`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "Viewer" => ProjectRole::Viewer,
            "Editor" => ProjectRole::Editor,
            "Admin" | "Project Admin" => ProjectRole::ProjectAdmin,
            other => ProjectRole::Other(other.to_string()),
        }
    }

    /// The string written to the service when creating this permission.
    ///
    /// The service requires `"Project Admin"` on create even though it reads
    /// the same grant back as `"Admin"`.
    pub fn to_wire(&self) -> Result<&'static str> {
        match self {
            ProjectRole::Viewer => Ok("Viewer"),
            ProjectRole::Editor => Ok("Editor"),
            ProjectRole::ProjectAdmin => Ok("Project Admin"),
            ProjectRole::NoAccess => Err(SyncError::invalid_role(
                "No Access has no wire form; delete the permission instead",
            )),
            ProjectRole::Other(value) => Err(SyncError::invalid_role(value.clone())),
        }
    }

    /// Parse a role from a batch input file.
    ///
    /// `User` maps to `Editor` for the same legacy-vocabulary reason the
    /// workspace scale accepts `Viewer`/`Editor`.
    pub fn from_input(value: &str) -> Result<Self> {
        match value {
            "No Access" => Ok(ProjectRole::NoAccess),
            "Viewer" => Ok(ProjectRole::Viewer),
            "Editor" | "User" => Ok(ProjectRole::Editor),
            "Admin" | "Project Admin" => Ok(ProjectRole::ProjectAdmin),
            other => Err(SyncError::invalid_role(other.to_string())),
        }
    }
}

impl RoleScale for ProjectRole {
    fn rank(&self) -> Option<u8> {
        match self {
            ProjectRole::NoAccess => Some(0),
            ProjectRole::Viewer => Some(1),
            ProjectRole::Editor => Some(2),
            ProjectRole::ProjectAdmin => Some(3),
            ProjectRole::Other(_) => None,
        }
    }

    fn is_max_admin(&self) -> bool {
        matches!(self, ProjectRole::ProjectAdmin)
    }

    fn is_no_access(&self) -> bool {
        matches!(self, ProjectRole::NoAccess)
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectRole::NoAccess => write!(f, "No Access"),
            ProjectRole::Viewer => write!(f, "Viewer"),
            ProjectRole::Editor => write!(f, "Editor"),
            ProjectRole::ProjectAdmin => write!(f, "Project Admin"),
            ProjectRole::Other(value) => write!(f, "{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_ranks_are_ordered() {
        assert!(ProjectRole::NoAccess.rank() < ProjectRole::Viewer.rank());
        assert!(ProjectRole::Viewer.rank() < ProjectRole::Editor.rank());
        assert!(ProjectRole::Editor.rank() < ProjectRole::ProjectAdmin.rank());
    }

    #[test]
    fn absence_is_always_an_upgrade() {
        assert!(ProjectRole::is_upgrade(None, &ProjectRole::Viewer));
        assert!(ProjectRole::is_upgrade(None, &ProjectRole::NoAccess));
        assert!(WorkspaceRole::is_upgrade(None, &WorkspaceRole::User));
    }

    #[test]
    fn max_admin_is_never_upgradable() {
        for proposed in [
            ProjectRole::NoAccess,
            ProjectRole::Viewer,
            ProjectRole::Editor,
            ProjectRole::ProjectAdmin,
        ] {
            assert!(!ProjectRole::is_upgrade(
                Some(&ProjectRole::ProjectAdmin),
                &proposed
            ));
        }
        assert!(!WorkspaceRole::is_upgrade(
            Some(&WorkspaceRole::Admin),
            &WorkspaceRole::Admin
        ));
    }

    #[test]
    fn upgrades_follow_rank() {
        assert!(ProjectRole::is_upgrade(
            Some(&ProjectRole::Viewer),
            &ProjectRole::Editor
        ));
        assert!(!ProjectRole::is_upgrade(
            Some(&ProjectRole::Editor),
            &ProjectRole::Viewer
        ));
        assert!(!ProjectRole::is_upgrade(
            Some(&ProjectRole::Editor),
            &ProjectRole::Editor
        ));
        assert!(WorkspaceRole::is_upgrade(
            Some(&WorkspaceRole::User),
            &WorkspaceRole::Admin
        ));
    }

    #[test]
    fn unranked_roles_never_upgrade_but_always_differ() {
        let corrupted = ProjectRole::Other("Superuser".to_string());
        assert!(!ProjectRole::is_upgrade(Some(&corrupted), &ProjectRole::Editor));
        assert!(!ProjectRole::is_upgrade(Some(&ProjectRole::Viewer), &corrupted));
        assert!(ProjectRole::is_different(Some(&corrupted), &ProjectRole::Editor));
        assert!(ProjectRole::is_different(
            Some(&corrupted),
            &ProjectRole::Other("Superuser".to_string())
        ));
    }

    #[test]
    fn difference_detection() {
        assert!(ProjectRole::is_different(None, &ProjectRole::NoAccess));
        assert!(!ProjectRole::is_different(
            Some(&ProjectRole::Editor),
            &ProjectRole::Editor
        ));
        assert!(ProjectRole::is_different(
            Some(&ProjectRole::Editor),
            &ProjectRole::Viewer
        ));
    }

    #[test]
    fn project_admin_wire_mapping_is_asymmetric() {
        assert_eq!(ProjectRole::from_wire("Admin"), ProjectRole::ProjectAdmin);
        assert_eq!(
            ProjectRole::from_wire("Project Admin"),
            ProjectRole::ProjectAdmin
        );
        assert_eq!(ProjectRole::ProjectAdmin.to_wire().unwrap(), "Project Admin");
    }

    #[test]
    fn no_access_has_no_wire_form() {
        assert!(ProjectRole::NoAccess.to_wire().is_err());
        assert!(WorkspaceRole::NoAccess.to_wire().is_err());
    }

    #[test]
    fn legacy_input_strings_are_coerced() {
        assert_eq!(
            WorkspaceRole::from_input("Editor").unwrap(),
            WorkspaceRole::User
        );
        assert_eq!(
            WorkspaceRole::from_input("Viewer").unwrap(),
            WorkspaceRole::User
        );
        assert_eq!(ProjectRole::from_input("User").unwrap(), ProjectRole::Editor);
    }

    #[test]
    fn unknown_input_is_rejected() {
        assert!(ProjectRole::from_input("Owner").is_err());
        assert!(WorkspaceRole::from_input("Owner").is_err());
    }
}
