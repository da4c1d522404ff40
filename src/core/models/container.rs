//! Containers: subscription, workspaces, and projects

/// Lifecycle state of a workspace or project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Open and eligible for synchronization
    Open,
    /// Closed; excluded from all synchronization and never cached
    Closed,
}

impl ContainerState {
    /// Parse the service's state string. Anything that is not `Closed`
    /// counts as open.
    pub fn parse(value: &str) -> Self {
        if value == "Closed" {
            ContainerState::Closed
        } else {
            ContainerState::Open
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Open => "Open",
            ContainerState::Closed => "Closed",
        }
    }
}

/// The subscription owning all workspaces
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscription {
    /// Subscription identifier
    pub id: String,
    /// Subscription name
    pub name: String,
}

/// Minimal reference to a workspace, as embedded in projects and permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRef {
    /// Opaque object identifier
    pub id: String,
    /// Workspace name
    pub name: String,
}

impl WorkspaceRef {
    /// Object reference path used in mutation payloads.
    pub fn object_ref(&self) -> String {
        format!("/workspace/{}", self.id)
    }
}

/// A workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Opaque object identifier
    pub id: String,
    /// Workspace name
    pub name: String,
    /// Lifecycle state
    pub state: ContainerState,
}

impl Workspace {
    pub fn is_open(&self) -> bool {
        self.state == ContainerState::Open
    }

    /// Object reference path used in mutation payloads.
    pub fn object_ref(&self) -> String {
        format!("/workspace/{}", self.id)
    }

    /// The minimal reference form of this workspace.
    pub fn to_ref(&self) -> WorkspaceRef {
        WorkspaceRef {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// A project, carrying a back-reference to its owning workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Opaque object identifier
    pub id: String,
    /// Project name
    pub name: String,
    /// Lifecycle state
    pub state: ContainerState,
    /// Owning workspace
    pub workspace: WorkspaceRef,
}

impl Project {
    pub fn is_open(&self) -> bool {
        self.state == ContainerState::Open
    }

    /// Object reference path used in mutation payloads.
    pub fn object_ref(&self) -> String {
        format!("/project/{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_parsing_treats_non_closed_as_open() {
        assert_eq!(ContainerState::parse("Open"), ContainerState::Open);
        assert_eq!(ContainerState::parse("Closed"), ContainerState::Closed);
        assert_eq!(ContainerState::parse(""), ContainerState::Open);
    }

    #[test]
    fn object_refs_use_type_prefixed_paths() {
        let workspace = Workspace {
            id: "100".to_string(),
            name: "Main".to_string(),
            state: ContainerState::Open,
        };
        assert_eq!(workspace.object_ref(), "/workspace/100");

        let project = Project {
            id: "777".to_string(),
            name: "Alpha".to_string(),
            state: ContainerState::Open,
            workspace: workspace.to_ref(),
        };
        assert_eq!(project.object_ref(), "/project/777");
    }
}
