//! Caching facade over the directory service
//!
//! Resolves users and containers with the process-lifetime caches in front
//! of the service. Every mutation to a user must be followed by
//! [`DirectoryClient::refresh_user`] before further decisions about that
//! user; the engine does this after each applied change.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{TopologyCache, UserCache};
use crate::core::models::{Project, User, UserFields, Workspace};
use crate::directory::DirectoryService;
use crate::utils::error::{Result, SyncError};

/// Identity and container resolution with caching
pub struct DirectoryClient {
    service: Arc<dyn DirectoryService>,
    topology: Arc<TopologyCache>,
    users: UserCache,
}

impl DirectoryClient {
    pub fn new(service: Arc<dyn DirectoryService>, topology: Arc<TopologyCache>) -> Self {
        Self {
            service,
            topology,
            users: UserCache::new(),
        }
    }

    /// The underlying service, for operations with no cache interaction.
    pub fn service(&self) -> &dyn DirectoryService {
        self.service.as_ref()
    }

    pub fn topology(&self) -> &TopologyCache {
        &self.topology
    }

    /// Find a user by username.
    ///
    /// The service stores usernames lowercase, so the lookup is normalized
    /// first; a mixed-case input must never read as a miss.
    pub async fn find_user(&self, username: &str) -> Result<Option<User>> {
        let lookup = username.to_lowercase();
        if lookup != username {
            info!("Looking for {} instead of {}", lookup, username);
        }

        if let Some(user) = self.users.get(&lookup) {
            return Ok(Some(user));
        }

        match self.service.find_user(&lookup).await? {
            Some(user) => {
                info!("Caching user {}", user.username);
                self.users.insert(user.clone());
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Force a re-fetch, overwriting the cached entry.
    ///
    /// Required after any mutation to the user; the cache would otherwise
    /// serve stale permissions and cause redundant or wrong delta decisions.
    pub async fn refresh_user(&self, username: &str) -> Result<Option<User>> {
        let lookup = username.to_lowercase();
        match self.service.find_user(&lookup).await? {
            Some(user) => {
                info!("Refreshed user {}", user.username);
                self.users.insert(user.clone());
                Ok(Some(user))
            }
            None => {
                self.users.invalidate(&lookup);
                Ok(None)
            }
        }
    }

    /// Create a user, then fetch and cache the full created object.
    pub async fn create_user(&self, username: &str, fields: &UserFields) -> Result<User> {
        let username = username.to_lowercase();
        self.service.create_user(&username, fields).await?;
        info!("Created user {}", username);

        self.refresh_user(&username)
            .await?
            .ok_or_else(|| SyncError::not_found(format!("created user {} not readable", username)))
    }

    /// Flip the disabled flag. Returns false when already in the desired
    /// state (no mutation issued).
    pub async fn set_user_enabled(&self, user: &User, enabled: bool) -> Result<bool> {
        let desired_disabled = !enabled;
        if user.disabled == desired_disabled {
            info!(
                "{} already {}",
                user.username,
                if enabled { "enabled" } else { "disabled" }
            );
            return Ok(false);
        }

        self.service
            .set_user_disabled(&user.ref_, desired_disabled)
            .await?;
        info!(
            "{} {}",
            user.username,
            if enabled { "enabled" } else { "disabled" }
        );
        self.refresh_user(&user.username).await?;
        Ok(true)
    }

    /// Open workspace by identifier, topology cache first.
    pub async fn find_workspace(&self, id: &str) -> Result<Option<Workspace>> {
        if let Some(workspace) = self.topology.workspace(id) {
            return Ok(Some(workspace));
        }
        match self.service.workspace_by_id(id).await? {
            Some(workspace) => {
                info!("Caching workspace {}", workspace.name);
                self.topology.insert_workspace(workspace.clone());
                Ok(Some(workspace))
            }
            None => {
                warn!("Workspace {} not found", id);
                Ok(None)
            }
        }
    }

    /// Open project by identifier, topology cache first.
    pub async fn find_project(&self, id: &str) -> Result<Option<Project>> {
        if let Some(project) = self.topology.project(id) {
            return Ok(Some(project));
        }
        match self.service.project_by_id(id).await? {
            Some(project) => {
                info!("Caching project {}", project.name);
                self.topology.insert_project(project.clone());
                Ok(Some(project))
            }
            None => {
                warn!("Project {} not found", id);
                Ok(None)
            }
        }
    }

    /// Workspace by name, with a duplicate flag.
    ///
    /// When several open workspaces share the name, only the first instance
    /// is usable and the caller must not guess which one was intended; the
    /// ambiguity is surfaced, never resolved here.
    pub async fn find_workspace_by_name(&self, name: &str) -> Result<Option<(Workspace, bool)>> {
        if let Some((workspace, duplicate)) = self.topology.workspace_by_name(name) {
            if duplicate {
                warn_duplicate("workspace", name);
            }
            return Ok(Some((workspace, duplicate)));
        }

        let mut matches = self.service.workspaces_by_name(name).await?;
        if matches.is_empty() {
            warn!("Workspace {} not found", name);
            return Ok(None);
        }
        let duplicate = matches.len() > 1;
        if duplicate {
            warn_duplicate("workspace", name);
        }
        let workspace = matches.swap_remove(0);
        self.topology.insert_workspace(workspace.clone());
        Ok(Some((workspace, duplicate)))
    }

    /// Project by name, with a duplicate flag.
    pub async fn find_project_by_name(&self, name: &str) -> Result<Option<(Project, bool)>> {
        if let Some((project, duplicate)) = self.topology.project_by_name(name) {
            if duplicate {
                warn_duplicate("project", name);
            }
            return Ok(Some((project, duplicate)));
        }

        let mut matches = self.service.projects_by_name(name).await?;
        if matches.is_empty() {
            warn!("Project {} not found", name);
            return Ok(None);
        }
        let duplicate = matches.len() > 1;
        if duplicate {
            warn_duplicate("project", name);
        }
        let project = matches.swap_remove(0);
        self.topology.insert_project(project.clone());
        Ok(Some((project, duplicate)))
    }
}

fn warn_duplicate(kind: &str, name: &str) {
    warn!("More than one {} named {} found", kind, name);
    warn!("Returning only the first instance found");
}
