//! # permsync
//!
//! Directory-driven synchronization of users, permissions, and team
//! memberships for a project-management SaaS subscription.
//!
//! The core is the permission reconciliation engine: given a user's current
//! permission state (fetched from the remote directory service) and a desired
//! state (from a delimited input file or another user's permissions), it
//! computes and applies a minimal, safe set of create/update/delete
//! operations, honoring monotonic upgrade-only semantics, hierarchical admin
//! overrides, and a local disk cache of the slowly-changing subscription /
//! workspace / project topology.
//!
//! ## Library use
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use permsync::{
//!     AdminOverrideScope, Config, DirectoryClient, DirectoryService, ProjectRole,
//!     ReconcileEngine, ReconcileOptions, RestDirectory, TopologyCache,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("permsync.yaml")?;
//!     let service: Arc<dyn DirectoryService> =
//!         Arc::new(RestDirectory::new(&config.service)?);
//!     let topology = Arc::new(TopologyCache::new(&config.cache.dir, config.cache.policy()));
//!     topology.ensure_fresh(service.as_ref()).await?;
//!
//!     let client = DirectoryClient::new(service, topology);
//!     let mut engine = ReconcileEngine::new(client, ReconcileOptions {
//!         upgrade_only: true,
//!         admin_override: AdminOverrideScope::WorkspaceOnly,
//!         dry_run: false,
//!     });
//!
//!     let project = engine.client().find_project("777").await?.unwrap();
//!     engine.apply_project_role("mark@acme.com", &project, &ProjectRole::Editor).await?;
//!     println!("{}", engine.stats());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod core;
pub mod directory;
pub mod drivers;
pub mod utils;

// Re-export the main types
pub use cache::{CachePolicy, OnStale, StaleReason, TopologyCache, UserCache};
pub use config::Config;
pub use core::engine::{
    AdminOverrideScope, Outcome, ReconcileEngine, ReconcileOptions, RunStats, SyncReport,
};
pub use core::models::{
    ContainerState, Permission, Project, ProjectPermission, ProjectRef, ProjectRole, RoleScale,
    Subscription, TeamMembership, User, UserFields, UserProfile, Workspace, WorkspacePermission,
    WorkspaceRef, WorkspaceRole,
};
pub use directory::{
    DirectoryClient, DirectoryService, InMemoryDirectory, Mutation, RestDirectory,
};
pub use utils::error::{Result, SyncError};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_manifest() {
        assert_eq!(NAME, "permsync");
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
