//! Configuration section types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cache::{CachePolicy, OnStale};

/// Directory service connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the directory service
    pub base_url: String,
    /// Account used for API calls
    pub username: String,
    /// Password for basic authentication
    pub password: String,
    /// API key; takes precedence over username/password when set
    pub api_key: Option<String>,
    /// Remote API version segment
    pub api_version: String,
    /// Query page size
    pub page_size: usize,
    /// Maximum records fetched per query
    pub limit: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            api_key: None,
            api_version: "v2.0".to_string(),
            page_size: 200,
            limit: 50_000,
            timeout_secs: 30,
        }
    }
}

/// Topology cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the cache files
    pub dir: PathBuf,
    /// Maximum age in days before the cache counts as stale
    pub max_age_days: u64,
    /// What to do when the cache is stale
    pub on_stale: OnStale,
}

impl CacheConfig {
    /// The staleness policy these settings describe.
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            max_age_days: self.max_age_days,
            on_stale: self.on_stale,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            max_age_days: 1,
            on_stale: OnStale::Refresh,
        }
    }
}

/// Reconciliation behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    /// Only apply changes that raise a user's access; suppress downgrades
    pub upgrade_only: bool,
    /// Decide and log but apply no mutations
    pub dry_run: bool,
    /// Sync project permissions in sync mode
    pub sync_project_permissions: bool,
    /// Sync workspace permissions in sync mode
    pub sync_workspace_permissions: bool,
    /// Sync team memberships in sync mode
    pub sync_team_memberships: bool,
    /// Field delimiter for batch input files
    pub field_delimiter: char,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            upgrade_only: false,
            dry_run: false,
            sync_project_permissions: true,
            sync_workspace_permissions: false,
            sync_team_memberships: true,
            field_delimiter: '\t',
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append-mode log file; disabled when unset
    pub file: Option<PathBuf>,
    /// Also log to the console
    pub console: bool,
    /// Default log level (overridden by RUST_LOG)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            console: true,
            level: "info".to_string(),
        }
    }
}
