//! Configuration management
//!
//! One immutable [`Config`] is built at startup and handed into each
//! component's constructor. Nothing reads ambient process state after that
//! point.

mod models;

pub use models::{CacheConfig, LoggingConfig, ReconcileSettings, ServiceConfig};

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::error::{Result, SyncError};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory service connection
    pub service: ServiceConfig,
    /// Topology cache behavior
    pub cache: CacheConfig,
    /// Reconciliation behavior
    pub reconcile: ReconcileSettings,
    /// Logging destinations
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env();
        config.validate()?;

        debug!("Configuration loaded from {:?}", path);
        Ok(config)
    }

    /// Override file-based settings from environment variables.
    ///
    /// Credentials in particular should come from the environment rather than
    /// a file checked into version control.
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var("PERMSYNC_URL") {
            self.service.base_url = url;
        }
        if let Ok(username) = env::var("PERMSYNC_USERNAME") {
            self.service.username = username;
        }
        if let Ok(password) = env::var("PERMSYNC_PASSWORD") {
            self.service.password = password;
        }
        if let Ok(api_key) = env::var("PERMSYNC_API_KEY") {
            self.service.api_key = Some(api_key);
        }
    }

    /// Validate settings that every run depends on.
    pub fn validate(&self) -> Result<()> {
        if self.service.base_url.is_empty() {
            return Err(SyncError::config("service.base_url is required"));
        }
        url::Url::parse(&self.service.base_url)
            .map_err(|e| SyncError::config(format!("service.base_url is not a valid URL: {e}")))?;

        if self.service.api_key.is_none()
            && (self.service.username.is_empty() || self.service.password.is_empty())
        {
            return Err(SyncError::config(
                "either service.api_key or service.username + service.password is required",
            ));
        }

        if self.service.page_size == 0 {
            return Err(SyncError::config("service.page_size must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.service.base_url = "https://agile.example.com/slm".to_string();
        config.service.username = "admin@example.com".to_string();
        config.service.password = "secret".to_string();
        config
    }

    #[test]
    fn defaults_match_operational_expectations() {
        let config = Config::default();
        assert_eq!(config.cache.max_age_days, 1);
        assert_eq!(config.service.page_size, 200);
        assert_eq!(config.reconcile.field_delimiter, '\t');
        assert!(!config.reconcile.upgrade_only);
        assert!(config.reconcile.sync_team_memberships);
        assert!(!config.reconcile.sync_workspace_permissions);
    }

    #[test]
    fn validate_requires_base_url() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_credentials() {
        let mut config = valid_config();
        config.service.password = String::new();
        assert!(config.validate().is_err());

        config.service.api_key = Some("_abc123".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_malformed_url() {
        let mut config = valid_config();
        config.service.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_round_trip() {
        let config = valid_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.service.base_url, config.service.base_url);
        assert_eq!(parsed.cache.max_age_days, config.cache.max_age_days);
    }
}
