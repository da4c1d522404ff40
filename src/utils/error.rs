//! Error types for the synchronizer

use thiserror::Error;

/// Result type alias for the synchronizer
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for the synchronizer
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The directory service rejected a request
    #[error("Directory service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// More than one open container shares the requested name
    #[error("Ambiguous name: {0}")]
    AmbiguousName(String),

    /// Unrecognized role string
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// The remote refused a deletion that would leave zero permissions
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A required input field was absent
    #[error("Missing required field(s): {0}")]
    MissingField(String),

    /// Cache errors
    #[error("Cache error: {0}")]
    Cache(String),
}

/// Helper functions for creating specific errors
impl SyncError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth(message.into())
    }

    pub fn service<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Service {
            status,
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    pub fn ambiguous_name<S: Into<String>>(message: S) -> Self {
        Self::AmbiguousName(message.into())
    }

    pub fn invalid_role<S: Into<String>>(message: S) -> Self {
        Self::InvalidRole(message.into())
    }

    pub fn constraint_violation<S: Into<String>>(message: S) -> Self {
        Self::ConstraintViolation(message.into())
    }

    pub fn missing_field<S: Into<String>>(message: S) -> Self {
        Self::MissingField(message.into())
    }

    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache(message.into())
    }

    /// Whether this error should abort the whole run.
    ///
    /// Connection, authentication, configuration, and file IO failures are
    /// fatal. Everything else is recoverable at row/operation level: the
    /// offending row is skipped with a log entry and the run continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Http(_) | SyncError::Auth(_) | SyncError::Config(_) | SyncError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_level_errors_are_recoverable() {
        assert!(!SyncError::not_found("user x").is_fatal());
        assert!(!SyncError::ambiguous_name("Alpha").is_fatal());
        assert!(!SyncError::invalid_role("Superuser").is_fatal());
        assert!(!SyncError::constraint_violation("last permission").is_fatal());
        assert!(!SyncError::missing_field("UserName").is_fatal());
    }

    #[test]
    fn setup_errors_are_fatal() {
        assert!(SyncError::auth("bad credentials").is_fatal());
        assert!(SyncError::config("no base url").is_fatal());
        assert!(SyncError::Io(std::io::Error::other("disk gone")).is_fatal());
    }

    #[test]
    fn service_errors_carry_status() {
        let err = SyncError::service(422, "cannot delete");
        assert_eq!(
            err.to_string(),
            "Directory service error (422): cannot delete"
        );
    }
}
