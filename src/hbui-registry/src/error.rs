//! Error types for hbui-registry.

use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while talking to the registry or GitHub.
#[derive(Debug, Error)]
pub enum RegistryError {
    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to connect to {service}: {message}")]
    ConnectionFailed { service: String, message: String },

    #[error("{service} returned error {status}: {message}")]
    ServerError {
        service: String,
        status: u16,
        message: String,
    },

    // Lookup errors
    #[error("Package not found: {name}")]
    NotFound { name: String },

    #[error("Not a GitHub repository URL: {url}")]
    NotGithub { url: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistryError {
    /// Check if this error is a "not found" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NotGithub { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::NotFound {
            name: "homebridge-foo".to_string(),
        };
        assert_eq!(err.to_string(), "Package not found: homebridge-foo");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_server_error_display() {
        let err = RegistryError::ServerError {
            service: "registry".to_string(),
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("503"));
    }
}
