//! Plugin management error types.

use hbui_registry::RegistryError;
use thiserror::Error;

/// Message reported to the client when a package manager command fails.
pub const COMMAND_FAILED_MESSAGE: &str = "Command failed. Please review log for details";

/// Plugin management errors.
#[derive(Error, Debug)]
pub enum PluginError {
    /// Plugin, schema, changelog or release not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Registry or code-hosting API failure.
    #[error("External service error: {0}")]
    External(#[from] RegistryError),

    /// The package manager exited with a non-zero code.
    #[error("{0}")]
    CommandFailed(String),

    /// Package manager or install location could not be determined.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid package manifest.
    #[error("Invalid manifest for '{plugin}': {message}")]
    InvalidManifest { plugin: String, message: String },

    /// PTY could not be created or the process could not be spawned.
    #[error("Failed to start command: {0}")]
    Pty(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PluginError {
    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create an invalid manifest error.
    pub fn invalid_manifest(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// The generic failure reported for a non-zero exit.
    pub fn command_failed() -> Self {
        Self::CommandFailed(COMMAND_FAILED_MESSAGE.to_string())
    }

    /// Check if this is a "not found" outcome.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::External(e) => e.is_not_found(),
            _ => false,
        }
    }
}

/// Result type alias for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PluginError::not_found("homebridge-foo");
        assert_eq!(err.to_string(), "Not found: homebridge-foo");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_command_failed_message() {
        let err = PluginError::command_failed();
        assert_eq!(err.to_string(), COMMAND_FAILED_MESSAGE);
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_registry_not_found_is_not_found() {
        let err: PluginError = RegistryError::NotFound {
            name: "homebridge-foo".to_string(),
        }
        .into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let plugin_err: PluginError = io_err.into();
        assert!(matches!(plugin_err, PluginError::Io(_)));
    }
}
