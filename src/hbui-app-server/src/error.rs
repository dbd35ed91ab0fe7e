//! Error types for the app server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hbui_plugins::PluginError;
use serde::Serialize;
use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Plugin, schema, changelog or release not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Registry or GitHub failure.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Package manager command failed.
    #[error("{0}")]
    CommandFailed(String),

    /// Server or plugin configuration problem.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed client input.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::CommandFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::ExternalService(_) => "external_service_error",
            Self::CommandFailed(_) => "command_failed",
            Self::Configuration(_) => "configuration_error",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), "{}", self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for the app server.
pub type AppResult<T> = Result<T, AppError>;

impl From<PluginError> for AppError {
    fn from(error: PluginError) -> Self {
        if error.is_not_found() {
            return Self::NotFound(match error {
                PluginError::NotFound(what) => what,
                other => other.to_string(),
            });
        }

        match error {
            PluginError::External(e) => Self::ExternalService(e.to_string()),
            PluginError::CommandFailed(message) => Self::CommandFailed(message),
            PluginError::Configuration(message) => Self::Configuration(message),
            other => Self::Internal(other.to_string()),
        }
    }
}
