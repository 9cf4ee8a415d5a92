//! services/web/src/error.rs
//!
//! Defines the primary error type for the entire web service and how it is
//! rendered as an HTTP response.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use matchmaking_core::ports::PortError;
use serde::Serialize;
use serde_json::json;

/// The primary error type for the `web` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A submitted form failed validation.
    #[error("Validation failed")]
    Validation(#[from] validator::ValidationErrors),

    /// The submitted anti-forgery token did not match the issued one.
    #[error("Invalid or missing CSRF token")]
    Csrf,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

fn internal(err: &dyn std::fmt::Debug) -> (StatusCode, String, Option<serde_json::Value>) {
    tracing::error!("Internal error: {:?}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "An internal server error occurred".to_string(),
        None,
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ApiError::Validation(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation failed".to_string(),
                Some(json!(err.field_errors())),
            ),
            ApiError::Csrf => (
                StatusCode::FORBIDDEN,
                "Invalid or missing CSRF token".to_string(),
                None,
            ),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            ApiError::Port(PortError::Unauthorized) => {
                (StatusCode::UNAUTHORIZED, "Authentication required".to_string(), None)
            }
            ApiError::Port(PortError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Port(PortError::Rejected(msg)) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Port(ref err @ PortError::Unexpected(_)) => {
                tracing::error!("Upstream service error: {:?}", err);
                (
                    StatusCode::BAD_GATEWAY,
                    "Upstream service unavailable".to_string(),
                    None,
                )
            }
            ApiError::Config(ref err) => internal(err),
            ApiError::Database(ref err) => internal(err),
            ApiError::Migration(ref err) => internal(err),
            ApiError::Io(ref err) => internal(err),
            ApiError::Internal(ref msg) => internal(msg),
        };

        (status, Json(ErrorResponse { message, details })).into_response()
    }
}
