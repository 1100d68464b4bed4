use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// AppResult
///
/// Result alias used by every layer below the router: identity, guard, content
/// operations and both repository implementations.
pub type AppResult<T> = Result<T, AppError>;

/// AppError
///
/// The error taxonomy of the service. Each variant maps to exactly one HTTP status
/// and renders as `{"error": "<message>"}`.
///
/// `Unauthorized` (no or bad credentials) and `Forbidden` (authenticated, wrong role)
/// are kept apart on purpose: clients react to them differently.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or expired token, or rejected credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated caller without the required role.
    #[error("{0}")]
    Forbidden(String),

    /// Referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation (duplicate email, duplicate subscription).
    #[error("{0}")]
    Conflict(String),

    /// Request body over the configured upload limit.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Anything unexpected. The message is logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(resource: &str) -> Self {
        Self::NotFound(format!("{resource} not found"))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The generic credential failure. Used for unknown emails and wrong passwords alike.
    pub fn invalid_credentials() -> Self {
        Self::Unauthorized("Invalid credentials".to_string())
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // Duplicates answer 400 to stay compatible with the existing frontend.
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict("Resource already exists".to_string())
            }
            sqlx::Error::RowNotFound => Self::not_found("Resource"),
            _ => Self::Internal(format!("database: {err}")),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(err.body_text())
        } else {
            Self::Validation(err.body_text())
        }
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}
