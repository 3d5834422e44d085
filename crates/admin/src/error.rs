//! Unified error handling for admin.

use atelie_core::shipping::EditorError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;

/// Application-level error type for the admin service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Reading or saving provider configuration failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// An editor command was rejected.
    #[error("Invalid edit: {0}")]
    Editor(#[from] EditorError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Backend(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Admin request error"
            );
        }

        let status = match &self {
            Self::Backend(BackendError::Unauthorized | BackendError::RateLimited(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::Editor(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Backend(_) => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
