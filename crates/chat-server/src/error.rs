//! Error types for the chat server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chat_core::wire::ErrorBody;
use chat_core::ChatError;
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned from request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or wrong bearer token, or no acting user.
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    /// The chat core refused or failed the operation.
    #[error(transparent)]
    Chat(#[from] ChatError),
}

/// HTTP status for a chat error.
pub fn status_for(err: &ChatError) -> StatusCode {
    match err {
        ChatError::NotFound { .. } => StatusCode::NOT_FOUND,
        ChatError::AccessDenied(_) | ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
        ChatError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ChatError::ChatUnavailable { .. } => StatusCode::CONFLICT,
        ChatError::UploadFailed(_) => StatusCode::BAD_GATEWAY,
        ChatError::DeliveryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ChatError::Storage(_) | ChatError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Unauthorized(reason) => {
                warn!("Unauthorized request: {}", reason);
                (
                    StatusCode::UNAUTHORIZED,
                    ErrorBody::other("auth_error", format!("Unauthorized: {}", reason)),
                )
            }
            ApiError::Chat(err) => {
                let status = status_for(err);
                if status.is_server_error() {
                    error!("Request failed: {}", err);
                }
                (status, ErrorBody::from(err))
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] chat_database::DatabaseError),

    #[error("Upload configuration error: {0}")]
    Upload(#[from] attachment_uploader::UploadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&ChatError::not_found("Booking", "x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ChatError::AccessDenied("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&ChatError::ChatUnavailable {
                booking_id: "b".into(),
                status: "completed".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ChatError::UploadFailed("timeout".into())),
            StatusCode::BAD_GATEWAY
        );
    }
}
