//! Error taxonomy for chat operations.

use thiserror::Error;

/// Errors that can occur while resolving, reading, or writing a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The booking, conversation, or message does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The acting user is not a participant of the conversation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The acting user is a participant but may not perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Input failed validation (empty body, wrong attachment type or size).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The booking exists but is not in a status where chat is open.
    #[error("chat unavailable for booking {booking_id} (status: {status})")]
    ChatUnavailable { booking_id: String, status: String },

    /// Blob storage rejected or did not finish the upload in time.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// A push subscription could not be established.
    #[error("delivery unavailable: {0}")]
    DeliveryUnavailable(String),

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Failure talking to a remote backend.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ChatError {
    /// Shorthand for a missing entity.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Whether the caller should offer a retry instead of giving up.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UploadFailed(_) | Self::DeliveryUnavailable(_) | Self::Storage(_) | Self::Transport(_)
        )
    }

    /// Stable snake_case name of the variant, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AccessDenied(_) => "access_denied",
            Self::Forbidden(_) => "forbidden",
            Self::Validation(_) => "validation",
            Self::ChatUnavailable { .. } => "chat_unavailable",
            Self::UploadFailed(_) => "upload_failed",
            Self::DeliveryUnavailable(_) => "delivery_unavailable",
            Self::Storage(_) => "storage",
            Self::Transport(_) => "transport",
        }
    }

    /// Whether the error is an authorization failure.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_) | Self::Forbidden(_))
    }
}

/// Result type for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
