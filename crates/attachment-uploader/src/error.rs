use std::time::Duration;

use chat_core::{AttachmentRejection, ChatError};
use thiserror::Error;

/// Errors that can occur while uploading an attachment.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The payload was refused before any bytes were stored.
    #[error("Rejected attachment: {0}")]
    Rejected(#[from] AttachmentRejection),

    /// Storage did not finish within the configured bound.
    #[error("Upload timed out after {0:?}")]
    TimedOut(Duration),

    /// The storage backend refused the write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A storage key escaped its namespace.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// IO error while writing the blob.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<UploadError> for ChatError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Rejected(rejection) => rejection.into(),
            other => ChatError::UploadFailed(other.to_string()),
        }
    }
}
