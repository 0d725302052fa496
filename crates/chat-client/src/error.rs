//! Error types for chat-client.

use chat_core::wire::ErrorBody;
use chat_core::ChatError;
use thiserror::Error;

/// Errors that can occur when talking to the chat server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a structured error.
    #[error("API error {status}: {}", .body.error.message)]
    Api { status: u16, body: ErrorBody },

    /// The server answered with an unstructured error.
    #[error("Unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// Server health check failed.
    #[error("Health check failed")]
    HealthCheckFailed,

    /// SSE stream error.
    #[error("SSE error: {0}")]
    Sse(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Build an error from a failed response, keeping the server's error body.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        match response.text().await {
            Ok(text) => match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => ClientError::Api { status, body },
                Err(_) => ClientError::Status {
                    status,
                    message: text,
                },
            },
            Err(e) => ClientError::Http(e),
        }
    }
}

impl From<ClientError> for ChatError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api { body, .. } => body.into_chat_error(),
            ClientError::Sse(message) => ChatError::DeliveryUnavailable(message),
            other => ChatError::Transport(other.to_string()),
        }
    }
}
