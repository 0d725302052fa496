//! Configuration types for chat-client.

use std::env;
use std::time::Duration;

use crate::error::ClientError;
use crate::sse::ReconnectConfig;

/// Configuration for talking to a chat server as one user.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the chat server (e.g., "http://127.0.0.1:8790").
    pub base_url: String,
    /// The user this client acts as.
    pub user_id: String,
    /// Shared bearer token, if the server requires one.
    pub api_token: Option<String>,
    /// Timeout for ordinary requests. Event streams have none.
    pub timeout: Duration,
    /// Reconnection policy for event streams.
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    /// Create a configuration for `user_id` against `base_url`.
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: user_id.into(),
            api_token: None,
            timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CHAT_API_URL` | Server base URL | `http://127.0.0.1:8790` |
    /// | `CHAT_USER_ID` | Acting user | (required) |
    /// | `CHAT_API_TOKEN` | Shared bearer token | (none) |
    /// | `CHAT_CLIENT_TIMEOUT_SECS` | Request timeout | `30` |
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url =
            env::var("CHAT_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8790".to_string());
        let user_id = env::var("CHAT_USER_ID")
            .map_err(|_| ClientError::Config("CHAT_USER_ID is required".to_string()))?;

        let mut config = Self::new(base_url, user_id);
        config.api_token = env::var("CHAT_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        if let Ok(secs) = env::var("CHAT_CLIENT_TIMEOUT_SECS") {
            let secs = secs.parse().map_err(|_| {
                ClientError::Config(format!("invalid CHAT_CLIENT_TIMEOUT_SECS: {}", secs))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    /// `/v1/conversations/{id}`, with an optional trailing segment.
    pub fn conversation_url(&self, conversation_id: &str, tail: Option<&str>) -> String {
        let base = format!(
            "{}/v1/conversations/{}",
            self.base_url,
            urlencoding::encode(conversation_id)
        );
        match tail {
            Some(tail) => format!("{}/{}", base, tail),
            None => base,
        }
    }

    /// `/v1/messages/{id}`
    pub fn message_url(&self, message_id: i64) -> String {
        format!("{}/v1/messages/{}", self.base_url, message_id)
    }

    /// A user-scoped endpoint such as `unread` or `chats`.
    pub fn user_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8790", "")
    }
}
