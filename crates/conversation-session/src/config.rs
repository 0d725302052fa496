//! Session and watcher configuration.

use std::env;
use std::time::Duration;

use chat_core::DEFAULT_MAX_ATTACHMENT_BYTES;

/// How long a typing indicator stays up after the last signal.
pub const DEFAULT_TYPING_DECAY: Duration = Duration::from_secs(3);

/// Poll interval while push delivery is unavailable.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Backoff for retrying failed refreshes.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt.min(32) as i32);
        let delay = Duration::from_millis(delay_ms.min(u64::MAX as f64) as u64);
        delay.min(self.max_delay)
    }

    /// Check if we should retry after the given number of attempts.
    pub fn should_retry(&self, attempts: u32) -> bool {
        self.max_retries.map_or(true, |max| attempts < max)
    }
}

/// Configuration for a conversation session and the unread watcher.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Typing indicator decay window.
    pub typing_decay: Duration,
    /// Poll interval while push delivery is unavailable.
    pub poll_interval: Duration,
    /// Client-side size ceiling checked before upload.
    pub max_attachment_bytes: usize,
    /// Backoff for unread refresh retries.
    pub retry: RetryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            typing_decay: DEFAULT_TYPING_DECAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            retry: RetryConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create configuration from environment variables.
    ///
    /// - `CHAT_TYPING_DECAY_MS` - Default: 3000
    /// - `CHAT_POLL_INTERVAL_SECS` - Default: 5
    /// - `CHAT_UPLOAD_MAX_BYTES` - Default: 5242880
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_u64("CHAT_TYPING_DECAY_MS") {
            config.typing_decay = Duration::from_millis(ms);
        }
        if let Some(secs) = env_u64("CHAT_POLL_INTERVAL_SECS").filter(|s| *s > 0) {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(max) = env_u64("CHAT_UPLOAD_MAX_BYTES") {
            config.max_attachment_bytes = max as usize;
        }

        config
    }

    /// Builder method to set the typing decay window.
    pub fn with_typing_decay(mut self, decay: Duration) -> Self {
        self.typing_decay = decay;
        self
    }

    /// Builder method to set the degraded-mode poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builder method to set the client-side attachment ceiling.
    pub fn with_max_attachment_bytes(mut self, max: usize) -> Self {
        self.max_attachment_bytes = max;
        self
    }

    /// Builder method to set the retry backoff.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(retry.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(retry.delay_for_attempt(20), Duration::from_secs(30));
        assert!(retry.should_retry(1_000));

        let bounded = RetryConfig {
            max_retries: Some(2),
            ..RetryConfig::default()
        };
        assert!(bounded.should_retry(1));
        assert!(!bounded.should_retry(2));
    }
}
