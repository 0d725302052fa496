//! Messaging configuration.

use std::env;

use chat_core::DEFAULT_ENGAGED_STATUSES;

/// Default page size for incremental history fetches.
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 200;

/// Policy knobs for the messaging core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingConfig {
    /// Booking statuses in which chat is interactive.
    pub engaged_statuses: Vec<String>,
    /// Upper bound on one incremental history page.
    pub history_page_size: u32,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            engaged_statuses: DEFAULT_ENGAGED_STATUSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
        }
    }
}

impl MessagingConfig {
    /// Create configuration from environment variables.
    ///
    /// - `CHAT_ENGAGED_STATUSES` - comma-separated, default `accepted,in_progress`
    /// - `CHAT_HISTORY_PAGE_SIZE` - default 200
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(statuses) = env::var("CHAT_ENGAGED_STATUSES") {
            let parsed = parse_statuses(&statuses);
            if !parsed.is_empty() {
                config.engaged_statuses = parsed;
            }
        }

        if let Some(size) = env::var("CHAT_HISTORY_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
        {
            config.history_page_size = size;
        }

        config
    }

    /// Builder method to set the engaged statuses.
    pub fn with_engaged_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engaged_statuses = statuses.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set the history page size.
    pub fn with_history_page_size(mut self, size: u32) -> Self {
        self.history_page_size = size.max(1);
        self
    }

    /// Whether chat is interactive for `status`.
    pub fn is_engaged(&self, status: &str) -> bool {
        self.engaged_statuses.iter().any(|s| s == status)
    }

    /// Clamp a requested page size to the configured bound.
    pub fn page_limit(&self, requested: u32) -> u32 {
        requested.clamp(1, self.history_page_size)
    }
}

fn parse_statuses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statuses() {
        assert_eq!(
            parse_statuses(" Accepted, in_progress ,,"),
            vec!["accepted".to_string(), "in_progress".to_string()]
        );
    }

    #[test]
    fn test_engaged_defaults() {
        let config = MessagingConfig::default();
        assert!(config.is_engaged("accepted"));
        assert!(config.is_engaged("in_progress"));
        assert!(!config.is_engaged("pending"));
        assert!(!config.is_engaged("completed"));
        assert_eq!(config.page_limit(0), 1);
        assert_eq!(config.page_limit(10_000), DEFAULT_HISTORY_PAGE_SIZE);
    }
}
