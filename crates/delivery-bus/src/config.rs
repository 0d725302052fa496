//! Bus configuration.

use std::env;

/// Channel capacities for each topic family.
///
/// A subscriber that falls more than `capacity` items behind loses the
/// oldest items and receives a resync marker instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Per-conversation message topic capacity.
    pub message_capacity: usize,
    /// Per-conversation typing topic capacity.
    pub typing_capacity: usize,
    /// Per-user inbox topic capacity.
    pub inbox_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            message_capacity: 256,
            typing_capacity: 32,
            inbox_capacity: 128,
        }
    }
}

impl BusConfig {
    /// Load capacities from `CHAT_BUS_MESSAGE_CAPACITY`,
    /// `CHAT_BUS_TYPING_CAPACITY` and `CHAT_BUS_INBOX_CAPACITY`, falling back
    /// to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            message_capacity: capacity_var("CHAT_BUS_MESSAGE_CAPACITY", defaults.message_capacity),
            typing_capacity: capacity_var("CHAT_BUS_TYPING_CAPACITY", defaults.typing_capacity),
            inbox_capacity: capacity_var("CHAT_BUS_INBOX_CAPACITY", defaults.inbox_capacity),
        }
    }

    /// Set the message topic capacity.
    pub fn with_message_capacity(mut self, capacity: usize) -> Self {
        self.message_capacity = capacity.max(1);
        self
    }

    /// Set the typing topic capacity.
    pub fn with_typing_capacity(mut self, capacity: usize) -> Self {
        self.typing_capacity = capacity.max(1);
        self
    }

    /// Set the inbox topic capacity.
    pub fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity.max(1);
        self
    }
}

fn capacity_var(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
