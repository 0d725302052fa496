//! Push payloads carried by the delivery bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// A change to the message log of one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// A message was appended.
    Inserted { message: Message },
    /// A message changed (its read flag flipped).
    Updated { message: Message },
    /// A single message was deleted by its sender.
    Deleted {
        conversation_id: String,
        message_id: i64,
    },
    /// The whole thread was wiped by one participant.
    Cleared {
        conversation_id: String,
        cleared_by: String,
    },
    /// Events may have been missed; subscribers should refetch history.
    Resync { conversation_id: String },
}

impl ConversationEvent {
    /// The conversation this event belongs to.
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::Inserted { message } | Self::Updated { message } => &message.conversation_id,
            Self::Deleted {
                conversation_id, ..
            }
            | Self::Cleared {
                conversation_id, ..
            }
            | Self::Resync { conversation_id } => conversation_id,
        }
    }
}

/// Ephemeral "is typing" broadcast. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingSignal {
    /// Conversation the user is typing in.
    pub conversation_id: String,
    /// The typing user.
    pub user_id: String,
    /// When the signal was emitted.
    pub at: DateTime<Utc>,
}

impl TypingSignal {
    /// Create a signal stamped with the current time.
    pub fn now(conversation_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            at: Utc::now(),
        }
    }
}

/// Why a user's inbox changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxReason {
    /// A message addressed to the user was inserted.
    MessageReceived,
    /// Messages addressed to the user were marked read.
    MessagesRead,
    /// Messages touching the user were deleted.
    MessagesDeleted,
    /// Signals may have been missed.
    Resync,
}

/// User-scoped "my messages changed" signal for dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxSignal {
    /// The user whose unread counts may have changed.
    pub user_id: String,
    /// The conversation involved, if known.
    pub conversation_id: Option<String>,
    /// What happened.
    pub reason: InboxReason,
}
