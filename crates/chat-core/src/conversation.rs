//! Conversation and booking types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Unread counts keyed by conversation id.
pub type UnreadCounts = BTreeMap<String, u64>;

/// The subset of a booking the chat layer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    /// Booking id (doubles as the conversation id).
    pub booking_id: String,
    /// The customer who made the booking.
    pub customer_id: String,
    /// Account id of the provider's owner.
    pub provider_account_id: String,
    /// Booking status as reported by the booking system.
    pub status: String,
}

/// A conversation resolved for one acting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConversation {
    /// Conversation id (the booking id).
    pub conversation_id: String,
    /// The customer.
    pub participant_a: String,
    /// The provider account holder.
    pub participant_b: String,
    /// The participant who is not the acting user.
    pub other_participant: String,
    /// Booking status at resolution time.
    pub status: String,
    /// Whether chat is interactive for this status.
    pub engaged: bool,
}

impl ResolvedConversation {
    /// Both participants, customer first.
    pub fn participants(&self) -> [&str; 2] {
        [&self.participant_a, &self.participant_b]
    }

    /// Whether `user_id` is one of the two participants.
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participant_a == user_id || self.participant_b == user_id
    }

    /// The counterpart of `user_id`, if `user_id` is a participant.
    pub fn counterpart_of(&self, user_id: &str) -> Option<&str> {
        if self.participant_a == user_id {
            Some(&self.participant_b)
        } else if self.participant_b == user_id {
            Some(&self.participant_a)
        } else {
            None
        }
    }
}

/// One row of a user's conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation id.
    pub conversation_id: String,
    /// The other participant.
    pub other_participant: String,
    /// Most recent message.
    pub last_message: Message,
    /// Messages addressed to the user that are still unread.
    pub unread_count: u64,
}
