//! Unread aggregation and the conversation list.

use std::collections::HashMap;

use chat_core::{ConversationSummary, Result, UnreadCounts};
use chat_database::{message, Database};

use crate::error::db_error;
use crate::store::message_from_row;

/// Derived unread counts, always read straight from the message store.
#[derive(Debug, Clone)]
pub struct UnreadAggregator {
    db: Database,
}

impl UnreadAggregator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Unread messages addressed to `user_id` across all conversations.
    pub async fn global_unread_count(&self, user_id: &str) -> Result<u64> {
        let count = message::count_unread(self.db.pool(), user_id)
            .await
            .map_err(db_error)?;
        Ok(count.max(0) as u64)
    }

    /// Unread messages addressed to `user_id`, per conversation.
    pub async fn per_conversation_unread_counts(&self, user_id: &str) -> Result<UnreadCounts> {
        let rows = message::count_unread_by_booking(self.db.pool(), user_id)
            .await
            .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .filter(|r| r.unread > 0)
            .map(|r| (r.booking_id, r.unread as u64))
            .collect())
    }

    /// Unread messages addressed to `user_id` in one conversation.
    pub async fn unread_in_conversation(&self, conversation_id: &str, user_id: &str) -> Result<u64> {
        let count = message::count_unread_in_booking(self.db.pool(), conversation_id, user_id)
            .await
            .map_err(db_error)?;
        Ok(count.max(0) as u64)
    }

    /// Every conversation `user_id` has messages in, most recent first.
    pub async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        let latest = message::list_latest_messages_for_user(self.db.pool(), user_id)
            .await
            .map_err(db_error)?;
        let unread: HashMap<String, u64> = self
            .per_conversation_unread_counts(user_id)
            .await?
            .into_iter()
            .collect();

        latest
            .into_iter()
            .map(|row| {
                let last_message = message_from_row(row)?;
                let other_participant = if last_message.sender_id == user_id {
                    last_message.receiver_id.clone()
                } else {
                    last_message.sender_id.clone()
                };
                Ok(ConversationSummary {
                    unread_count: unread
                        .get(&last_message.conversation_id)
                        .copied()
                        .unwrap_or(0),
                    conversation_id: last_message.conversation_id.clone(),
                    other_participant,
                    last_message,
                })
            })
            .collect()
    }
}
