//! Authorizing message store.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chat_core::{
    ChatError, ConversationEvent, InboxReason, InboxSignal, Message, MessageContent,
    ResolvedConversation, Result,
};
use chat_database::models::{MessageRow, NewMessage};
use chat_database::{message, validation, Database};
use chrono::{DateTime, Utc};
use delivery_bus::DeliveryBus;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::db_error;

const LOCK_STRIPES: usize = 64;

/// Durable, ordered message log with participant checks and fan-out.
///
/// Writes to one conversation are serialized through a striped lock so the
/// order events reach the bus matches the order rows were stored.
#[derive(Clone)]
pub struct MessageStore {
    db: Database,
    bus: DeliveryBus,
    stripes: Arc<Vec<Mutex<()>>>,
}

impl MessageStore {
    /// Create a store writing to `db` and publishing on `bus`.
    pub fn new(db: Database, bus: DeliveryBus) -> Self {
        let stripes = (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect();
        Self {
            db,
            bus,
            stripes: Arc::new(stripes),
        }
    }

    fn stripe(&self, conversation_id: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        conversation_id.hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % self.stripes.len()]
    }

    /// Append a message.
    ///
    /// `sender_id` and `receiver_id` must be the conversation's two
    /// participants, in either order; anything else is `Forbidden` and
    /// stores nothing. Text is trimmed and must be non-empty; attachment URLs
    /// must be http(s).
    pub async fn append(
        &self,
        conversation: &ResolvedConversation,
        sender_id: &str,
        receiver_id: &str,
        content: MessageContent,
    ) -> Result<Message> {
        if sender_id == receiver_id
            || !conversation.is_participant(sender_id)
            || !conversation.is_participant(receiver_id)
        {
            return Err(ChatError::Forbidden(format!(
                "{} -> {} is not a participant pair of conversation {}",
                sender_id, receiver_id, conversation.conversation_id
            )));
        }

        let content = normalize(content)?;
        let _guard = self.stripe(&conversation.conversation_id).lock().await;

        let new = NewMessage {
            booking_id: conversation.conversation_id.clone(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            kind: content.kind().to_string(),
            body: content.body().to_string(),
            mime_hint: content.mime_hint().map(str::to_string),
            created_at: Utc::now().timestamp_millis(),
        };
        let row = message::insert_message(self.db.pool(), &new)
            .await
            .map_err(db_error)?;
        let stored = message_from_row(row)?;

        self.bus.publish_message(ConversationEvent::Inserted {
            message: stored.clone(),
        });
        self.bus.notify_inbox(InboxSignal {
            user_id: stored.receiver_id.clone(),
            conversation_id: Some(stored.conversation_id.clone()),
            reason: InboxReason::MessageReceived,
        });

        debug!(
            conversation_id = %stored.conversation_id,
            message_id = stored.id,
            kind = stored.content.kind(),
            "Message appended"
        );
        Ok(stored)
    }

    /// Full history of a conversation, ordered by creation time then id.
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        message::list_messages(self.db.pool(), conversation_id)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(message_from_row)
            .collect()
    }

    /// Messages with an id greater than `after_id`, in id order, at most `limit`.
    pub async fn history_after(
        &self,
        conversation_id: &str,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<Message>> {
        message::list_messages_after(self.db.pool(), conversation_id, after_id, i64::from(limit))
            .await
            .map_err(db_error)?
            .into_iter()
            .map(message_from_row)
            .collect()
    }

    /// Mark every message addressed to `receiver_id` as read.
    ///
    /// Idempotent. Returns the rows that flipped and pushes each of them as
    /// an update so the sender can show them as seen.
    pub async fn mark_read(&self, conversation_id: &str, receiver_id: &str) -> Result<Vec<Message>> {
        let _guard = self.stripe(conversation_id).lock().await;

        let flipped: Vec<Message> = message::mark_read(self.db.pool(), conversation_id, receiver_id)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(message_from_row)
            .collect::<Result<_>>()?;

        if flipped.is_empty() {
            return Ok(flipped);
        }

        for msg in &flipped {
            self.bus
                .publish_message(ConversationEvent::Updated { message: msg.clone() });
        }
        self.bus.notify_inbox(InboxSignal {
            user_id: receiver_id.to_string(),
            conversation_id: Some(conversation_id.to_string()),
            reason: InboxReason::MessagesRead,
        });

        debug!(
            conversation_id = %conversation_id,
            count = flipped.len(),
            "Messages marked read"
        );
        Ok(flipped)
    }

    /// Delete one message written by `user_id`.
    ///
    /// `NotFound` if it does not exist, `Forbidden` if someone else wrote it.
    pub async fn delete_own(&self, message_id: i64, user_id: &str) -> Result<Message> {
        let row = message::get_message(self.db.pool(), message_id)
            .await
            .map_err(db_error)?;

        if row.sender_id != user_id {
            return Err(ChatError::Forbidden(format!(
                "only the sender may delete message {}",
                message_id
            )));
        }

        let target = message_from_row(row)?;
        let _guard = self.stripe(&target.conversation_id).lock().await;

        let deleted = message::delete_message_by_sender(self.db.pool(), message_id, user_id)
            .await
            .map_err(db_error)?;
        if !deleted {
            return Err(ChatError::not_found("Message", message_id.to_string()));
        }

        self.bus.publish_message(ConversationEvent::Deleted {
            conversation_id: target.conversation_id.clone(),
            message_id,
        });
        self.bus.notify_inbox(InboxSignal {
            user_id: target.receiver_id.clone(),
            conversation_id: Some(target.conversation_id.clone()),
            reason: InboxReason::MessagesDeleted,
        });

        info!(
            conversation_id = %target.conversation_id,
            message_id,
            "Message deleted by sender"
        );
        Ok(target)
    }

    /// Delete every message of the conversation for both sides.
    ///
    /// The caller must already have checked that `user_id` is a participant.
    pub async fn delete_conversation(
        &self,
        conversation: &ResolvedConversation,
        user_id: &str,
    ) -> Result<u64> {
        if !conversation.is_participant(user_id) {
            return Err(ChatError::Forbidden(format!(
                "user {} may not clear conversation {}",
                user_id, conversation.conversation_id
            )));
        }

        let conversation_id = conversation.conversation_id.as_str();
        let _guard = self.stripe(conversation_id).lock().await;

        let removed = message::delete_conversation_for(self.db.pool(), conversation_id, user_id)
            .await
            .map_err(db_error)?;

        self.bus.publish_message(ConversationEvent::Cleared {
            conversation_id: conversation_id.to_string(),
            cleared_by: user_id.to_string(),
        });
        for participant in conversation.participants() {
            self.bus.notify_inbox(InboxSignal {
                user_id: participant.to_string(),
                conversation_id: Some(conversation_id.to_string()),
                reason: InboxReason::MessagesDeleted,
            });
        }

        info!(
            conversation_id = %conversation_id,
            cleared_by = %user_id,
            removed,
            "Conversation cleared"
        );
        Ok(removed)
    }
}

/// Validate and trim message content.
fn normalize(content: MessageContent) -> Result<MessageContent> {
    let invalid = |e: validation::ValidationError| ChatError::Validation(e.to_string());

    match content {
        MessageContent::Text { text } => {
            let text = validation::validate_text(&text).map_err(invalid)?;
            Ok(MessageContent::text(text))
        }
        MessageContent::Attachment { url, mime_hint } => {
            let url = validation::validate_attachment_url(&url).map_err(invalid)?;
            let mime_hint = mime_hint
                .map(|m| m.trim().to_ascii_lowercase())
                .filter(|m| !m.is_empty());
            Ok(MessageContent::attachment(url, mime_hint))
        }
    }
}

/// Convert a stored row into a [`Message`].
pub(crate) fn message_from_row(row: MessageRow) -> Result<Message> {
    let MessageRow {
        id,
        booking_id,
        sender_id,
        receiver_id,
        kind,
        body,
        mime_hint,
        is_read,
        created_at,
    } = row;

    let content = MessageContent::from_stored(&kind, body, mime_hint)
        .ok_or_else(|| ChatError::Storage(format!("message {} has unknown kind {}", id, kind)))?;
    let created_at = DateTime::<Utc>::from_timestamp_millis(created_at).ok_or_else(|| {
        ChatError::Storage(format!("message {} has invalid timestamp {}", id, created_at))
    })?;

    Ok(Message {
        id,
        conversation_id: booking_id,
        sender_id,
        receiver_id,
        content,
        read: is_read,
        created_at,
    })
}
