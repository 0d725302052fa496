//! Traits at the seams between sessions, the messaging service, and the
//! booking system.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::attachment::{AttachmentPayload, UploadedAttachment};
use crate::conversation::{BookingRecord, ConversationSummary, ResolvedConversation, UnreadCounts};
use crate::error::Result;
use crate::events::{ConversationEvent, InboxSignal, TypingSignal};
use crate::message::{Message, MessageContent};

/// A boxed push stream. Ends when the subscription is torn down.
pub type EventStream<T> = BoxStream<'static, T>;

/// Booking statuses in which chat is interactive.
pub const DEFAULT_ENGAGED_STATUSES: &[&str] = &["accepted", "in_progress"];

/// Read-only view onto the booking system.
#[async_trait]
pub trait BookingLookup: Send + Sync {
    /// Look up a booking together with its provider's account holder.
    ///
    /// Returns `Ok(None)` when the booking does not exist.
    async fn get_booking(&self, booking_id: &str) -> Result<Option<BookingRecord>>;

    /// Whether chat is interactive for `status`.
    fn is_engaged(&self, status: &str) -> bool {
        DEFAULT_ENGAGED_STATUSES.contains(&status)
    }
}

/// Everything a conversation session needs from the messaging service.
///
/// Every call carries the acting user; implementations re-check
/// participation on each call rather than trusting the caller. The trait is
/// object-safe and is used as `Arc<dyn ChatBackend>`.
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    /// Resolve a booking to its conversation for `user_id`.
    ///
    /// Fails with `NotFound` for unknown bookings and `AccessDenied` for
    /// non-participants.
    async fn resolve_conversation(
        &self,
        booking_id: &str,
        user_id: &str,
    ) -> Result<ResolvedConversation>;

    /// Full ordered history of a conversation.
    async fn fetch_history(&self, conversation_id: &str, user_id: &str) -> Result<Vec<Message>>;

    /// Messages with an id greater than `after_id`, oldest first.
    async fn fetch_history_after(
        &self,
        conversation_id: &str,
        user_id: &str,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<Message>>;

    /// Append a message authored by `sender_id`.
    ///
    /// The receiver is derived from the conversation, never supplied.
    async fn append(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: MessageContent,
    ) -> Result<Message>;

    /// Mark every message addressed to `user_id` as read.
    ///
    /// Returns the messages whose flag flipped. Idempotent.
    async fn mark_read(&self, conversation_id: &str, user_id: &str) -> Result<Vec<Message>>;

    /// Delete one message. Only its sender may do so.
    async fn delete_own(&self, message_id: i64, user_id: &str) -> Result<()>;

    /// Delete every message in the conversation. Returns the number removed.
    async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> Result<u64>;

    /// Store an image and return a fetchable URL. Does not append a message.
    async fn upload(
        &self,
        conversation_id: &str,
        sender_id: &str,
        payload: AttachmentPayload,
    ) -> Result<UploadedAttachment>;

    /// Broadcast an ephemeral typing signal.
    async fn send_typing(&self, conversation_id: &str, user_id: &str) -> Result<()>;

    /// Subscribe to message changes in one conversation.
    async fn subscribe_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<EventStream<ConversationEvent>>;

    /// Subscribe to typing signals in one conversation.
    async fn subscribe_typing(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<EventStream<TypingSignal>>;

    /// Subscribe to user-scoped inbox changes.
    async fn subscribe_inbox(&self, user_id: &str) -> Result<EventStream<InboxSignal>>;

    /// Unread messages addressed to `user_id` across all conversations.
    async fn global_unread_count(&self, user_id: &str) -> Result<u64>;

    /// Unread messages addressed to `user_id`, per conversation. Conversations
    /// with nothing unread are absent.
    async fn per_conversation_unread_counts(&self, user_id: &str) -> Result<UnreadCounts>;

    /// The user's conversations, most recent activity first.
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}
