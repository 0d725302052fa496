//! The server-side chat backend.

use std::sync::Arc;

use async_trait::async_trait;
use attachment_uploader::AttachmentUploader;
use chat_core::{
    AttachmentPayload, BookingLookup, ChatBackend, ChatError, ConversationEvent,
    ConversationSummary, EventStream, InboxSignal, Message, MessageContent, ResolvedConversation,
    Result, TypingSignal, UnreadCounts, UploadedAttachment,
};
use chat_database::Database;
use delivery_bus::DeliveryBus;
use futures::future;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::bookings::SqliteBookings;
use crate::config::MessagingConfig;
use crate::directory::ChannelDirectory;
use crate::store::MessageStore;
use crate::unread::UnreadAggregator;

/// Ties the directory, store, aggregator, uploader and bus together behind
/// [`ChatBackend`].
///
/// Every operation re-runs the participant check for the acting user; nothing
/// from an earlier call is trusted.
#[derive(Clone)]
pub struct Messenger {
    directory: ChannelDirectory,
    store: MessageStore,
    unread: UnreadAggregator,
    uploader: AttachmentUploader,
    bus: DeliveryBus,
    config: MessagingConfig,
}

impl Messenger {
    /// Create a messenger over an arbitrary booking system.
    pub fn new(
        db: Database,
        bookings: Arc<dyn BookingLookup>,
        bus: DeliveryBus,
        uploader: AttachmentUploader,
        config: MessagingConfig,
    ) -> Self {
        Self {
            directory: ChannelDirectory::new(bookings),
            store: MessageStore::new(db.clone(), bus.clone()),
            unread: UnreadAggregator::new(db),
            uploader,
            bus,
            config,
        }
    }

    /// Create a messenger whose bookings live in the same database.
    pub fn with_sqlite_bookings(
        db: Database,
        bus: DeliveryBus,
        uploader: AttachmentUploader,
        config: MessagingConfig,
    ) -> Self {
        let bookings = Arc::new(SqliteBookings::new(db.clone(), &config));
        Self::new(db, bookings, bus, uploader, config)
    }

    /// The channel directory.
    pub fn directory(&self) -> &ChannelDirectory {
        &self.directory
    }

    /// The message store.
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// The unread aggregator.
    pub fn unread(&self) -> &UnreadAggregator {
        &self.unread
    }

    /// The delivery bus.
    pub fn bus(&self) -> &DeliveryBus {
        &self.bus
    }

    /// The active configuration.
    pub fn config(&self) -> &MessagingConfig {
        &self.config
    }

    /// Unread messages addressed to `user_id` in one conversation.
    pub async fn unread_in_conversation(&self, conversation_id: &str, user_id: &str) -> Result<u64> {
        self.directory.resolve(conversation_id, user_id).await?;
        self.unread.unread_in_conversation(conversation_id, user_id).await
    }

    /// Resolve for a write: non-participants get `Forbidden` rather than
    /// `AccessDenied`, and the booking must be engaged.
    async fn resolve_for_write(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<ResolvedConversation> {
        let mut conversation = self.directory.lookup(conversation_id).await?;

        let other = conversation
            .counterpart_of(user_id)
            .map(str::to_string)
            .ok_or_else(|| {
                warn!(
                    conversation_id = %conversation_id,
                    user_id = %user_id,
                    "Write by non-participant refused"
                );
                ChatError::Forbidden(format!(
                    "user {} is not a participant of conversation {}",
                    user_id, conversation_id
                ))
            })?;

        if !conversation.engaged {
            return Err(ChatError::ChatUnavailable {
                booking_id: conversation.conversation_id,
                status: conversation.status,
            });
        }

        conversation.other_participant = other;
        Ok(conversation)
    }
}

#[async_trait]
impl ChatBackend for Messenger {
    async fn resolve_conversation(
        &self,
        booking_id: &str,
        user_id: &str,
    ) -> Result<ResolvedConversation> {
        self.directory.resolve(booking_id, user_id).await
    }

    async fn fetch_history(&self, conversation_id: &str, user_id: &str) -> Result<Vec<Message>> {
        self.directory.resolve(conversation_id, user_id).await?;
        self.store.history(conversation_id).await
    }

    async fn fetch_history_after(
        &self,
        conversation_id: &str,
        user_id: &str,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<Message>> {
        self.directory.resolve(conversation_id, user_id).await?;
        self.store
            .history_after(conversation_id, after_id, self.config.page_limit(limit))
            .await
    }

    async fn append(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: MessageContent,
    ) -> Result<Message> {
        let conversation = self.resolve_for_write(conversation_id, sender_id).await?;
        let receiver_id = conversation.other_participant.clone();
        self.store
            .append(&conversation, sender_id, &receiver_id, content)
            .await
    }

    async fn mark_read(&self, conversation_id: &str, user_id: &str) -> Result<Vec<Message>> {
        self.directory.resolve(conversation_id, user_id).await?;
        self.store.mark_read(conversation_id, user_id).await
    }

    async fn delete_own(&self, message_id: i64, user_id: &str) -> Result<()> {
        self.store.delete_own(message_id, user_id).await.map(|_| ())
    }

    async fn delete_conversation(&self, conversation_id: &str, user_id: &str) -> Result<u64> {
        let conversation = self.directory.resolve(conversation_id, user_id).await?;
        self.store.delete_conversation(&conversation, user_id).await
    }

    async fn upload(
        &self,
        conversation_id: &str,
        sender_id: &str,
        payload: AttachmentPayload,
    ) -> Result<UploadedAttachment> {
        self.resolve_for_write(conversation_id, sender_id).await?;
        Ok(self
            .uploader
            .upload(conversation_id, sender_id, &payload)
            .await?)
    }

    async fn send_typing(&self, conversation_id: &str, user_id: &str) -> Result<()> {
        self.directory.resolve(conversation_id, user_id).await?;
        let reached = self
            .bus
            .publish_typing(TypingSignal::now(conversation_id, user_id));
        debug!(conversation_id = %conversation_id, reached, "Typing signal");
        Ok(())
    }

    async fn subscribe_messages(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<EventStream<ConversationEvent>> {
        self.directory.resolve(conversation_id, user_id).await?;
        let subscription = self.bus.subscribe_messages(conversation_id)?;
        info!(conversation_id = %conversation_id, user_id = %user_id, "Message subscription opened");
        Ok(subscription.boxed())
    }

    async fn subscribe_typing(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<EventStream<TypingSignal>> {
        self.directory.resolve(conversation_id, user_id).await?;
        let subscription = self.bus.subscribe_typing(conversation_id)?;
        let me = user_id.to_string();
        Ok(subscription
            .filter(move |signal| future::ready(signal.user_id != me))
            .boxed())
    }

    async fn subscribe_inbox(&self, user_id: &str) -> Result<EventStream<InboxSignal>> {
        let subscription = self.bus.subscribe_inbox(user_id)?;
        info!(user_id = %user_id, "Inbox subscription opened");
        Ok(subscription.boxed())
    }

    async fn global_unread_count(&self, user_id: &str) -> Result<u64> {
        self.unread.global_unread_count(user_id).await
    }

    async fn per_conversation_unread_counts(&self, user_id: &str) -> Result<UnreadCounts> {
        self.unread.per_conversation_unread_counts(user_id).await
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        self.unread.list_conversations(user_id).await
    }

    fn name(&self) -> &str {
        "messenger"
    }
}
