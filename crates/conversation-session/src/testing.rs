//! Test doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chat_core::{
    AttachmentPayload, ChatBackend, ChatError, ConversationEvent, ConversationSummary,
    EventStream, InboxSignal, Message, MessageContent, ResolvedConversation,
    Result as ChatResult, TypingSignal, UnreadCounts, UploadedAttachment,
};

/// A backend with nothing behind it.
///
/// Every call fails with a retryable transport error unless configured
/// otherwise.
#[derive(Default)]
pub(crate) struct Offline {
    append_delay: Duration,
    refusal: Option<ChatError>,
    history_calls: AtomicUsize,
}

impl Offline {
    /// Appends wait this long before failing.
    pub(crate) fn with_append_delay(mut self, delay: Duration) -> Self {
        self.append_delay = delay;
        self
    }

    /// Subscriptions fail with `err` instead.
    pub(crate) fn refusing_subscriptions(mut self, err: ChatError) -> Self {
        self.refusal = Some(err);
        self
    }

    pub(crate) fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn subscription<T>(&self) -> ChatResult<T> {
        match &self.refusal {
            Some(err) => Err(err.clone()),
            None => offline(),
        }
    }
}

fn offline<T>() -> ChatResult<T> {
    Err(ChatError::Transport("offline".into()))
}

#[async_trait]
impl ChatBackend for Offline {
    async fn resolve_conversation(&self, _: &str, _: &str) -> ChatResult<ResolvedConversation> {
        offline()
    }
    async fn fetch_history(&self, _: &str, _: &str) -> ChatResult<Vec<Message>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        offline()
    }
    async fn fetch_history_after(&self, _: &str, _: &str, _: i64, _: u32) -> ChatResult<Vec<Message>> {
        offline()
    }
    async fn append(&self, _: &str, _: &str, _: MessageContent) -> ChatResult<Message> {
        if !self.append_delay.is_zero() {
            tokio::time::sleep(self.append_delay).await;
        }
        offline()
    }
    async fn mark_read(&self, _: &str, _: &str) -> ChatResult<Vec<Message>> {
        offline()
    }
    async fn delete_own(&self, _: i64, _: &str) -> ChatResult<()> {
        offline()
    }
    async fn delete_conversation(&self, _: &str, _: &str) -> ChatResult<u64> {
        offline()
    }
    async fn upload(&self, _: &str, _: &str, _: AttachmentPayload) -> ChatResult<UploadedAttachment> {
        offline()
    }
    async fn send_typing(&self, _: &str, _: &str) -> ChatResult<()> {
        offline()
    }
    async fn subscribe_messages(&self, _: &str, _: &str) -> ChatResult<EventStream<ConversationEvent>> {
        self.subscription()
    }
    async fn subscribe_typing(&self, _: &str, _: &str) -> ChatResult<EventStream<TypingSignal>> {
        self.subscription()
    }
    async fn subscribe_inbox(&self, _: &str) -> ChatResult<EventStream<InboxSignal>> {
        offline()
    }
    async fn global_unread_count(&self, _: &str) -> ChatResult<u64> {
        offline()
    }
    async fn per_conversation_unread_counts(&self, _: &str) -> ChatResult<UnreadCounts> {
        offline()
    }
    async fn list_conversations(&self, _: &str) -> ChatResult<Vec<ConversationSummary>> {
        offline()
    }
    fn name(&self) -> &str {
        "offline"
    }
}

