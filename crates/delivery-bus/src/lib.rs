//! In-process delivery bus for booking chat.
//!
//! Three topic families carry push payloads to live subscribers:
//!
//! - per-conversation message changes ([`ConversationEvent`])
//! - per-conversation typing signals ([`TypingSignal`])
//! - per-user inbox changes ([`InboxSignal`]), used by dashboards to refresh
//!   unread counts
//!
//! Delivery is at-least-once from the subscriber's point of view: a
//! subscriber that falls behind gets a resync marker in place of the items it
//! missed and is expected to refetch. Typing signals are best effort and are
//! simply dropped on lag.
//!
//! # Example
//!
//! ```
//! use chat_core::ConversationEvent;
//! use delivery_bus::DeliveryBus;
//! use futures::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> chat_core::Result<()> {
//! let bus = DeliveryBus::default();
//! let mut events = bus.subscribe_messages("booking-1")?;
//!
//! bus.publish_message(ConversationEvent::Resync {
//!     conversation_id: "booking-1".to_string(),
//! });
//!
//! let event = events.next().await;
//! assert!(matches!(event, Some(ConversationEvent::Resync { .. })));
//! # Ok(())
//! # }
//! ```

mod config;
mod topic;

pub use config::BusConfig;
pub use topic::Subscription;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chat_core::{ChatError, ConversationEvent, InboxReason, InboxSignal, Result, TypingSignal};
use tracing::{debug, info};

use topic::TopicMap;

/// Publish/subscribe hub shared by the message store and every transport.
///
/// Cloning is cheap; clones share the same topics.
#[derive(Clone)]
pub struct DeliveryBus {
    messages: Arc<TopicMap<ConversationEvent>>,
    typing: Arc<TopicMap<TypingSignal>>,
    inbox: Arc<TopicMap<InboxSignal>>,
    closed: Arc<AtomicBool>,
}

impl Default for DeliveryBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl std::fmt::Debug for DeliveryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryBus")
            .field("message_topics", &self.messages.topic_count())
            .field("typing_topics", &self.typing.topic_count())
            .field("inbox_topics", &self.inbox.topic_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn message_resync(conversation_id: &str) -> Option<ConversationEvent> {
    Some(ConversationEvent::Resync {
        conversation_id: conversation_id.to_string(),
    })
}

fn inbox_resync(user_id: &str) -> Option<InboxSignal> {
    Some(InboxSignal {
        user_id: user_id.to_string(),
        conversation_id: None,
        reason: InboxReason::Resync,
    })
}

fn drop_on_lag(_: &str) -> Option<TypingSignal> {
    None
}

impl DeliveryBus {
    /// Create a bus with the given capacities.
    pub fn new(config: BusConfig) -> Self {
        Self {
            messages: Arc::new(TopicMap::new("messages", config.message_capacity)),
            typing: Arc::new(TopicMap::new("typing", config.typing_capacity)),
            inbox: Arc::new(TopicMap::new("inbox", config.inbox_capacity)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Publish a message change to the conversation's subscribers.
    ///
    /// Returns the number of subscribers reached.
    pub fn publish_message(&self, event: ConversationEvent) -> usize {
        let conversation_id = event.conversation_id().to_string();
        let reached = self.messages.publish(&conversation_id, event);
        debug!(conversation_id = %conversation_id, reached, "Published message event");
        reached
    }

    /// Publish a typing signal to the conversation's subscribers.
    pub fn publish_typing(&self, signal: TypingSignal) -> usize {
        let conversation_id = signal.conversation_id.clone();
        self.typing.publish(&conversation_id, signal)
    }

    /// Tell a user's dashboards that their messages changed.
    pub fn notify_inbox(&self, signal: InboxSignal) -> usize {
        let user_id = signal.user_id.clone();
        self.inbox.publish(&user_id, signal)
    }

    /// Subscribe to message changes of one conversation.
    ///
    /// Authorization happens in the caller; the bus only routes.
    pub fn subscribe_messages(&self, conversation_id: &str) -> Result<Subscription<ConversationEvent>> {
        self.ensure_open()?;
        Ok(self.messages.subscribe(conversation_id, message_resync))
    }

    /// Subscribe to typing signals of one conversation.
    pub fn subscribe_typing(&self, conversation_id: &str) -> Result<Subscription<TypingSignal>> {
        self.ensure_open()?;
        Ok(self.typing.subscribe(conversation_id, drop_on_lag))
    }

    /// Subscribe to one user's inbox changes.
    pub fn subscribe_inbox(&self, user_id: &str) -> Result<Subscription<InboxSignal>> {
        self.ensure_open()?;
        Ok(self.inbox.subscribe(user_id, inbox_resync))
    }

    /// Live message subscribers of a conversation.
    pub fn message_subscribers(&self, conversation_id: &str) -> usize {
        self.messages.subscriber_count(conversation_id)
    }

    /// Live typing subscribers of a conversation.
    pub fn typing_subscribers(&self, conversation_id: &str) -> usize {
        self.typing.subscriber_count(conversation_id)
    }

    /// Live inbox subscribers of a user.
    pub fn inbox_subscribers(&self, user_id: &str) -> usize {
        self.inbox.subscriber_count(user_id)
    }

    /// Number of topics currently allocated across all families.
    pub fn topic_count(&self) -> usize {
        self.messages.topic_count() + self.typing.topic_count() + self.inbox.topic_count()
    }

    /// Shut the bus down: end every subscription and refuse new ones.
    ///
    /// Publishing after close is a silent no-op.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.messages.clear();
            self.typing.clear();
            self.inbox.clear();
            info!("Delivery bus closed");
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ChatError::DeliveryUnavailable("delivery bus is closed".to_string()));
        }
        Ok(())
    }
}

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::{Message, MessageContent};
    use chrono::Utc;
    use futures::StreamExt;

    fn inserted(conversation_id: &str, id: i64) -> ConversationEvent {
        ConversationEvent::Inserted {
            message: Message {
                id,
                conversation_id: conversation_id.to_string(),
                sender_id: "a".to_string(),
                receiver_id: "b".to_string(),
                content: MessageContent::text(format!("m{id}")),
                read: false,
                created_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn test_publish_order_preserved() {
        let bus = DeliveryBus::default();
        let mut sub = bus.subscribe_messages("c1").unwrap();

        for id in 1..=5 {
            assert_eq!(bus.publish_message(inserted("c1", id)), 1);
        }

        for id in 1..=5 {
            match sub.next().await {
                Some(ConversationEvent::Inserted { message }) => assert_eq!(message.id, id),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = DeliveryBus::default();
        let mut c1 = bus.subscribe_messages("c1").unwrap();
        let _c2 = bus.subscribe_messages("c2").unwrap();

        bus.publish_message(inserted("c2", 1));
        bus.publish_message(inserted("c1", 2));

        match c1.next().await {
            Some(ConversationEvent::Inserted { message }) => assert_eq!(message.id, 2),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_allocates_nothing() {
        let bus = DeliveryBus::default();
        assert_eq!(bus.publish_message(inserted("c1", 1)), 0);
        assert_eq!(bus.publish_typing(TypingSignal::now("c1", "a")), 0);
        assert_eq!(bus.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases_topic() {
        let bus = DeliveryBus::default();
        let first = bus.subscribe_messages("c1").unwrap();
        let second = bus.subscribe_messages("c1").unwrap();
        let typing = bus.subscribe_typing("c1").unwrap();
        assert_eq!(bus.message_subscribers("c1"), 2);
        assert_eq!(bus.topic_count(), 2);

        drop(first);
        assert_eq!(bus.message_subscribers("c1"), 1);
        assert_eq!(bus.topic_count(), 2);

        second.unsubscribe();
        typing.unsubscribe();
        assert_eq!(bus.message_subscribers("c1"), 0);
        assert_eq!(bus.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_gets_resync() {
        let bus = DeliveryBus::new(BusConfig::default().with_message_capacity(2));
        let mut sub = bus.subscribe_messages("c1").unwrap();

        for id in 1..=5 {
            bus.publish_message(inserted("c1", id));
        }

        assert_eq!(
            sub.next().await,
            Some(ConversationEvent::Resync {
                conversation_id: "c1".to_string()
            })
        );
        match sub.next().await {
            Some(ConversationEvent::Inserted { message }) => assert_eq!(message.id, 4),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lagged_typing_is_dropped() {
        let bus = DeliveryBus::new(BusConfig::default().with_typing_capacity(1));
        let mut sub = bus.subscribe_typing("c1").unwrap();

        bus.publish_typing(TypingSignal::now("c1", "a"));
        bus.publish_typing(TypingSignal::now("c1", "b"));

        let signal = sub.next().await.unwrap();
        assert_eq!(signal.user_id, "b");
    }

    #[tokio::test]
    async fn test_inbox_routing() {
        let bus = DeliveryBus::default();
        let mut alice = bus.subscribe_inbox("alice").unwrap();

        bus.notify_inbox(InboxSignal {
            user_id: "bob".to_string(),
            conversation_id: None,
            reason: InboxReason::MessageReceived,
        });
        bus.notify_inbox(InboxSignal {
            user_id: "alice".to_string(),
            conversation_id: Some("c1".to_string()),
            reason: InboxReason::MessagesRead,
        });

        let signal = alice.next().await.unwrap();
        assert_eq!(signal.reason, InboxReason::MessagesRead);
        assert_eq!(signal.conversation_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_close_ends_streams_and_refuses_subscribers() {
        let bus = DeliveryBus::default();
        let mut sub = bus.subscribe_messages("c1").unwrap();

        bus.close();
        assert!(bus.is_closed());
        assert_eq!(sub.next().await, None);
        assert!(matches!(
            bus.subscribe_messages("c1"),
            Err(ChatError::DeliveryUnavailable(_))
        ));
        assert!(bus.subscribe_inbox("u").is_err());
    }
}
