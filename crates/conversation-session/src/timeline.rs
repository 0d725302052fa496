//! The ordered in-memory message list of a session.

use chat_core::Message;

/// Messages of one conversation, kept sorted by creation time then id.
///
/// Pushes are merged by id, so duplicate deliveries are harmless.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    messages: Vec<Message>,
}

impl Timeline {
    /// Build a timeline from an unordered batch.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut timeline = Self::default();
        timeline.replace_all(messages);
        timeline
    }

    /// Insert or replace a message. Returns `true` if it was new.
    pub fn upsert(&mut self, message: Message) -> bool {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
            *existing = message;
            return false;
        }

        let key = message.ordering_key();
        let at = self.messages.partition_point(|m| m.ordering_key() <= key);
        self.messages.insert(at, message);
        true
    }

    /// Remove a message by id.
    pub fn remove(&mut self, message_id: i64) -> Option<Message> {
        let at = self.messages.iter().position(|m| m.id == message_id)?;
        Some(self.messages.remove(at))
    }

    /// Replace the whole list.
    pub fn replace_all(&mut self, mut messages: Vec<Message>) {
        messages.sort_by_key(Message::ordering_key);
        messages.dedup_by_key(|m| m.id);
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn get(&self, message_id: i64) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The newest message.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages addressed to `user_id` that are still unread.
    pub fn unread_for(&self, user_id: &str) -> usize {
        self.messages.iter().filter(|m| m.is_unread_for(user_id)).count()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::MessageContent;
    use chrono::{TimeZone, Utc};

    fn msg(id: i64, at_ms: i64) -> Message {
        Message {
            id,
            conversation_id: "c".to_string(),
            sender_id: "a".to_string(),
            receiver_id: "b".to_string(),
            content: MessageContent::text(format!("m{id}")),
            read: false,
            created_at: Utc.timestamp_millis_opt(at_ms).unwrap(),
        }
    }

    fn ids(timeline: &Timeline) -> Vec<i64> {
        timeline.messages().iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_upsert_orders_and_dedups() {
        let mut timeline = Timeline::default();
        assert!(timeline.upsert(msg(2, 20)));
        assert!(timeline.upsert(msg(1, 10)));
        assert!(timeline.upsert(msg(3, 20)));
        assert_eq!(ids(&timeline), vec![1, 2, 3]);

        let mut read = msg(2, 20);
        read.read = true;
        assert!(!timeline.upsert(read));
        assert_eq!(timeline.len(), 3);
        assert!(timeline.get(2).unwrap().read);
        assert_eq!(timeline.unread_for("b"), 2);
    }

    #[test]
    fn test_replace_and_remove() {
        let mut timeline = Timeline::from_messages(vec![msg(5, 50), msg(4, 40), msg(4, 40)]);
        assert_eq!(ids(&timeline), vec![4, 5]);

        assert_eq!(timeline.remove(4).map(|m| m.id), Some(4));
        assert!(timeline.remove(4).is_none());
        assert_eq!(timeline.last().map(|m| m.id), Some(5));

        timeline.clear();
        assert!(timeline.is_empty());
    }
}
