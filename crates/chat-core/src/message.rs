//! Message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// URL fragments that mark a body as an image attachment.
const ATTACHMENT_PATTERNS: &[&str] = &[
    ".jpg",
    ".jpeg",
    ".png",
    ".gif",
    ".webp",
    "/chat-images/",
    "/storage/v1/",
];

/// Check whether a raw message body refers to an image attachment.
///
/// A body counts as an attachment when it is an `http(s)` URL containing one
/// of the known image extensions or storage path fragments. Stored messages
/// carry an explicit [`MessageContent`] tag, so this is only needed for bodies
/// of unknown origin (legacy clients, pasted links).
pub fn is_attachment(body: &str) -> bool {
    body.starts_with("http") && ATTACHMENT_PATTERNS.iter().any(|p| body.contains(p))
}

/// The body of a message: either text or a reference to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text.
    Text { text: String },
    /// A retrievable URL produced by the attachment uploader.
    Attachment {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_hint: Option<String>,
    },
}

impl MessageContent {
    /// Create text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create attachment content.
    pub fn attachment(url: impl Into<String>, mime_hint: Option<String>) -> Self {
        Self::Attachment {
            url: url.into(),
            mime_hint,
        }
    }

    /// Classify an untagged body using [`is_attachment`].
    pub fn from_body(body: impl Into<String>) -> Self {
        let body = body.into();
        if is_attachment(&body) {
            Self::Attachment {
                url: body,
                mime_hint: None,
            }
        } else {
            Self::Text { text: body }
        }
    }

    /// Rebuild content from its stored columns.
    ///
    /// Returns `None` for an unknown kind.
    pub fn from_stored(kind: &str, body: String, mime_hint: Option<String>) -> Option<Self> {
        match kind {
            "text" => Some(Self::Text { text: body }),
            "attachment" => Some(Self::Attachment {
                url: body,
                mime_hint,
            }),
            _ => None,
        }
    }

    /// The stored kind tag ("text" or "attachment").
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Attachment { .. } => "attachment",
        }
    }

    /// The raw body: the text, or the attachment URL.
    pub fn body(&self) -> &str {
        match self {
            Self::Text { text } => text,
            Self::Attachment { url, .. } => url,
        }
    }

    /// MIME hint for attachments.
    pub fn mime_hint(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::Attachment { mime_hint, .. } => mime_hint.as_deref(),
        }
    }

    /// Whether this is an attachment.
    pub fn is_attachment(&self) -> bool {
        matches!(self, Self::Attachment { .. })
    }
}

/// A stored message.
///
/// Messages are immutable apart from `read`. Within a conversation they are
/// ordered by `created_at`, ties broken by `id`; ids are strictly increasing in
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique, insertion-ordered id.
    pub id: i64,
    /// Conversation id (the booking id).
    pub conversation_id: String,
    /// Author.
    pub sender_id: String,
    /// The other participant.
    pub receiver_id: String,
    /// Text or attachment.
    pub content: MessageContent,
    /// Whether the receiver has read it.
    pub read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// The raw body (text or attachment URL).
    pub fn body(&self) -> &str {
        self.content.body()
    }

    /// Whether `user_id` wrote this message.
    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }

    /// Whether this message is addressed to `user_id` and still unread.
    pub fn is_unread_for(&self, user_id: &str) -> bool {
        self.receiver_id == user_id && !self.read
    }

    /// Key that totally orders messages within a conversation.
    pub fn ordering_key(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.id)
    }
}
