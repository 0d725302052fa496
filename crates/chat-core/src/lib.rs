//! Core types and traits for booking-scoped conversations.
//!
//! Every booking owns exactly one conversation between two fixed participants:
//! the booking's customer and the account holder of the booked provider. This
//! crate holds the vocabulary shared by every other crate in the workspace:
//!
//! - [`Message`] / [`MessageContent`] - stored messages and their tagged body
//! - [`ResolvedConversation`] - the result of a participant check
//! - [`ConversationEvent`], [`TypingSignal`], [`InboxSignal`] - push payloads
//! - [`ChatError`] - the error taxonomy surfaced to sessions and transports
//! - [`ChatBackend`] - the trait a conversation session talks to, whether the
//!   backend lives in-process or behind HTTP
//! - [`BookingLookup`] - the narrow interface onto the booking system
//! - [`wire`] - JSON bodies exchanged over HTTP
//!
//! # Example
//!
//! ```rust
//! use chat_core::{is_attachment, MessageContent};
//!
//! let content = MessageContent::from_body("https://cdn.example.com/chat-images/b1/u1/1.png");
//! assert!(content.is_attachment());
//! assert!(is_attachment(content.body()));
//!
//! let text = MessageContent::text("When can you start?");
//! assert!(!text.is_attachment());
//! ```

mod attachment;
mod backend;
mod conversation;
mod error;
mod events;
mod message;
pub mod wire;

pub use attachment::{
    AttachmentPayload, AttachmentRejection, UploadedAttachment, DEFAULT_MAX_ATTACHMENT_BYTES,
};
pub use backend::{BookingLookup, ChatBackend, EventStream, DEFAULT_ENGAGED_STATUSES};
pub use conversation::{BookingRecord, ConversationSummary, ResolvedConversation, UnreadCounts};
pub use error::{ChatError, Result};
pub use events::{ConversationEvent, InboxReason, InboxSignal, TypingSignal};
pub use message::{is_attachment, Message, MessageContent};

// Re-export async_trait for implementors
pub use async_trait::async_trait;
