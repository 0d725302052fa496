//! Participant-side chat sessions.
//!
//! A [`ConversationSession`] is one participant's live view of one booking
//! conversation: the ordered timeline, the draft, the other side's typing
//! indicator, attachments awaiting confirmation and deletions awaiting
//! confirmation. It talks to any [`ChatBackend`], in-process or remote.
//!
//! An [`UnreadWatcher`] keeps a user's unread badge and per-conversation
//! counts current from inbox signals.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chat_core::ChatBackend;
//! use conversation_session::{ConversationSession, SessionConfig};
//!
//! # async fn example(backend: Arc<dyn ChatBackend>) -> Result<(), conversation_session::SessionError> {
//! let session =
//!     ConversationSession::open(backend, "booking-1", "customer-1", SessionConfig::from_env()).await?;
//!
//! session.set_draft("On my way");
//! let sent = session.send().await?;
//! println!("sent {}", sent.id);
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod dashboard;
mod session;
mod timeline;

#[cfg(test)]
mod testing;

// Public exports
pub use config::{RetryConfig, SessionConfig, DEFAULT_POLL_INTERVAL, DEFAULT_TYPING_DECAY};
pub use dashboard::{UnreadSnapshot, UnreadWatcher};
pub use session::{
    AttachmentPreview, ConversationSession, DeleteOutcome, DeleteTarget, SessionError,
    SessionSnapshot, SessionState,
};
pub use timeline::Timeline;

pub use chat_core::ChatBackend;

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
