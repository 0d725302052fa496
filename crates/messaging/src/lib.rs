//! Booking chat core.
//!
//! This crate provides the server side of booking-scoped chat:
//!
//! - [`ChannelDirectory`] resolves a booking to its two participants and
//!   denies everyone else
//! - [`MessageStore`] appends, reads, marks read and deletes messages, and
//!   fans every change out on the [`DeliveryBus`]
//! - [`UnreadAggregator`] derives unread counts and the conversation list
//! - [`Messenger`] ties them together behind [`ChatBackend`], re-checking the
//!   acting user on every call
//!
//! # Architecture
//!
//! ```text
//!   session / HTTP handler (acting user)
//!          ↓
//! ┌──────────────────────────────────────────────────────────┐
//! │                        MESSENGER                         │
//! │                                                          │
//! │  1. Channel directory: booking → participants            │
//! │        (NotFound / AccessDenied / Forbidden)             │
//! │         ↓                                                │
//! │  2. Engaged check for writes (ChatUnavailable)           │
//! │         ↓                                                │
//! │  3. Message store (SQLite) under a per-conversation lock │
//! │         ↓                                                │
//! │  4. Delivery bus: conversation topic + receiver inbox    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use attachment_uploader::{AttachmentUploader, LocalBlobStorage, UploadConfig};
//! use chat_core::{ChatBackend, MessageContent};
//! use delivery_bus::DeliveryBus;
//! use messaging::{Messenger, MessagingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = chat_database::Database::connect("sqlite:chat.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let uploader = AttachmentUploader::new(
//!         Arc::new(LocalBlobStorage::new("uploads")),
//!         UploadConfig::default(),
//!     );
//!     let messenger = Messenger::with_sqlite_bookings(
//!         db,
//!         DeliveryBus::default(),
//!         uploader,
//!         MessagingConfig::from_env(),
//!     );
//!
//!     let message = messenger
//!         .append("booking-1", "customer-1", MessageContent::text("Hello"))
//!         .await?;
//!     println!("sent {}", message.id);
//!     Ok(())
//! }
//! ```

mod bookings;
mod config;
mod directory;
mod error;
mod messenger;
mod store;
mod unread;

// Public exports
pub use bookings::SqliteBookings;
pub use config::{MessagingConfig, DEFAULT_HISTORY_PAGE_SIZE};
pub use directory::ChannelDirectory;
pub use messenger::Messenger;
pub use store::MessageStore;
pub use unread::UnreadAggregator;

// Re-export commonly used types from dependencies
pub use chat_core::{ChatBackend, ChatError};
pub use delivery_bus::DeliveryBus;

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
