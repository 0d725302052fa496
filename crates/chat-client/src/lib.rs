//! HTTP client for the booking chat API.
//!
//! [`ChatClient`] implements [`ChatBackend`] over the chat server's JSON API
//! and Server-Sent-Events streams, so the same conversation session code
//! runs against a remote server.
//!
//! # Example
//!
//! ```no_run
//! use chat_client::{ChatClient, ClientConfig};
//! use chat_core::{ChatBackend, MessageContent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ChatClient::connect(ClientConfig::new("http://127.0.0.1:8790", "customer-1")).await?;
//! let message = client
//!     .append("booking-1", "customer-1", MessageContent::text("Hello"))
//!     .await?;
//! println!("sent {}", message.id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod sse;

pub use client::ChatClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use sse::ReconnectConfig;

pub use chat_core::ChatBackend;
