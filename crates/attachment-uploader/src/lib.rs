//! Attachment uploads for booking chat.
//!
//! Sending an image is two-phase: [`AttachmentUploader::upload`] validates and
//! stores the file and returns a URL; appending a message that references the
//! URL is a separate call on the message store. A failed upload never
//! produces a message, and a failed append leaves the uploaded URL reusable.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use attachment_uploader::{AttachmentUploader, LocalBlobStorage, UploadConfig};
//! use chat_core::AttachmentPayload;
//!
//! # async fn example() -> Result<(), attachment_uploader::UploadError> {
//! let uploader = AttachmentUploader::new(
//!     Arc::new(LocalBlobStorage::new("uploads")),
//!     UploadConfig::from_env()?,
//! );
//!
//! let payload = AttachmentPayload::new("site.png", None, std::fs::read("site.png")?);
//! let uploaded = uploader.upload("booking-1", "user-1", &payload).await?;
//! println!("{}", uploaded.url);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod storage;
mod uploader;

pub use config::{UploadConfig, DEFAULT_BUCKET, DEFAULT_UPLOAD_TIMEOUT};
pub use error::UploadError;
pub use storage::{BlobStorage, LocalBlobStorage};
pub use uploader::{blob_key, AttachmentUploader};

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
