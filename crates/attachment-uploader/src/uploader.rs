//! The upload half of the two-phase attachment send.

use std::sync::Arc;

use chat_core::{AttachmentPayload, UploadedAttachment};
use chrono::Utc;
use tracing::{debug, error, info};

use crate::config::UploadConfig;
use crate::storage::BlobStorage;
use crate::UploadError;

/// Validates attachments and stores them under a per-conversation,
/// per-sender namespace.
///
/// Uploading never appends a message; the caller sends the returned URL as a
/// separate step.
#[derive(Clone)]
pub struct AttachmentUploader {
    storage: Arc<dyn BlobStorage>,
    config: UploadConfig,
}

impl AttachmentUploader {
    /// Create an uploader over a storage backend.
    pub fn new(storage: Arc<dyn BlobStorage>, config: UploadConfig) -> Self {
        Self { storage, config }
    }

    /// The active configuration.
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Validate and store `payload`, returning its public URL.
    ///
    /// Fails with [`UploadError::Rejected`] for empty, oversized, or non-image
    /// payloads, and with [`UploadError::TimedOut`] if storage does not
    /// finish within the configured timeout.
    pub async fn upload(
        &self,
        conversation_id: &str,
        sender_id: &str,
        payload: &AttachmentPayload,
    ) -> Result<UploadedAttachment, UploadError> {
        let mime = payload.check(self.config.max_bytes)?;
        let key = blob_key(conversation_id, sender_id, &payload.extension());

        debug!(
            conversation_id = %conversation_id,
            key = %key,
            len = payload.len(),
            backend = self.storage.name(),
            "Uploading attachment"
        );

        let put = self.storage.put(&key, &payload.bytes, &mime);
        match tokio::time::timeout(self.config.timeout, put).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(conversation_id = %conversation_id, "Attachment upload failed: {}", e);
                return Err(e);
            }
            Err(_) => {
                error!(
                    conversation_id = %conversation_id,
                    timeout = ?self.config.timeout,
                    "Attachment upload timed out"
                );
                // The write may still land; drop whatever made it.
                let _ = self.storage.delete(&key).await;
                return Err(UploadError::TimedOut(self.config.timeout));
            }
        }

        let uploaded = UploadedAttachment {
            url: self.config.public_url(&key),
            key,
            mime,
            size: payload.len() as u64,
        };

        info!(conversation_id = %conversation_id, url = %uploaded.url, "Attachment uploaded");
        Ok(uploaded)
    }
}

/// Build a storage key `{conversation}/{sender}/{millis}-{uuid}.{ext}`.
///
/// Each segment is reduced to `[A-Za-z0-9_-]` so ids can never traverse out
/// of their namespace.
pub fn blob_key(conversation_id: &str, sender_id: &str, extension: &str) -> String {
    format!(
        "{}/{}/{}-{}.{}",
        sanitize_segment(conversation_id),
        sanitize_segment(sender_id),
        Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple(),
        sanitize_segment(extension),
    )
}

fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
