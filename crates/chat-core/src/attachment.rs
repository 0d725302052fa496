//! Attachment payloads and upload results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::message::MessageContent;

/// Default size ceiling for attachments (5 MiB).
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

/// Image types accepted for upload, with the extension the blob is stored
/// under. The stored extension decides the type the file is served with.
const ACCEPTED_IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// A file selected for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct AttachmentPayload {
    /// Original file name, used only as a MIME fallback.
    pub file_name: String,
    /// Declared content type, if the source provided one.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for AttachmentPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentPayload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Why a payload was rejected before any upload was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentRejection {
    /// Zero-length payload.
    Empty,
    /// Not one of the accepted image types.
    InvalidType(String),
    /// Over the size ceiling.
    TooLarge { size: usize, max: usize },
}

impl fmt::Display for AttachmentRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentRejection::Empty => write!(f, "attachment is empty"),
            AttachmentRejection::InvalidType(mime) => {
                write!(f, "invalid attachment type: {} (images only)", mime)
            }
            AttachmentRejection::TooLarge { size, max } => {
                write!(f, "attachment too large: {} bytes (max {})", size, max)
            }
        }
    }
}

impl std::error::Error for AttachmentRejection {}

impl From<AttachmentRejection> for ChatError {
    fn from(rejection: AttachmentRejection) -> Self {
        ChatError::Validation(rejection.to_string())
    }
}

impl AttachmentPayload {
    /// Create a payload with a declared content type.
    pub fn new(
        file_name: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes: bytes.into(),
        }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload has no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The effective MIME type: the declared one without parameters, or a
    /// guess from the file name.
    pub fn mime(&self) -> String {
        let declared = self
            .content_type
            .as_deref()
            .and_then(|value| value.split(';').next())
            .map(str::trim);
        match declared {
            Some(declared) if !declared.is_empty() => declared.to_ascii_lowercase(),
            _ => mime_guess::from_path(&self.file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }
    }

    /// File extension for the stored blob, derived from the MIME type.
    ///
    /// The client's file name never picks the extension, so a blob is always
    /// served back as the image type it was checked as.
    pub fn extension(&self) -> String {
        let mime = self.mime();
        ACCEPTED_IMAGE_TYPES
            .iter()
            .find(|(accepted, _)| *accepted == mime)
            .map(|(_, ext)| ext.to_string())
            .unwrap_or_else(|| "bin".to_string())
    }

    /// Check type and size, returning the effective MIME type.
    pub fn check(&self, max_bytes: usize) -> Result<String, AttachmentRejection> {
        if self.is_empty() {
            return Err(AttachmentRejection::Empty);
        }

        let mime = self.mime();
        if !ACCEPTED_IMAGE_TYPES.iter().any(|(accepted, _)| *accepted == mime) {
            return Err(AttachmentRejection::InvalidType(mime));
        }

        if self.len() > max_bytes {
            return Err(AttachmentRejection::TooLarge {
                size: self.len(),
                max: max_bytes,
            });
        }

        Ok(mime)
    }
}

/// A stored attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAttachment {
    /// Publicly fetchable URL.
    pub url: String,
    /// Storage key (namespaced by conversation and sender).
    pub key: String,
    /// MIME type of the stored file.
    pub mime: String,
    /// Stored size in bytes.
    pub size: u64,
}

impl UploadedAttachment {
    /// Message content referencing this attachment.
    pub fn to_content(&self) -> MessageContent {
        MessageContent::attachment(self.url.clone(), Some(self.mime.clone()))
    }
}
