//! JSON bodies shared by the HTTP server and client.

use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::message::MessageContent;

/// Header carrying the acting user's id, set by the upstream identity layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the original file name of an uploaded attachment.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// An attachment reference inside a send request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_hint: Option<String>,
}

/// Body of `POST /v1/conversations/{id}/messages`.
///
/// Exactly one of `text`, `attachment` or the legacy untyped `body` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl SendMessageRequest {
    pub fn from_content(content: &MessageContent) -> Self {
        match content {
            MessageContent::Text { text } => Self {
                text: Some(text.clone()),
                ..Self::default()
            },
            MessageContent::Attachment { url, mime_hint } => Self {
                attachment: Some(AttachmentRef {
                    url: url.clone(),
                    mime_hint: mime_hint.clone(),
                }),
                ..Self::default()
            },
        }
    }

    /// Turn the request into typed content. Legacy bodies are classified.
    pub fn into_content(self) -> Result<MessageContent, ChatError> {
        match (self.text, self.attachment, self.body) {
            (Some(text), None, None) => Ok(MessageContent::Text { text }),
            (None, Some(a), None) => Ok(MessageContent::attachment(a.url, a.mime_hint)),
            (None, None, Some(body)) => Ok(MessageContent::from_body(body)),
            (None, None, None) => Err(ChatError::Validation(
                "one of text, attachment or body is required".to_string(),
            )),
            _ => Err(ChatError::Validation(
                "only one of text, attachment or body may be set".to_string(),
            )),
        }
    }
}

/// A bare count, used for unread totals and deletions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Error envelope: `{"error": {"message", "type", ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Human-readable message.
    pub message: String,
    /// Machine-readable error kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// The reason without the kind prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ErrorBody {
    /// An error that has no [`ChatError`] counterpart, such as a missing identity.
    pub fn other(kind: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                kind: kind.to_string(),
                reason: None,
                entity: None,
                id: None,
                status: None,
            },
        }
    }

    /// Rebuild the chat error this body was made from.
    ///
    /// A rejected identity becomes `AccessDenied`; unknown kinds become
    /// `Transport`.
    pub fn into_chat_error(self) -> ChatError {
        let ErrorDetail {
            message,
            kind,
            reason,
            entity,
            id,
            status,
        } = self.error;
        let reason = reason.unwrap_or(message);

        match kind.as_str() {
            "not_found" => ChatError::NotFound {
                entity: known_entity(entity.as_deref()),
                id: id.unwrap_or_default(),
            },
            "access_denied" | "auth_error" => ChatError::AccessDenied(reason),
            "forbidden" => ChatError::Forbidden(reason),
            "validation" => ChatError::Validation(reason),
            "chat_unavailable" => ChatError::ChatUnavailable {
                booking_id: id.unwrap_or_default(),
                status: status.unwrap_or_default(),
            },
            "upload_failed" => ChatError::UploadFailed(reason),
            "delivery_unavailable" => ChatError::DeliveryUnavailable(reason),
            "storage" => ChatError::Storage(reason),
            _ => ChatError::Transport(reason),
        }
    }
}

impl From<&ChatError> for ErrorBody {
    fn from(err: &ChatError) -> Self {
        let mut body = Self::other(err.kind(), err.to_string());
        let detail = &mut body.error;
        match err {
            ChatError::NotFound { entity, id } => {
                detail.entity = Some(entity.to_string());
                detail.id = Some(id.clone());
            }
            ChatError::ChatUnavailable { booking_id, status } => {
                detail.id = Some(booking_id.clone());
                detail.status = Some(status.clone());
            }
            ChatError::AccessDenied(reason)
            | ChatError::Forbidden(reason)
            | ChatError::Validation(reason)
            | ChatError::UploadFailed(reason)
            | ChatError::DeliveryUnavailable(reason)
            | ChatError::Storage(reason)
            | ChatError::Transport(reason) => detail.reason = Some(reason.clone()),
        }
        body
    }
}

fn known_entity(entity: Option<&str>) -> &'static str {
    match entity {
        Some("Booking") => "Booking",
        Some("Message") => "Message",
        Some("Conversation") => "Conversation",
        _ => "Resource",
    }
}
