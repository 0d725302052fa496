//! Input validation for message bodies.

use std::fmt;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty value where one is required.
    Empty(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Attachment URL is not an http(s) URL.
    InvalidUrl(String),
    /// Unknown message kind.
    InvalidKind(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::InvalidUrl(msg) => write!(f, "Invalid attachment URL: {}", msg),
            ValidationError::InvalidKind(kind) => write!(f, "Invalid message kind: {}", kind),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for a text message, in characters.
pub const MAX_TEXT_LENGTH: usize = 4000;

/// Maximum allowed length for an attachment URL.
pub const MAX_URL_LENGTH: usize = 2048;

/// Validate a text body and return it trimmed.
pub fn validate_text(text: &str) -> Result<&str, ValidationError> {
    let text = text.trim();

    if text.is_empty() {
        return Err(ValidationError::Empty("message".to_string()));
    }

    let chars = text.chars().count();
    if chars > MAX_TEXT_LENGTH {
        return Err(ValidationError::TooLong {
            field: "message".to_string(),
            max: MAX_TEXT_LENGTH,
            actual: chars,
        });
    }

    Ok(text)
}

/// Validate an attachment URL and return it trimmed.
pub fn validate_attachment_url(url: &str) -> Result<&str, ValidationError> {
    let url = url.trim();

    if url.is_empty() {
        return Err(ValidationError::Empty("attachment URL".to_string()));
    }

    if url.len() > MAX_URL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "attachment URL".to_string(),
            max: MAX_URL_LENGTH,
            actual: url.len(),
        });
    }

    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ValidationError::InvalidUrl("must start with http:// or https://".to_string()))?;

    if rest.is_empty() || rest.starts_with('/') {
        return Err(ValidationError::InvalidUrl("missing host".to_string()));
    }

    if url.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidUrl("contains whitespace".to_string()));
    }

    Ok(url)
}

/// Validate a body for the given stored kind.
pub fn validate_body<'a>(kind: &str, body: &'a str) -> Result<&'a str, ValidationError> {
    match kind {
        "text" => validate_text(body),
        "attachment" => validate_attachment_url(body),
        other => Err(ValidationError::InvalidKind(other.to_string())),
    }
}
