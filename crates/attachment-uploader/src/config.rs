//! Configuration types for the attachment uploader.

use std::env;
use std::time::Duration;

use chat_core::DEFAULT_MAX_ATTACHMENT_BYTES;

use crate::UploadError;

/// Default upload timeout.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bucket (first path segment of every attachment URL).
pub const DEFAULT_BUCKET: &str = "chat-images";

/// Settings for validating and storing attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Size ceiling in bytes.
    pub max_bytes: usize,
    /// Upper bound on one storage write.
    pub timeout: Duration,
    /// Bucket name, used as the URL path prefix.
    pub bucket: String,
    /// Base URL under which the bucket is publicly served.
    pub public_base_url: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            timeout: DEFAULT_UPLOAD_TIMEOUT,
            bucket: DEFAULT_BUCKET.to_string(),
            public_base_url: "http://127.0.0.1:8790".to_string(),
        }
    }
}

impl UploadConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional (with defaults):
    /// - `CHAT_UPLOAD_MAX_BYTES` - Default: 5242880
    /// - `CHAT_UPLOAD_TIMEOUT_SECS` - Default: 30
    /// - `CHAT_UPLOAD_BUCKET` - Default: chat-images
    /// - `CHAT_PUBLIC_URL` - Default: http://127.0.0.1:8790
    pub fn from_env() -> Result<Self, UploadError> {
        let defaults = Self::default();

        let max_bytes = match env::var("CHAT_UPLOAD_MAX_BYTES") {
            Ok(v) => v
                .parse::<usize>()
                .map_err(|e| UploadError::Config(format!("Invalid CHAT_UPLOAD_MAX_BYTES: {}", e)))?,
            Err(_) => defaults.max_bytes,
        };

        let timeout = match env::var("CHAT_UPLOAD_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.parse::<u64>().map_err(|e| {
                UploadError::Config(format!("Invalid CHAT_UPLOAD_TIMEOUT_SECS: {}", e))
            })?),
            Err(_) => defaults.timeout,
        };

        let bucket = env::var("CHAT_UPLOAD_BUCKET").unwrap_or(defaults.bucket);
        let public_base_url = env::var("CHAT_PUBLIC_URL").unwrap_or(defaults.public_base_url);

        Ok(Self {
            max_bytes,
            timeout,
            bucket,
            public_base_url,
        }
        .normalized())
    }

    /// Builder method to set the size ceiling.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Builder method to set the upload timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to set the bucket name.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self.normalized()
    }

    /// Builder method to set the public base URL.
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into();
        self.normalized()
    }

    /// URL path under which the bucket is served (e.g. `/chat-images`).
    pub fn bucket_path(&self) -> String {
        format!("/{}", self.bucket)
    }

    /// Public URL for a storage key.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket, key)
    }

    fn normalized(mut self) -> Self {
        self.bucket = self.bucket.trim_matches('/').to_string();
        if self.bucket.is_empty() {
            self.bucket = DEFAULT_BUCKET.to_string();
        }
        self.public_base_url = self.public_base_url.trim_end_matches('/').to_string();
        self
    }
}
