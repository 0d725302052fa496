//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ServerError;

/// Chat server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Shared bearer token. When set, every API request must carry it.
    pub api_token: Option<String>,
    /// Directory uploaded attachments are written to and served from.
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8790)),
            database_url: "sqlite:chat.db?mode=rwc".to_string(),
            api_token: None,
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CHAT_API_ADDR` | Server bind address | `127.0.0.1:8790` |
    /// | `CHAT_DATABASE_URL` | SQLite database URL | `sqlite:chat.db?mode=rwc` |
    /// | `CHAT_API_TOKEN` | Shared bearer token | (none) |
    /// | `CHAT_UPLOAD_DIR` | Attachment directory | `uploads` |
    ///
    /// Attachment limits and the public URL are read by
    /// `attachment_uploader::UploadConfig::from_env`.
    pub fn from_env() -> Result<Self, ServerError> {
        let defaults = Self::default();

        let addr = match env::var("CHAT_API_ADDR") {
            Ok(addr) => addr
                .parse()
                .map_err(|_| ServerError::Config(format!("invalid CHAT_API_ADDR: {}", addr)))?,
            Err(_) => defaults.addr,
        };

        let database_url = env::var("CHAT_DATABASE_URL").unwrap_or(defaults.database_url);

        let api_token = env::var("CHAT_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let upload_dir = env::var("CHAT_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_dir);

        Ok(Self {
            addr,
            database_url,
            api_token,
            upload_dir,
        })
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }
}
