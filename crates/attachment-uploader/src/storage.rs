//! Blob storage backends.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::UploadError;

/// Where attachment bytes end up.
///
/// Implementations must make a blob visible atomically: a reader either sees
/// the complete object or nothing.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `bytes` under `key`.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), UploadError>;

    /// Remove the blob under `key`. Returns `false` if it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, UploadError>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}

/// Stores blobs as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    /// Create a storage rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `key` to a path inside the root.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, UploadError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(UploadError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), UploadError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a sibling temp file, then rename into place.
        let tmp = path.with_extension(format!("part-{}", uuid::Uuid::new_v4().simple()));
        let mut file = fs::File::create(&tmp).await?;
        let written = async {
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;
        drop(file);

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(key = %key, content_type = %content_type, len = bytes.len(), "Stored blob");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, UploadError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_for_rejects_escapes() {
        let storage = LocalBlobStorage::new("/srv/uploads");
        assert!(storage.path_for("b1/u1/1-a.png").is_ok());
        assert!(matches!(
            storage.path_for("../etc/passwd"),
            Err(UploadError::InvalidKey(_))
        ));
        assert!(storage.path_for("/abs/a.png").is_err());
        assert!(storage.path_for("").is_err());
    }
}
