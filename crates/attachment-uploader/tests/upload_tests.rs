//! Upload behaviour against real and slow storage backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use attachment_uploader::{
    AttachmentUploader, BlobStorage, LocalBlobStorage, UploadConfig, UploadError,
};
use chat_core::{is_attachment, AttachmentPayload, ChatError};

fn png(bytes: usize) -> AttachmentPayload {
    AttachmentPayload::new("site.png", Some("image/png".to_string()), vec![7u8; bytes])
}

#[tokio::test]
async fn test_upload_writes_file_and_returns_url() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalBlobStorage::new(dir.path()));
    let uploader = AttachmentUploader::new(
        storage.clone(),
        UploadConfig::default().with_public_base_url("https://chat.example.com"),
    );

    let uploaded = uploader.upload("b1", "cust", &png(64)).await.unwrap();

    assert!(uploaded.url.starts_with("https://chat.example.com/chat-images/b1/cust/"));
    assert!(uploaded.url.ends_with(".png"));
    assert!(is_attachment(&uploaded.url));
    assert_eq!(uploaded.mime, "image/png");
    assert_eq!(uploaded.size, 64);

    let stored = std::fs::read(storage.path_for(&uploaded.key).unwrap()).unwrap();
    assert_eq!(stored, vec![7u8; 64]);

    // No temp files left behind.
    let entries: Vec<_> = std::fs::read_dir(dir.path().join("b1").join("cust"))
        .unwrap()
        .collect();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_rejections_store_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let uploader = AttachmentUploader::new(
        Arc::new(LocalBlobStorage::new(dir.path())),
        UploadConfig::default().with_max_bytes(16),
    );

    let too_big = uploader.upload("b1", "cust", &png(17)).await;
    assert!(matches!(too_big, Err(UploadError::Rejected(_))));

    let pdf = AttachmentPayload::new("quote.pdf", None, vec![1u8; 4]);
    let err = uploader.upload("b1", "cust", &pdf).await.unwrap_err();
    assert!(matches!(ChatError::from(err), ChatError::Validation(_)));

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

struct SlowStorage {
    deletes: AtomicUsize,
}

#[async_trait]
impl BlobStorage for SlowStorage {
    async fn put(&self, _key: &str, _bytes: &[u8], _content_type: &str) -> Result<(), UploadError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<bool, UploadError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[tokio::test(start_paused = true)]
async fn test_upload_times_out() {
    let storage = Arc::new(SlowStorage {
        deletes: AtomicUsize::new(0),
    });
    let uploader = AttachmentUploader::new(
        storage.clone(),
        UploadConfig::default().with_timeout(Duration::from_secs(5)),
    );

    let err = uploader.upload("b1", "cust", &png(8)).await.unwrap_err();
    assert!(matches!(err, UploadError::TimedOut(d) if d == Duration::from_secs(5)));
    assert_eq!(storage.deletes.load(Ordering::SeqCst), 1);

    let chat: ChatError = err.into();
    assert!(matches!(chat, ChatError::UploadFailed(_)));
    assert!(chat.is_retryable());
}

struct FailingStorage;

#[async_trait]
impl BlobStorage for FailingStorage {
    async fn put(&self, _key: &str, _bytes: &[u8], _content_type: &str) -> Result<(), UploadError> {
        Err(UploadError::Storage("bucket unavailable".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, UploadError> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[tokio::test]
async fn test_storage_failure_is_retryable() {
    let uploader = AttachmentUploader::new(Arc::new(FailingStorage), UploadConfig::default());
    let err: ChatError = uploader.upload("b1", "cust", &png(8)).await.unwrap_err().into();
    assert!(matches!(err, ChatError::UploadFailed(ref msg) if msg.contains("bucket unavailable")));
}
