//! The blob store seam shared by the staging and analysis stores.

use crate::StorageBackend;
use async_trait::async_trait;
use logoscope_core::AppError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("cannot store object: {0}")]
    UploadFailed(String),

    #[error("cannot read object: {0}")]
    DownloadFailed(String),

    #[error("cannot remove object: {0}")]
    DeleteFailed(String),

    #[error("no object at {0}")]
    NotFound(String),

    #[error("rejected storage key: {0}")]
    InvalidKey(String),

    #[error("storage backend: {0}")]
    BackendError(String),

    #[error("storage io: {0}")]
    IoError(#[from] std::io::Error),

    #[error("storage misconfigured: {0}")]
    ConfigError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// A keyed blob store. The ephemeral staging store and the durable analysis store
/// are both instances, possibly on different backends or buckets.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `storage_key`, replacing whatever was there, and return the
    /// object's public URL.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Fails with [`StorageError::NotFound`] when nothing is stored under the key.
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Removing a missing key succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Time-limited read URL. Backends without signing return the plain URL.
    async fn get_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    fn backend_type(&self) -> StorageBackend;
}
