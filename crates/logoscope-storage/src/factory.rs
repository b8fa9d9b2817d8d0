#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use logoscope_core::Config;
use std::sync::Arc;

/// The two stores the pipeline moves assets between.
#[derive(Clone)]
pub struct StoragePair {
    /// Short-lived uploads awaiting claim or payment
    pub ephemeral: Arc<dyn Storage>,
    /// Assets owned by an analysis
    pub durable: Arc<dyn Storage>,
}

fn required(value: Option<&str>, setting: &str) -> StorageResult<String> {
    value
        .map(str::to_string)
        .ok_or_else(|| StorageError::ConfigError(format!("{setting} is not set")))
}

/// Build the configured backend (local when `STORAGE_BACKEND` is unset).
///
/// `bucket_override` picks a bucket other than `S3_BUCKET`; the local backend ignores it
/// and separates stores by key prefix instead.
pub async fn create_storage(
    config: &Config,
    bucket_override: Option<&str>,
) -> StorageResult<Arc<dyn Storage>> {
    let backend = config.storage_backend().unwrap_or(StorageBackend::Local);
    tracing::debug!(%backend, ?bucket_override, "Creating storage backend");

    let storage: Arc<dyn Storage> = match backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = required(bucket_override.or(config.s3_bucket()), "S3_BUCKET")?;
            let region = required(config.s3_region(), "S3_REGION (or AWS_REGION)")?;
            let endpoint = config.s3_endpoint().map(str::to_string);
            Arc::new(S3Storage::new(bucket, region, endpoint).await?)
        }
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let root = required(config.local_storage_path(), "LOCAL_STORAGE_PATH")?;
            let public_url = required(config.local_storage_base_url(), "LOCAL_STORAGE_BASE_URL")?;
            Arc::new(LocalStorage::new(root, public_url).await?)
        }
        #[allow(unreachable_patterns)]
        other => {
            return Err(StorageError::ConfigError(format!(
                "storage backend '{other}' was not compiled in"
            )))
        }
    };

    Ok(storage)
}

/// Build the ephemeral and durable stores. Without `S3_STAGING_BUCKET` both share one
/// backend and are separated by key prefix.
pub async fn create_storage_pair(config: &Config) -> StorageResult<StoragePair> {
    let durable = create_storage(config, None).await?;
    let ephemeral = match config.s3_staging_bucket() {
        Some(bucket) if config.storage_backend() == Some(StorageBackend::S3) => {
            create_storage(config, Some(bucket)).await?
        }
        _ => durable.clone(),
    };
    Ok(StoragePair { ephemeral, durable })
}
