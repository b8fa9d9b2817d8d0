//! S3-backed blob storage for staged and promoted logos.

use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    public_base: String,
}

/// Where public object URLs point: a path-style custom endpoint or AWS virtual hosting.
fn public_base(bucket: &str, region: &str, endpoint_url: Option<&str>) -> String {
    match endpoint_url {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        None => format!("https://{bucket}.s3.{region}.amazonaws.com"),
    }
}

impl S3Storage {
    /// Build a client for `bucket`. Credentials come from the standard AWS environment.
    /// A custom `endpoint_url` (MinIO, R2) enables plain HTTP when it uses `http://`.
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&bucket)
            .with_region(&region);

        if let Some(endpoint) = endpoint_url.as_deref() {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self {
            public_base: public_base(&bucket, &region, endpoint_url.as_deref()),
            store,
            bucket,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }

    fn location(key: &str) -> StorageResult<Path> {
        validate_key(key)?;
        Ok(Path::from(key))
    }

    fn failed(
        &self,
        op: &'static str,
        key: &str,
        started: Instant,
        err: ObjectStoreError,
        wrap: fn(String) -> StorageError,
    ) -> StorageError {
        tracing::error!(
            error = %err,
            bucket = %self.bucket,
            key = %key,
            op,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "S3 operation failed"
        );
        wrap(err.to_string())
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        let location = Self::location(storage_key)?;
        let size_bytes = data.len();
        let started = Instant::now();

        // PUT replaces the whole object, so redelivered promotions are overwrite-safe.
        self.store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|e| self.failed("put", storage_key, started, e, StorageError::UploadFailed))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stored object in S3"
        );

        Ok(self.object_url(storage_key))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let location = Self::location(storage_key)?;
        let started = Instant::now();

        let object = match self.store.get(&location).await {
            Ok(object) => object,
            Err(ObjectStoreError::NotFound { .. }) => {
                return Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => {
                return Err(self.failed("get", storage_key, started, e, StorageError::DownloadFailed))
            }
        };

        let body = object
            .bytes()
            .await
            .map_err(|e| self.failed("get", storage_key, started, e, StorageError::DownloadFailed))?;

        tracing::debug!(bucket = %self.bucket, key = %storage_key, size_bytes = body.len(), "Fetched object from S3");
        Ok(body.to_vec())
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let location = Self::location(storage_key)?;
        let started = Instant::now();

        match self.store.delete(&location).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {
                tracing::info!(bucket = %self.bucket, key = %storage_key, "Removed object from S3");
                Ok(())
            }
            Err(e) => Err(self.failed("delete", storage_key, started, e, StorageError::DeleteFailed)),
        }
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let location = Self::location(storage_key)?;
        let started = Instant::now();

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(self.failed("head", storage_key, started, e, StorageError::BackendError)),
        }
    }

    async fn get_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let location = Self::location(storage_key)?;
        let started = Instant::now();

        let url = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await
            .map_err(|e| self.failed("sign", storage_key, started, e, StorageError::BackendError))?;

        Ok(url.to_string())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
