//! Filesystem blob storage, used in development and tests.

use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Objects live under `root`, one file per key; URLs are `public_url/{key}`.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_url: String,
}

fn io_failure<'a>(
    wrap: fn(String) -> StorageError,
    action: &'static str,
    path: &'a Path,
) -> impl FnOnce(std::io::Error) -> StorageError + 'a {
    move |e| wrap(format!("{action} {}: {e}", path.display()))
}

impl LocalStorage {
    pub async fn new(root: impl Into<PathBuf>, public_url: String) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(io_failure(StorageError::ConfigError, "cannot create storage root", &root))?;

        Ok(Self {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a key below the root. A key whose existing target escapes the root
    /// (through a symlink, say) is rejected.
    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        let path = self.root.join(key);

        if let Ok(real) = path.canonicalize() {
            let root = self
                .root
                .canonicalize()
                .map_err(io_failure(StorageError::ConfigError, "cannot resolve storage root", &self.root))?;
            if !real.starts_with(&root) {
                return Err(StorageError::InvalidKey(format!(
                    "{key} resolves outside the storage root"
                )));
            }
        }

        Ok(path)
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    /// Write through a sibling temp file and rename so readers never see a partial object.
    async fn write_atomically(path: &Path, data: &[u8]) -> StorageResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let staging = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        let mut file = fs::File::create(&staging)
            .await
            .map_err(io_failure(StorageError::UploadFailed, "cannot create", &staging))?;
        file.write_all(data)
            .await
            .map_err(io_failure(StorageError::UploadFailed, "cannot write", &staging))?;
        file.sync_all()
            .await
            .map_err(io_failure(StorageError::UploadFailed, "cannot sync", &staging))?;
        drop(file);

        if let Err(e) = fs::rename(&staging, path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(StorageError::UploadFailed(format!(
                "cannot move into {}: {e}",
                path.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.resolve(storage_key)?;
        Self::write_atomically(&path, &data).await?;

        tracing::info!(key = %storage_key, size_bytes = data.len(), "Stored object on disk");
        Ok(self.url_for(storage_key))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(storage_key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(io_failure(StorageError::DownloadFailed, "cannot read", &path)(e)),
        }
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.resolve(storage_key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(key = %storage_key, "Removed object from disk");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_failure(StorageError::DeleteFailed, "cannot remove", &path)(e)),
        }
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.resolve(storage_key)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Local files are served unsigned; the expiry is ignored.
    async fn get_presigned_url(
        &self,
        storage_key: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        self.resolve(storage_key)?;
        Ok(self.url_for(storage_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
