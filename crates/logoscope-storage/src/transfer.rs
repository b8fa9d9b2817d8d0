//! Cross-store transfer used to promote staged assets into durable storage.

use crate::{Storage, StorageResult};

/// Copy an object from one store to another.
///
/// The write goes through `upload_with_key`, which replaces any existing object, so
/// repeating a promotion with the same keys is safe. The source is left in place; the
/// caller deletes it once the promotion has been committed. Returns the copied bytes.
pub async fn promote(
    source: &dyn Storage,
    source_key: &str,
    target: &dyn Storage,
    target_key: &str,
    content_type: &str,
) -> StorageResult<Vec<u8>> {
    let start = std::time::Instant::now();
    let data = source.download(source_key).await?;
    let size = data.len();

    target
        .upload_with_key(target_key, data.clone(), content_type)
        .await?;

    tracing::info!(
        from_key = %source_key,
        to_key = %target_key,
        from_backend = %source.backend_type(),
        to_backend = %target.backend_type(),
        size_bytes = size,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Asset promoted"
    );

    Ok(data)
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::{LocalStorage, StorageError};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_promote_is_repeatable() {
        let staging_dir = tempdir().unwrap();
        let durable_dir = tempdir().unwrap();
        let staging = LocalStorage::new(staging_dir.path(), "http://localhost/staging".into())
            .await
            .unwrap();
        let durable = LocalStorage::new(durable_dir.path(), "http://localhost/media".into())
            .await
            .unwrap();

        staging
            .upload_with_key("staging/a/original.png", b"logo".to_vec(), "image/png")
            .await
            .unwrap();

        for _ in 0..2 {
            let copied = promote(
                &staging,
                "staging/a/original.png",
                &durable,
                "analyses/b/a/logo.png",
                "image/png",
            )
            .await
            .unwrap();
            assert_eq!(copied, b"logo".to_vec());
        }

        assert_eq!(
            durable.download("analyses/b/a/logo.png").await.unwrap(),
            b"logo".to_vec()
        );
        assert!(staging.exists("staging/a/original.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_promote_missing_source() {
        let dir = tempdir().unwrap();
        let store = LocalStorage::new(dir.path(), "http://localhost/media".into())
            .await
            .unwrap();
        let result = promote(&store, "staging/x/original.png", &store, "analyses/y/logo.png", "image/png").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}
