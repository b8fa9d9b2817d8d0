//! Storage setup and initialization

use anyhow::{Context, Result};
use logoscope_core::{Config, StorageBackend};
use logoscope_storage::{create_storage_pair, StoragePair};

/// Build the ephemeral (staging) and durable (analysis asset) stores.
pub async fn setup_storage(config: &Config) -> Result<StoragePair> {
    tracing::info!("Initializing storage...");
    let pair = create_storage_pair(config)
        .await
        .context("Failed to initialize storage")?;

    let backend = config.storage_backend().unwrap_or(StorageBackend::Local);
    tracing::info!(
        backend = %backend,
        separate_staging_bucket = config.s3_staging_bucket().is_some() && backend == StorageBackend::S3,
        "Storage initialized"
    );

    Ok(pair)
}
