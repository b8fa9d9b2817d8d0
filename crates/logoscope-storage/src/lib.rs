//! Logoscope Storage Library
//!
//! Blob storage abstraction for logo assets, with S3 (via `object_store`) and local
//! filesystem backends.
//!
//! # Storage key format
//!
//! - **Ephemeral staging**: `staging/{staging_id}/original.{ext}`
//! - **Durable analyses**: `analyses/{account_id}/{analysis_id}/logo.{ext}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;
pub mod transfer;

// Re-export commonly used types
pub use factory::{create_storage, create_storage_pair, StoragePair};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use logoscope_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
pub use transfer::promote;
