//! Logoscope Core Library
//!
//! This crate provides the domain models, tier table, rating bands, error types and
//! configuration shared by every Logoscope component.

pub mod config;
pub mod error;
pub mod models;
pub mod rating;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, ServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::*;
pub use rating::{overall_score, Rating};
pub use storage_types::StorageBackend;
