use async_trait::async_trait;
use logoscope_core::{AppError, ReportSection};
use serde_json::Value;

/// External content generation used by the pipeline stages.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Stage A: free-text visual description of an image.
    async fn describe(&self, image: &[u8], media_type: &str) -> Result<String, AppError>;

    /// Stage B: schema-constrained extraction of one report section. The returned
    /// value is checked by the caller.
    async fn extract(&self, section: ReportSection, description: &str)
        -> Result<Value, AppError>;
}
