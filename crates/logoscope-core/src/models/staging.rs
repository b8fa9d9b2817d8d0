use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::Tier;

/// Display metadata declared by the uploader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct DisplayMetadata {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 120))]
    pub author: Option<String>,
    #[validate(length(max = 120))]
    pub category: Option<String>,
}

/// An uploaded logo waiting for its owner to be known (free claim) or paid for (webhook).
///
/// Rows are immutable; they are consumed-and-deleted exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedSubmission {
    pub id: Uuid,
    pub session_token: String,
    pub tier: Tier,
    pub asset_key: String,
    pub content_type: String,
    pub file_size: i64,
    pub display: DisplayMetadata,
    pub email: Option<String>,
    pub account_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StagedSubmission {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// File extension of the staged asset key, used when promoting to durable storage.
    pub fn extension(&self) -> &str {
        self.asset_key
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or("bin")
    }
}

/// Response returned to the uploader after staging.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StagingReceipt {
    pub staging_id: Uuid,
    pub tier: Tier,
    pub expires_at: DateTime<Utc>,
}

impl From<&StagedSubmission> for StagingReceipt {
    fn from(staged: &StagedSubmission) -> Self {
        StagingReceipt {
            staging_id: staged.id,
            tier: staged.tier,
            expires_at: staged.expires_at,
        }
    }
}
