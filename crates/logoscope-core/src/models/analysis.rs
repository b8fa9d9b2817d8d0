use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{AnalysisReport, DisplayMetadata, PartialReport, ScoreOverview, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }
}

impl Display for AnalysisStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AnalysisStatus::Pending => write!(f, "pending"),
            AnalysisStatus::Processing => write!(f, "processing"),
            AnalysisStatus::Completed => write!(f, "completed"),
            AnalysisStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for AnalysisStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "processing" => Ok(AnalysisStatus::Processing),
            "completed" => Ok(AnalysisStatus::Completed),
            "failed" => Ok(AnalysisStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid analysis status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    PendingApproval,
    Public,
    Rejected,
}

impl Visibility {
    /// Initial visibility for a freshly created analysis.
    pub fn initial_for(tier: Tier) -> Self {
        match tier {
            Tier::Free => Visibility::PendingApproval,
            Tier::Paid | Tier::Premium => Visibility::Private,
        }
    }
}

impl Display for Visibility {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Visibility::Private => write!(f, "private"),
            Visibility::PendingApproval => write!(f, "pending_approval"),
            Visibility::Public => write!(f, "public"),
            Visibility::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for Visibility {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Visibility::Private),
            "pending_approval" => Ok(Visibility::PendingApproval),
            "public" => Ok(Visibility::Public),
            "rejected" => Ok(Visibility::Rejected),
            _ => Err(anyhow::anyhow!("Invalid visibility: {}", s)),
        }
    }
}

/// Payment fields copied from the checkout session that created the analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCorrelation {
    pub session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub amount_total_cents: Option<i64>,
}

/// Durable analysis record.
///
/// `result` is non-null iff `status = completed`; `share_token` is only ever set for
/// payable tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: Uuid,
    pub account_id: Uuid,
    pub tier: Tier,
    pub status: AnalysisStatus,
    pub visibility: Visibility,
    pub display: DisplayMetadata,
    pub asset_key: String,
    pub content_type: String,
    /// Base64 copy of small assets, served when durable storage is unavailable
    pub inline_asset: Option<String>,
    pub result: Option<AnalysisReport>,
    pub partial_result: Option<PartialReport>,
    pub failure_reason: Option<String>,
    pub share_token: Option<String>,
    pub weekly_featured: bool,
    pub rejection_reason: Option<String>,
    pub payment: PaymentCorrelation,
    pub run_id: Option<Uuid>,
    pub run_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Analysis {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Insert payload for a new analysis row. Status always starts as `pending`.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub id: Uuid,
    pub account_id: Uuid,
    pub tier: Tier,
    pub visibility: Visibility,
    pub display: DisplayMetadata,
    pub asset_key: String,
    pub content_type: String,
    pub inline_asset: Option<String>,
    pub share_token: Option<String>,
    pub payment: PaymentCorrelation,
}

/// How much of a result a requester may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResultAccess {
    Full,
    ScoresOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ResultView {
    Full(Box<AnalysisReport>),
    Scores(ScoreOverview),
}

/// Projection of an analysis returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisView {
    pub id: Uuid,
    pub tier: Tier,
    pub status: AnalysisStatus,
    pub visibility: Visibility,
    pub display: DisplayMetadata,
    pub asset_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_asset: Option<String>,
    pub access: ResultAccess,
    pub result: Option<ResultView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub weekly_featured: bool,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
