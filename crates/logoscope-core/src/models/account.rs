use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// How an account came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CreationChannel {
    /// Explicit sign-in from the frontend
    Direct,
    /// Created lazily when a payment arrived for an unknown email
    Payment,
}

impl Display for CreationChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CreationChannel::Direct => write!(f, "direct"),
            CreationChannel::Payment => write!(f, "payment"),
        }
    }
}

impl FromStr for CreationChannel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(CreationChannel::Direct),
            "payment" => Ok(CreationChannel::Payment),
            _ => Err(anyhow::anyhow!("Invalid creation channel: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Account {
    pub id: Uuid,
    /// Always stored case-folded
    pub email: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
    pub last_free_analysis_at: Option<DateTime<Utc>>,
    pub creation_channel: CreationChannel,
    pub created_at: DateTime<Utc>,
}

/// Result of an idempotent find-or-create by email.
#[derive(Debug, Clone)]
pub struct ResolvedAccount {
    pub account: Account,
    pub created: bool,
}

/// The authenticated caller of a service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub account_id: Uuid,
    pub is_admin: bool,
}

impl Requester {
    pub fn owns(&self, owner_id: Uuid) -> bool {
        self.account_id == owner_id
    }

    /// Owners and admins may manage an analysis.
    pub fn can_manage(&self, owner_id: Uuid) -> bool {
        self.is_admin || self.owns(owner_id)
    }
}

/// Case-fold an email so it can serve as the natural dedup key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
