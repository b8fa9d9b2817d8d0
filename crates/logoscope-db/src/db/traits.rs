//! Store traits
//!
//! Every cross-request state change goes through one of these traits, and each
//! method is a single conditional statement or a single transaction. That is what
//! makes webhook redelivery, concurrent stream requests and concurrent free claims
//! safe without any in-process locking.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use logoscope_core::{
    Account, Analysis, AnalysisReport, AppError, CreationChannel, CurationSlot, NewAnalysis,
    PartialReport, ResolvedAccount, StagedSubmission, Visibility,
};
use std::ops::Range;
use uuid::Uuid;

/// Outcome of trying to take the rolling free-analysis slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeSlotReservation {
    /// The slot was taken at `reserved_at`; `previous` is what to restore on rollback.
    Reserved {
        reserved_at: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    },
    /// The slot is in use until `available_at`.
    Exhausted { available_at: DateTime<Utc> },
}

/// Proof that the caller owns the current pipeline run of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLease {
    pub analysis_id: Uuid,
    pub run_id: Uuid,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;

    /// Find the account for a case-folded email, creating it if absent. Safe to race.
    async fn find_or_create(
        &self,
        email: &str,
        display_name: Option<&str>,
        channel: CreationChannel,
    ) -> Result<ResolvedAccount, AppError>;

    /// Atomically take the free slot if it has not been used within `cooldown`.
    async fn reserve_free_slot(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<FreeSlotReservation, AppError>;

    /// Undo a reservation, but only if nothing has replaced it since.
    async fn release_free_slot(
        &self,
        account_id: Uuid,
        reserved_at: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait StagingStore: Send + Sync {
    async fn insert(&self, staged: &StagedSubmission) -> Result<(), AppError>;

    /// Non-consuming read.
    async fn get(&self, id: Uuid) -> Result<Option<StagedSubmission>, AppError>;

    /// Delete and return the row. Only one caller ever receives `Some`.
    async fn consume(&self, id: Uuid) -> Result<Option<StagedSubmission>, AppError>;

    /// Delete and return every row that expired before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<StagedSubmission>, AppError>;
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Insert unless a row with the same id exists. Returns whether this call inserted it.
    async fn insert_if_absent(&self, new: &NewAnalysis) -> Result<bool, AppError>;

    /// Consume the staged submission with the same id and insert the analysis in one
    /// transaction. Returns `None` when the staged row was already gone.
    async fn create_from_staging(&self, new: &NewAnalysis) -> Result<Option<Analysis>, AppError>;

    /// Read including soft-deleted rows.
    async fn get(&self, id: Uuid) -> Result<Option<Analysis>, AppError>;

    async fn get_by_share_token(&self, token: &str) -> Result<Option<Analysis>, AppError>;

    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<Analysis>, AppError>;

    /// Non-deleted analyses with the given visibility, oldest first.
    async fn list_by_visibility(
        &self,
        visibility: Visibility,
        limit: i64,
    ) -> Result<Vec<Analysis>, AppError>;

    /// Move to `processing` under a fresh run lease. Admitted from `pending`, or from
    /// `processing` when no lease is held or the lease started before `stale_before`.
    /// Returns the updated row, or `None` when the transition was refused.
    async fn begin_run(
        &self,
        lease: RunLease,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<Analysis>, AppError>;

    /// `processing -> completed`, only while the lease is still held.
    async fn complete_run(
        &self,
        lease: RunLease,
        report: &AnalysisReport,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// `processing -> failed`, only while the lease is still held.
    async fn fail_run(
        &self,
        lease: RunLease,
        reason: &str,
        partial: Option<&PartialReport>,
    ) -> Result<bool, AppError>;

    /// Drop the lease and leave the status at `processing`.
    async fn release_run(&self, lease: RunLease) -> Result<bool, AppError>;

    /// `failed -> pending`.
    async fn restart(&self, id: Uuid) -> Result<bool, AppError>;

    /// Set the share token unless one exists; returns whichever token is stored.
    async fn ensure_share_token(&self, id: Uuid, token: &str) -> Result<Option<String>, AppError>;

    /// Change visibility only when the current value is one of `from`.
    async fn transition_visibility(
        &self,
        id: Uuid,
        from: &[Visibility],
        to: Visibility,
        rejection_reason: Option<&str>,
    ) -> Result<bool, AppError>;

    async fn set_weekly_featured(&self, id: Uuid, featured: bool) -> Result<bool, AppError>;

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait CurationStore: Send + Sync {
    /// Replace the whole assignment in one transaction.
    async fn replace_all(&self, slots: &[CurationSlot]) -> Result<(), AppError>;

    async fn list_all(&self) -> Result<Vec<CurationSlot>, AppError>;

    /// Slots in `positions` joined with their non-deleted analyses, in position order.
    async fn list_range(
        &self,
        positions: Range<i32>,
    ) -> Result<Vec<(CurationSlot, Analysis)>, AppError>;
}
