//! In-memory stores

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use logoscope_core::{
    normalize_email, Account, Analysis, AnalysisReport, AnalysisStatus, AppError,
    CreationChannel, CurationSlot, NewAnalysis, PartialReport, ResolvedAccount,
    StagedSubmission, Tier, Visibility,
};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::db::{AccountStore, AnalysisStore, CurationStore, FreeSlotReservation, RunLease, StagingStore};

#[derive(Default)]
struct State {
    accounts: HashMap<Uuid, Account>,
    staging: HashMap<Uuid, StagedSubmission>,
    analyses: HashMap<Uuid, Analysis>,
    slots: Vec<CurationSlot>,
}

/// One shared state behind every store trait, so cross-table operations stay atomic.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        Ok(self.state.lock().unwrap())
    }

    /// Make every subsequent call fail, simulating a database outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn seed_account(&self, email: &str, is_admin: bool) -> Account {
        let account = Account {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            display_name: None,
            is_admin,
            last_free_analysis_at: None,
            creation_channel: CreationChannel::Direct,
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(account.id, account.clone());
        account
    }

    pub fn seed_analysis(&self, analysis: Analysis) {
        self.state
            .lock()
            .unwrap()
            .analyses
            .insert(analysis.id, analysis);
    }

    pub fn account(&self, id: Uuid) -> Option<Account> {
        self.state.lock().unwrap().accounts.get(&id).cloned()
    }

    pub fn analysis(&self, id: Uuid) -> Option<Analysis> {
        self.state.lock().unwrap().analyses.get(&id).cloned()
    }

    pub fn staged(&self, id: Uuid) -> Option<StagedSubmission> {
        self.state.lock().unwrap().staging.get(&id).cloned()
    }

    pub fn account_count(&self) -> usize {
        self.state.lock().unwrap().accounts.len()
    }

    pub fn analysis_count(&self) -> usize {
        self.state.lock().unwrap().analyses.len()
    }

    pub fn staging_count(&self) -> usize {
        self.state.lock().unwrap().staging.len()
    }

    /// Overwrite the stored timestamp of the last free analysis.
    pub fn set_last_free_analysis(&self, account_id: Uuid, at: Option<DateTime<Utc>>) {
        if let Some(account) = self.state.lock().unwrap().accounts.get_mut(&account_id) {
            account.last_free_analysis_at = at;
        }
    }
}

fn analysis_from_new(new: &NewAnalysis, now: DateTime<Utc>) -> Analysis {
    Analysis {
        id: new.id,
        account_id: new.account_id,
        tier: new.tier,
        status: AnalysisStatus::Pending,
        visibility: new.visibility,
        display: new.display.clone(),
        asset_key: new.asset_key.clone(),
        content_type: new.content_type.clone(),
        inline_asset: new.inline_asset.clone(),
        result: None,
        partial_result: None,
        failure_reason: None,
        share_token: new.share_token.clone(),
        weekly_featured: false,
        rejection_reason: None,
        payment: new.payment.clone(),
        run_id: None,
        run_started_at: None,
        created_at: now,
        updated_at: now,
        completed_at: None,
        deleted_at: None,
    }
}

fn holds_lease(analysis: &Analysis, lease: RunLease) -> bool {
    analysis.status == AnalysisStatus::Processing && analysis.run_id == Some(lease.run_id)
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.lock()?.accounts.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let email = normalize_email(email);
        Ok(self
            .lock()?
            .accounts
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_or_create(
        &self,
        email: &str,
        display_name: Option<&str>,
        channel: CreationChannel,
    ) -> Result<ResolvedAccount, AppError> {
        let email = normalize_email(email);
        let mut state = self.lock()?;

        if let Some(account) = state.accounts.values().find(|a| a.email == email) {
            return Ok(ResolvedAccount {
                account: account.clone(),
                created: false,
            });
        }

        let account = Account {
            id: Uuid::new_v4(),
            email,
            display_name: display_name.map(str::to_string),
            is_admin: false,
            last_free_analysis_at: None,
            creation_channel: channel,
            created_at: Utc::now(),
        };
        state.accounts.insert(account.id, account.clone());
        Ok(ResolvedAccount {
            account,
            created: true,
        })
    }

    async fn reserve_free_slot(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<FreeSlotReservation, AppError> {
        let mut state = self.lock()?;
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        match account.last_free_analysis_at {
            Some(last) if last > now - cooldown => Ok(FreeSlotReservation::Exhausted {
                available_at: last + cooldown,
            }),
            previous => {
                account.last_free_analysis_at = Some(now);
                Ok(FreeSlotReservation::Reserved {
                    reserved_at: now,
                    previous,
                })
            }
        }
    }

    async fn release_free_slot(
        &self,
        account_id: Uuid,
        reserved_at: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut state = self.lock()?;
        if let Some(account) = state.accounts.get_mut(&account_id) {
            if account.last_free_analysis_at == Some(reserved_at) {
                account.last_free_analysis_at = previous;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StagingStore for InMemoryStore {
    async fn insert(&self, staged: &StagedSubmission) -> Result<(), AppError> {
        self.lock()?.staging.insert(staged.id, staged.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StagedSubmission>, AppError> {
        Ok(self.lock()?.staging.get(&id).cloned())
    }

    async fn consume(&self, id: Uuid) -> Result<Option<StagedSubmission>, AppError> {
        Ok(self.lock()?.staging.remove(&id))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<StagedSubmission>, AppError> {
        let mut state = self.lock()?;
        let expired: Vec<Uuid> = state
            .staging
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.id)
            .collect();
        Ok(expired
            .into_iter()
            .filter_map(|id| state.staging.remove(&id))
            .collect())
    }
}

#[async_trait]
impl AnalysisStore for InMemoryStore {
    async fn insert_if_absent(&self, new: &NewAnalysis) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        if state.analyses.contains_key(&new.id) {
            return Ok(false);
        }
        state.analyses.insert(new.id, analysis_from_new(new, Utc::now()));
        Ok(true)
    }

    async fn create_from_staging(&self, new: &NewAnalysis) -> Result<Option<Analysis>, AppError> {
        let mut state = self.lock()?;
        if state.analyses.contains_key(&new.id) {
            return Err(AppError::Internal("duplicate analysis id".to_string()));
        }
        if state.staging.remove(&new.id).is_none() {
            return Ok(None);
        }
        let analysis = analysis_from_new(new, Utc::now());
        state.analyses.insert(analysis.id, analysis.clone());
        Ok(Some(analysis))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Analysis>, AppError> {
        Ok(self.lock()?.analyses.get(&id).cloned())
    }

    async fn get_by_share_token(&self, token: &str) -> Result<Option<Analysis>, AppError> {
        Ok(self
            .lock()?
            .analyses
            .values()
            .find(|a| a.share_token.as_deref() == Some(token))
            .cloned())
    }

    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<Analysis>, AppError> {
        let mut analyses: Vec<Analysis> = self
            .lock()?
            .analyses
            .values()
            .filter(|a| a.account_id == account_id && !a.is_deleted())
            .cloned()
            .collect();
        analyses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(analyses)
    }

    async fn list_by_visibility(
        &self,
        visibility: Visibility,
        limit: i64,
    ) -> Result<Vec<Analysis>, AppError> {
        let mut analyses: Vec<Analysis> = self
            .lock()?
            .analyses
            .values()
            .filter(|a| a.visibility == visibility && !a.is_deleted())
            .cloned()
            .collect();
        analyses.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        analyses.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(analyses)
    }

    async fn begin_run(
        &self,
        lease: RunLease,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<Analysis>, AppError> {
        let mut state = self.lock()?;
        let Some(analysis) = state.analyses.get_mut(&lease.analysis_id) else {
            return Ok(None);
        };
        if analysis.is_deleted() {
            return Ok(None);
        }

        let admitted = match analysis.status {
            AnalysisStatus::Pending => true,
            AnalysisStatus::Processing => {
                analysis.run_id.is_none()
                    || analysis.run_started_at.is_some_and(|t| t < stale_before)
            }
            AnalysisStatus::Completed | AnalysisStatus::Failed => false,
        };
        if !admitted {
            return Ok(None);
        }

        analysis.status = AnalysisStatus::Processing;
        analysis.run_id = Some(lease.run_id);
        analysis.run_started_at = Some(now);
        analysis.updated_at = now;
        Ok(Some(analysis.clone()))
    }

    async fn complete_run(
        &self,
        lease: RunLease,
        report: &AnalysisReport,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        match state.analyses.get_mut(&lease.analysis_id) {
            Some(analysis) if holds_lease(analysis, lease) => {
                analysis.status = AnalysisStatus::Completed;
                analysis.result = Some(report.clone());
                analysis.partial_result = None;
                analysis.failure_reason = None;
                analysis.run_id = None;
                analysis.run_started_at = None;
                analysis.completed_at = Some(now);
                analysis.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_run(
        &self,
        lease: RunLease,
        reason: &str,
        partial: Option<&PartialReport>,
    ) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        match state.analyses.get_mut(&lease.analysis_id) {
            Some(analysis) if holds_lease(analysis, lease) => {
                analysis.status = AnalysisStatus::Failed;
                analysis.failure_reason = Some(reason.to_string());
                analysis.partial_result = partial.cloned();
                analysis.run_id = None;
                analysis.run_started_at = None;
                analysis.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_run(&self, lease: RunLease) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        match state.analyses.get_mut(&lease.analysis_id) {
            Some(analysis) if holds_lease(analysis, lease) => {
                analysis.run_id = None;
                analysis.run_started_at = None;
                analysis.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restart(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        match state.analyses.get_mut(&id) {
            Some(analysis) if analysis.status == AnalysisStatus::Failed && !analysis.is_deleted() => {
                analysis.status = AnalysisStatus::Pending;
                analysis.failure_reason = None;
                analysis.partial_result = None;
                analysis.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ensure_share_token(&self, id: Uuid, token: &str) -> Result<Option<String>, AppError> {
        let mut state = self.lock()?;
        match state.analyses.get_mut(&id) {
            Some(analysis) if analysis.tier != Tier::Free && !analysis.is_deleted() => {
                if analysis.share_token.is_none() {
                    analysis.share_token = Some(token.to_string());
                    analysis.updated_at = Utc::now();
                }
                Ok(analysis.share_token.clone())
            }
            _ => Ok(None),
        }
    }

    async fn transition_visibility(
        &self,
        id: Uuid,
        from: &[Visibility],
        to: Visibility,
        rejection_reason: Option<&str>,
    ) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        match state.analyses.get_mut(&id) {
            Some(analysis) if from.contains(&analysis.visibility) && !analysis.is_deleted() => {
                analysis.visibility = to;
                analysis.rejection_reason = rejection_reason.map(str::to_string);
                analysis.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_weekly_featured(&self, id: Uuid, featured: bool) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        match state.analyses.get_mut(&id) {
            Some(analysis) if !analysis.is_deleted() => {
                analysis.weekly_featured = featured;
                analysis.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.lock()?;
        match state.analyses.get_mut(&id) {
            Some(analysis) if !analysis.is_deleted() => {
                let now = Utc::now();
                analysis.deleted_at = Some(now);
                analysis.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl CurationStore for InMemoryStore {
    async fn replace_all(&self, slots: &[CurationSlot]) -> Result<(), AppError> {
        let mut state = self.lock()?;
        let mut slots = slots.to_vec();
        slots.sort_by_key(|s| s.position);
        state.slots = slots;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<CurationSlot>, AppError> {
        Ok(self.lock()?.slots.clone())
    }

    async fn list_range(
        &self,
        positions: Range<i32>,
    ) -> Result<Vec<(CurationSlot, Analysis)>, AppError> {
        let state = self.lock()?;
        Ok(state
            .slots
            .iter()
            .filter(|slot| positions.contains(&slot.position))
            .filter_map(|slot| {
                state
                    .analyses
                    .get(&slot.analysis_id)
                    .filter(|a| !a.is_deleted())
                    .map(|a| (*slot, a.clone()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logoscope_core::{DisplayMetadata, PaymentCorrelation};

    fn new_analysis(account_id: Uuid, tier: Tier) -> NewAnalysis {
        NewAnalysis {
            id: Uuid::new_v4(),
            account_id,
            tier,
            visibility: Visibility::initial_for(tier),
            display: DisplayMetadata {
                name: "Acme".to_string(),
                author: None,
                category: None,
            },
            asset_key: "analyses/a/b/logo.png".to_string(),
            content_type: "image/png".to_string(),
            inline_asset: None,
            share_token: None,
            payment: PaymentCorrelation::default(),
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_is_idempotent() {
        let store = InMemoryStore::new();
        let account = store.seed_account("a@example.com", false);
        let new = new_analysis(account.id, Tier::Paid);

        assert!(store.insert_if_absent(&new).await.unwrap());
        assert!(!store.insert_if_absent(&new).await.unwrap());
        assert_eq!(store.analysis_count(), 1);
    }

    #[tokio::test]
    async fn test_begin_run_admits_one_lease() {
        let store = InMemoryStore::new();
        let account = store.seed_account("a@example.com", false);
        let new = new_analysis(account.id, Tier::Paid);
        store.insert_if_absent(&new).await.unwrap();

        let now = Utc::now();
        let stale_before = now - Duration::minutes(10);
        let first = RunLease {
            analysis_id: new.id,
            run_id: Uuid::new_v4(),
        };
        let second = RunLease {
            analysis_id: new.id,
            run_id: Uuid::new_v4(),
        };

        assert!(store.begin_run(first, now, stale_before).await.unwrap().is_some());
        assert!(store.begin_run(second, now, stale_before).await.unwrap().is_none());

        assert!(store.release_run(first).await.unwrap());
        assert!(store.begin_run(second, now, stale_before).await.unwrap().is_some());
        assert!(!store.release_run(first).await.unwrap());
    }

    #[tokio::test]
    async fn test_free_slot_reserve_and_release() {
        let store = InMemoryStore::new();
        let account = store.seed_account("a@example.com", false);
        let now = Utc::now();
        let cooldown = Duration::hours(24);

        let reservation = store.reserve_free_slot(account.id, now, cooldown).await.unwrap();
        let FreeSlotReservation::Reserved { reserved_at, previous } = reservation else {
            panic!("expected reservation");
        };
        assert!(matches!(
            store.reserve_free_slot(account.id, now, cooldown).await.unwrap(),
            FreeSlotReservation::Exhausted { .. }
        ));

        store
            .release_free_slot(account.id, reserved_at, previous)
            .await
            .unwrap();
        assert!(store.account(account.id).unwrap().last_free_analysis_at.is_none());
    }

    #[tokio::test]
    async fn test_consume_hands_out_a_submission_once() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let staged = StagedSubmission {
            id: Uuid::new_v4(),
            session_token: "sess".to_string(),
            tier: Tier::Paid,
            asset_key: "staging/x/original.png".to_string(),
            content_type: "image/png".to_string(),
            file_size: 3,
            display: DisplayMetadata {
                name: "Acme".to_string(),
                author: None,
                category: None,
            },
            email: None,
            account_id: None,
            created_at: now,
            expires_at: now + Duration::hours(24),
        };
        StagingStore::insert(&store, &staged).await.unwrap();

        assert!(StagingStore::get(&store, staged.id).await.unwrap().is_some());
        assert!(store.consume(staged.id).await.unwrap().is_some());
        assert!(store.consume(staged.id).await.unwrap().is_none());
        assert_eq!(store.staging_count(), 0);
    }

    #[tokio::test]
    async fn test_share_token_never_set_for_free_tier() {
        let store = InMemoryStore::new();
        let account = store.seed_account("a@example.com", false);
        let free = new_analysis(account.id, Tier::Free);
        store.insert_if_absent(&free).await.unwrap();

        assert!(store.ensure_share_token(free.id, "tok").await.unwrap().is_none());
    }
}
