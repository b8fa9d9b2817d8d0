//! Result projection and the visibility gate
//!
//! Owners and admins always see the whole analysis. Everyone else only sees `public`
//! analyses, and only the scores when the analysis is free tier.

use logoscope_core::{
    Analysis, AnalysisStatus, AnalysisView, AppError, Requester, ResultAccess, ResultView,
    ScoreOverview, Tier, Visibility,
};
use logoscope_db::AnalysisStore;
use logoscope_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const MAX_REJECTION_REASON_LEN: usize = 500;

/// 32 random bytes, hex encoded.
pub fn generate_share_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

/// `Cache-Control` policy for a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Completed and visible to anyone
    Public,
    /// Completed, seen by its owner or an admin
    Private,
    /// Still changing
    NoStore,
}

impl CachePolicy {
    pub fn header_value(&self) -> &'static str {
        match self {
            CachePolicy::Public => "public, max-age=300",
            CachePolicy::Private => "private, max-age=60",
            CachePolicy::NoStore => "no-store",
        }
    }
}

#[derive(Clone)]
pub struct ResultService {
    analyses: Arc<dyn AnalysisStore>,
    durable: Arc<dyn Storage>,
    asset_url_ttl: Duration,
}

impl ResultService {
    pub fn new(
        analyses: Arc<dyn AnalysisStore>,
        durable: Arc<dyn Storage>,
        asset_url_ttl: Duration,
    ) -> Self {
        Self {
            analyses,
            durable,
            asset_url_ttl,
        }
    }

    /// Load an analysis. Soft-deleted rows only exist for admins.
    async fn load(&self, id: Uuid, requester: Option<&Requester>) -> Result<Analysis, AppError> {
        let is_admin = requester.map(|r| r.is_admin).unwrap_or(false);
        self.analyses
            .get(id)
            .await?
            .filter(|a| !a.is_deleted() || is_admin)
            .ok_or_else(|| AppError::NotFound("Analysis not found".to_string()))
    }

    async fn load_managed(&self, id: Uuid, requester: &Requester) -> Result<Analysis, AppError> {
        let analysis = self.load(id, Some(requester)).await?;
        if !requester.can_manage(analysis.account_id) {
            return Err(AppError::Forbidden(
                "Only the owner or an administrator can manage this analysis".to_string(),
            ));
        }
        Ok(analysis)
    }

    fn require_admin(requester: &Requester) -> Result<(), AppError> {
        if requester.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator role required".to_string()))
        }
    }

    async fn asset_url(&self, analysis: &Analysis) -> Option<String> {
        match self
            .durable
            .get_presigned_url(&analysis.asset_key, self.asset_url_ttl)
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    analysis_id = %analysis.id,
                    "Failed to presign asset URL"
                );
                None
            }
        }
    }

    async fn build_view(
        &self,
        analysis: &Analysis,
        access: ResultAccess,
        privileged: bool,
        is_owner: bool,
    ) -> AnalysisView {
        let result = match (&analysis.result, analysis.status) {
            (Some(report), AnalysisStatus::Completed) => Some(match access {
                ResultAccess::Full => ResultView::Full(Box::new(report.clone())),
                ResultAccess::ScoresOnly => ResultView::Scores(ScoreOverview::from(report)),
            }),
            _ => None,
        };

        let asset_url = self.asset_url(analysis).await;
        let inline_asset = match asset_url {
            Some(_) => None,
            None => analysis.inline_asset.clone(),
        };

        AnalysisView {
            id: analysis.id,
            tier: analysis.tier,
            status: analysis.status,
            visibility: analysis.visibility,
            display: analysis.display.clone(),
            asset_url,
            inline_asset,
            access,
            result,
            share_token: analysis.share_token.clone().filter(|_| privileged),
            failure_reason: analysis.failure_reason.clone().filter(|_| privileged),
            rejection_reason: analysis.rejection_reason.clone().filter(|_| privileged),
            weekly_featured: analysis.weekly_featured,
            is_owner,
            created_at: analysis.created_at,
            completed_at: analysis.completed_at,
        }
    }

    /// Project an analysis for `requester` without any visibility check.
    pub async fn project(&self, analysis: &Analysis, requester: Option<&Requester>) -> AnalysisView {
        let privileged = requester
            .map(|r| r.can_manage(analysis.account_id))
            .unwrap_or(false);
        let is_owner = requester
            .map(|r| r.owns(analysis.account_id))
            .unwrap_or(false);
        let access = if privileged || analysis.tier.shows_full_report_publicly() {
            ResultAccess::Full
        } else {
            ResultAccess::ScoresOnly
        };
        self.build_view(analysis, access, privileged, is_owner).await
    }

    #[tracing::instrument(skip(self, requester))]
    pub async fn get_result(
        &self,
        id: Uuid,
        requester: Option<&Requester>,
    ) -> Result<(AnalysisView, CachePolicy), AppError> {
        let analysis = self.load(id, requester).await?;
        let privileged = requester
            .map(|r| r.can_manage(analysis.account_id))
            .unwrap_or(false);

        if !privileged && analysis.visibility != Visibility::Public {
            return Err(match requester {
                None => AppError::Unauthorized("Sign in to view this analysis".to_string()),
                Some(_) => AppError::Forbidden("This analysis is not public".to_string()),
            });
        }

        let policy = match (analysis.status, privileged) {
            (AnalysisStatus::Completed, true) => CachePolicy::Private,
            (AnalysisStatus::Completed, false) => CachePolicy::Public,
            _ => CachePolicy::NoStore,
        };

        Ok((self.project(&analysis, requester).await, policy))
    }

    /// Paid-level projection reached through a share token.
    pub async fn get_shared(&self, token: &str) -> Result<(AnalysisView, CachePolicy), AppError> {
        let analysis = self
            .analyses
            .get_by_share_token(token)
            .await?
            .filter(|a| !a.is_deleted())
            .ok_or_else(|| AppError::NotFound("Shared analysis not found".to_string()))?;

        let policy = if analysis.status == AnalysisStatus::Completed {
            CachePolicy::Public
        } else {
            CachePolicy::NoStore
        };
        let view = self
            .build_view(&analysis, ResultAccess::Full, false, false)
            .await;
        Ok((view, policy))
    }

    pub async fn list_own(&self, requester: &Requester) -> Result<Vec<AnalysisView>, AppError> {
        let analyses = self.analyses.list_for_account(requester.account_id).await?;
        let mut views = Vec::with_capacity(analyses.len());
        for analysis in &analyses {
            views.push(self.project(analysis, Some(requester)).await);
        }
        Ok(views)
    }

    /// Issue the share token, or return the one already issued.
    #[tracing::instrument(skip(self, requester))]
    pub async fn share(&self, id: Uuid, requester: &Requester) -> Result<String, AppError> {
        let analysis = self.load_managed(id, requester).await?;
        if analysis.tier == Tier::Free {
            return Err(AppError::TierNotEligible(
                "Free analyses cannot be shared by link".to_string(),
            ));
        }
        if let Some(token) = analysis.share_token {
            return Ok(token);
        }

        self.analyses
            .ensure_share_token(id, &generate_share_token())
            .await?
            .ok_or_else(|| AppError::NotFound("Analysis not found".to_string()))
    }

    /// Owner toggle between `private` and `public` for paid tiers.
    #[tracing::instrument(skip(self, requester))]
    pub async fn set_visibility(
        &self,
        id: Uuid,
        requester: &Requester,
        visibility: Visibility,
    ) -> Result<AnalysisView, AppError> {
        let analysis = self.load(id, Some(requester)).await?;
        if !requester.owns(analysis.account_id) {
            return Err(AppError::Forbidden(
                "Only the owner can change visibility".to_string(),
            ));
        }
        if analysis.tier == Tier::Free {
            return Err(AppError::TierNotEligible(
                "Free analyses are published through moderation".to_string(),
            ));
        }
        if !matches!(visibility, Visibility::Public | Visibility::Private) {
            return Err(AppError::Validation(
                "visibility must be public or private".to_string(),
            ));
        }

        let changed = self
            .analyses
            .transition_visibility(
                id,
                &[Visibility::Private, Visibility::Public],
                visibility,
                None,
            )
            .await?;
        if !changed {
            return Err(AppError::Validation(
                "Visibility cannot be changed from its current state".to_string(),
            ));
        }

        tracing::info!(analysis_id = %id, visibility = %visibility, "Visibility changed");
        self.reload(id, requester).await
    }

    #[tracing::instrument(skip(self, requester))]
    pub async fn approve(&self, id: Uuid, requester: &Requester) -> Result<AnalysisView, AppError> {
        Self::require_admin(requester)?;
        let analysis = self.load(id, Some(requester)).await?;
        if analysis.status != AnalysisStatus::Completed {
            return Err(AppError::Validation(
                "Only completed analyses can be approved".to_string(),
            ));
        }

        let changed = self
            .analyses
            .transition_visibility(id, &[Visibility::PendingApproval], Visibility::Public, None)
            .await?;
        if !changed {
            return Err(AppError::Validation(
                "Analysis is not awaiting approval".to_string(),
            ));
        }

        tracing::info!(analysis_id = %id, "Analysis approved");
        self.reload(id, requester).await
    }

    #[tracing::instrument(skip(self, requester, reason))]
    pub async fn reject(
        &self,
        id: Uuid,
        requester: &Requester,
        reason: &str,
    ) -> Result<AnalysisView, AppError> {
        Self::require_admin(requester)?;
        let reason = reason.trim();
        if reason.is_empty() || reason.chars().count() > MAX_REJECTION_REASON_LEN {
            return Err(AppError::Validation(
                "reason must be 1-500 characters".to_string(),
            ));
        }
        self.load(id, Some(requester)).await?;

        let changed = self
            .analyses
            .transition_visibility(
                id,
                &[Visibility::PendingApproval],
                Visibility::Rejected,
                Some(reason),
            )
            .await?;
        if !changed {
            return Err(AppError::Validation(
                "Analysis is not awaiting approval".to_string(),
            ));
        }

        tracing::info!(analysis_id = %id, "Analysis rejected");
        self.reload(id, requester).await
    }

    pub async fn set_weekly_featured(
        &self,
        id: Uuid,
        requester: &Requester,
        featured: bool,
    ) -> Result<AnalysisView, AppError> {
        Self::require_admin(requester)?;
        if !self.analyses.set_weekly_featured(id, featured).await? {
            return Err(AppError::NotFound("Analysis not found".to_string()));
        }
        self.reload(id, requester).await
    }

    #[tracing::instrument(skip(self, requester))]
    pub async fn delete(&self, id: Uuid, requester: &Requester) -> Result<(), AppError> {
        self.load_managed(id, requester).await?;
        if !self.analyses.soft_delete(id).await? {
            return Err(AppError::NotFound("Analysis not found".to_string()));
        }
        tracing::info!(analysis_id = %id, "Analysis deleted");
        Ok(())
    }

    /// `failed -> pending`, keeping the durable asset.
    #[tracing::instrument(skip(self, requester))]
    pub async fn restart(&self, id: Uuid, requester: &Requester) -> Result<AnalysisView, AppError> {
        let analysis = self.load_managed(id, requester).await?;
        if analysis.status != AnalysisStatus::Failed || !self.analyses.restart(id).await? {
            return Err(AppError::Validation(
                "Only failed analyses can be restarted".to_string(),
            ));
        }
        tracing::info!(analysis_id = %id, "Analysis restarted");
        self.reload(id, requester).await
    }

    /// Free analyses waiting for a decision, oldest first.
    pub async fn moderation_queue(
        &self,
        requester: &Requester,
        limit: i64,
    ) -> Result<Vec<AnalysisView>, AppError> {
        Self::require_admin(requester)?;
        let pending = self
            .analyses
            .list_by_visibility(Visibility::PendingApproval, limit)
            .await?;
        let mut views = Vec::with_capacity(pending.len());
        for analysis in &pending {
            views.push(self.project(analysis, Some(requester)).await);
        }
        Ok(views)
    }

    async fn reload(&self, id: Uuid, requester: &Requester) -> Result<AnalysisView, AppError> {
        let analysis = self.load(id, Some(requester)).await?;
        Ok(self.project(&analysis, Some(requester)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{analysis_fixture, completed_analysis, MemoryStorage};
    use logoscope_db::test_helpers::InMemoryStore;

    struct Harness {
        store: InMemoryStore,
        service: ResultService,
        owner: Requester,
        stranger: Requester,
        admin: Requester,
    }

    fn harness() -> Harness {
        let store = InMemoryStore::new();
        let owner = store.seed_account("owner@example.com", false);
        let stranger = store.seed_account("stranger@example.com", false);
        let admin = store.seed_account("admin@example.com", true);
        let service = ResultService::new(
            Arc::new(store.clone()),
            Arc::new(MemoryStorage::new()),
            Duration::from_secs(60),
        );
        let requester = |account: &logoscope_core::Account| Requester {
            account_id: account.id,
            is_admin: account.is_admin,
        };
        Harness {
            service,
            owner: requester(&owner),
            stranger: requester(&stranger),
            admin: requester(&admin),
            store,
        }
    }

    impl Harness {
        fn seed(&self, analysis: Analysis) -> Uuid {
            let id = analysis.id;
            self.store.seed_analysis(analysis);
            id
        }
    }

    #[test]
    fn test_share_token_is_64_hex_chars() {
        let token = generate_share_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_share_token());
    }

    #[tokio::test]
    async fn test_non_public_analysis_is_hidden_from_others() {
        let h = harness();
        let id = h.seed(completed_analysis(h.owner.account_id, Tier::Paid));

        let err = h.service.get_result(id, Some(&h.stranger)).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = h.service.get_result(id, None).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let (view, policy) = h.service.get_result(id, Some(&h.owner)).await.unwrap();
        assert!(view.is_owner);
        assert_eq!(view.access, ResultAccess::Full);
        assert_eq!(policy, CachePolicy::Private);

        let (view, _) = h.service.get_result(id, Some(&h.admin)).await.unwrap();
        assert!(!view.is_owner);
        assert_eq!(view.access, ResultAccess::Full);
    }

    #[tokio::test]
    async fn test_public_free_analysis_shows_scores_only() {
        let h = harness();
        let mut analysis = completed_analysis(h.owner.account_id, Tier::Free);
        analysis.visibility = Visibility::Public;
        let id = h.seed(analysis);

        let (view, policy) = h.service.get_result(id, None).await.unwrap();
        assert_eq!(view.access, ResultAccess::ScoresOnly);
        assert!(matches!(view.result, Some(ResultView::Scores(_))));
        assert_eq!(policy, CachePolicy::Public);

        let (view, _) = h.service.get_result(id, Some(&h.owner)).await.unwrap();
        assert!(matches!(view.result, Some(ResultView::Full(_))));
    }

    #[tokio::test]
    async fn test_incomplete_analysis_is_not_cached() {
        let h = harness();
        let id = h.seed(analysis_fixture(h.owner.account_id, Tier::Paid));
        let (view, policy) = h.service.get_result(id, Some(&h.owner)).await.unwrap();
        assert!(view.result.is_none());
        assert_eq!(policy, CachePolicy::NoStore);
    }

    #[tokio::test]
    async fn test_share_is_idempotent_and_paid_only() {
        let h = harness();
        let paid = h.seed(completed_analysis(h.owner.account_id, Tier::Paid));
        let free = h.seed(completed_analysis(h.owner.account_id, Tier::Free));

        let first = h.service.share(paid, &h.owner).await.unwrap();
        let second = h.service.share(paid, &h.owner).await.unwrap();
        assert_eq!(first, second);

        let err = h.service.share(free, &h.owner).await.unwrap_err();
        assert!(matches!(err, AppError::TierNotEligible(_)));
        assert!(h.store.analysis(free).unwrap().share_token.is_none());

        let err = h.service.share(paid, &h.stranger).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let (view, policy) = h.service.get_shared(&first).await.unwrap();
        assert_eq!(view.id, paid);
        assert_eq!(view.access, ResultAccess::Full);
        assert!(view.share_token.is_none());
        assert_eq!(policy, CachePolicy::Public);
    }

    #[tokio::test]
    async fn test_moderation_flow() {
        let h = harness();
        let approved = h.seed(completed_analysis(h.owner.account_id, Tier::Free));
        let rejected = h.seed(completed_analysis(h.owner.account_id, Tier::Free));

        let queue = h.service.moderation_queue(&h.admin, 50).await.unwrap();
        assert_eq!(queue.len(), 2);
        assert!(h.service.moderation_queue(&h.owner, 50).await.is_err());

        let view = h.service.approve(approved, &h.admin).await.unwrap();
        assert_eq!(view.visibility, Visibility::Public);
        assert!(h.service.approve(approved, &h.admin).await.is_err());

        assert!(matches!(
            h.service.reject(rejected, &h.admin, "   ").await,
            Err(AppError::Validation(_))
        ));
        let view = h.service.reject(rejected, &h.admin, "Not a logo").await.unwrap();
        assert_eq!(view.visibility, Visibility::Rejected);
        assert_eq!(view.rejection_reason.as_deref(), Some("Not a logo"));

        // Rejection reasons are only for the owner and admins.
        let mut public = completed_analysis(h.owner.account_id, Tier::Paid);
        public.visibility = Visibility::Public;
        public.rejection_reason = Some("old".to_string());
        let public = h.seed(public);
        let (view, _) = h.service.get_result(public, Some(&h.stranger)).await.unwrap();
        assert!(view.rejection_reason.is_none());
    }

    #[tokio::test]
    async fn test_pending_analysis_cannot_be_approved() {
        let h = harness();
        let id = h.seed(analysis_fixture(h.owner.account_id, Tier::Free));
        assert!(matches!(
            h.service.approve(id, &h.admin).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_owner_visibility_toggle() {
        let h = harness();
        let paid = h.seed(completed_analysis(h.owner.account_id, Tier::Paid));
        let free = h.seed(completed_analysis(h.owner.account_id, Tier::Free));

        let view = h
            .service
            .set_visibility(paid, &h.owner, Visibility::Public)
            .await
            .unwrap();
        assert_eq!(view.visibility, Visibility::Public);
        let view = h
            .service
            .set_visibility(paid, &h.owner, Visibility::Private)
            .await
            .unwrap();
        assert_eq!(view.visibility, Visibility::Private);

        assert!(matches!(
            h.service.set_visibility(free, &h.owner, Visibility::Public).await,
            Err(AppError::TierNotEligible(_))
        ));
        assert!(matches!(
            h.service.set_visibility(paid, &h.owner, Visibility::Rejected).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            h.service.set_visibility(paid, &h.stranger, Visibility::Public).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_soft_deleted_is_only_visible_to_admins() {
        let h = harness();
        let id = h.seed(completed_analysis(h.owner.account_id, Tier::Paid));

        h.service.delete(id, &h.owner).await.unwrap();

        let err = h.service.get_result(id, Some(&h.owner)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(h.service.get_result(id, Some(&h.admin)).await.is_ok());
        assert!(h.service.list_own(&h.owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restart_only_from_failed() {
        let h = harness();
        let mut failed = analysis_fixture(h.owner.account_id, Tier::Paid);
        failed.status = AnalysisStatus::Failed;
        failed.failure_reason = Some("Visual description failed".to_string());
        let failed = h.seed(failed);
        let completed = h.seed(completed_analysis(h.owner.account_id, Tier::Paid));

        let view = h.service.restart(failed, &h.owner).await.unwrap();
        assert_eq!(view.status, AnalysisStatus::Pending);
        assert!(view.failure_reason.is_none());

        assert!(matches!(
            h.service.restart(completed, &h.owner).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_weekly_feature_is_admin_only() {
        let h = harness();
        let id = h.seed(completed_analysis(h.owner.account_id, Tier::Paid));

        assert!(h.service.set_weekly_featured(id, &h.owner, true).await.is_err());
        let view = h.service.set_weekly_featured(id, &h.admin, true).await.unwrap();
        assert!(view.weekly_featured);
    }
}
