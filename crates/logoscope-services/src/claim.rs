//! Free-tier direct linkage
//!
//! A signed-in uploader claims their staged free submission. The rolling 24h slot is
//! reserved before the staging row is consumed; every later failure hands the slot
//! back so a broken claim never costs the account its free analysis.

use chrono::{Duration as ChronoDuration, Utc};
use logoscope_core::{
    Analysis, AppError, NewAnalysis, PaymentCorrelation, Requester, StagedSubmission, Tier,
    Visibility,
};
use logoscope_db::{AccountStore, AnalysisStore, FreeSlotReservation, StagingStore};
use logoscope_storage::{keys, promote, Storage};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use uuid::Uuid;

#[derive(Clone)]
pub struct ClaimService {
    accounts: Arc<dyn AccountStore>,
    staging: Arc<dyn StagingStore>,
    analyses: Arc<dyn AnalysisStore>,
    ephemeral: Arc<dyn Storage>,
    durable: Arc<dyn Storage>,
    cooldown: ChronoDuration,
}

impl ClaimService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        staging: Arc<dyn StagingStore>,
        analyses: Arc<dyn AnalysisStore>,
        ephemeral: Arc<dyn Storage>,
        durable: Arc<dyn Storage>,
        cooldown: ChronoDuration,
    ) -> Self {
        Self {
            accounts,
            staging,
            analyses,
            ephemeral,
            durable,
            cooldown,
        }
    }

    fn check_claimable(
        staged: &StagedSubmission,
        session_token: &str,
        requester: &Requester,
    ) -> Result<(), AppError> {
        if !bool::from(staged.session_token.as_bytes().ct_eq(session_token.as_bytes())) {
            return Err(AppError::Forbidden(
                "Session token does not match this submission".to_string(),
            ));
        }
        if staged.tier != Tier::Free {
            return Err(AppError::Validation(
                "Only free submissions can be claimed directly; use checkout".to_string(),
            ));
        }
        if staged.account_id.is_some_and(|owner| owner != requester.account_id) {
            return Err(AppError::Forbidden(
                "Submission belongs to another account".to_string(),
            ));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, session_token, requester), fields(account_id = %requester.account_id))]
    pub async fn claim(
        &self,
        staging_id: Uuid,
        session_token: &str,
        requester: &Requester,
    ) -> Result<Analysis, AppError> {
        let staged = self
            .staging
            .get(staging_id)
            .await?
            .filter(|s| !s.is_expired(Utc::now()))
            .ok_or_else(|| AppError::NotFound("Staged submission not found".to_string()))?;
        Self::check_claimable(&staged, session_token, requester)?;

        let (reserved_at, previous) = match self
            .accounts
            .reserve_free_slot(requester.account_id, Utc::now(), self.cooldown)
            .await?
        {
            FreeSlotReservation::Reserved {
                reserved_at,
                previous,
            } => (reserved_at, previous),
            FreeSlotReservation::Exhausted { available_at } => {
                return Err(AppError::FreeTierLimit(format!(
                    "Free analysis available again at {}",
                    available_at.to_rfc3339()
                )));
            }
        };

        let durable_key = keys::analysis_key(requester.account_id, staged.id, staged.extension());
        match self.link(&staged, requester, &durable_key).await {
            Ok(analysis) => {
                if let Err(e) = self.ephemeral.delete(&staged.asset_key).await {
                    tracing::warn!(error = %e, staging_id = %staged.id, "Failed to delete staged asset");
                }
                tracing::info!(analysis_id = %analysis.id, "Free submission claimed");
                Ok(analysis)
            }
            Err(e) => {
                if let Err(release_err) = self
                    .accounts
                    .release_free_slot(requester.account_id, reserved_at, previous)
                    .await
                {
                    tracing::error!(error = %release_err, "Failed to release free slot");
                }
                if let Err(cleanup_err) = self.durable.delete(&durable_key).await {
                    tracing::warn!(error = %cleanup_err, "Failed to remove promoted asset");
                }
                Err(e)
            }
        }
    }

    async fn link(
        &self,
        staged: &StagedSubmission,
        requester: &Requester,
        durable_key: &str,
    ) -> Result<Analysis, AppError> {
        promote(
            self.ephemeral.as_ref(),
            &staged.asset_key,
            self.durable.as_ref(),
            durable_key,
            &staged.content_type,
        )
        .await?;

        let new = NewAnalysis {
            id: staged.id,
            account_id: requester.account_id,
            tier: Tier::Free,
            visibility: Visibility::initial_for(Tier::Free),
            display: staged.display.clone(),
            asset_key: durable_key.to_string(),
            content_type: staged.content_type.clone(),
            inline_asset: None,
            share_token: None,
            payment: PaymentCorrelation::default(),
        };

        self.analyses
            .create_from_staging(&new)
            .await?
            .ok_or_else(|| AppError::NotFound("Staged submission was already claimed".to_string()))
    }
}
