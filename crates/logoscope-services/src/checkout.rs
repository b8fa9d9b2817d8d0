//! Tiered checkout orchestrator
//!
//! Opens a provider checkout session for a staged submission. The session metadata
//! carries `{staging_id, tier}` verbatim; it is the only thing the webhook uses to find
//! its way back, so nothing mutable goes into it.

use chrono::Utc;
use logoscope_core::{normalize_email, AppError, Tier};
use logoscope_db::StagingStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::payments::{CheckoutSessionRequest, PaymentGateway};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutRedirect {
    pub redirect_url: String,
    pub session_id: String,
}

#[derive(Clone)]
pub struct CheckoutService {
    staging: Arc<dyn StagingStore>,
    gateway: Arc<dyn PaymentGateway>,
    frontend_url: String,
}

impl CheckoutService {
    pub fn new(
        staging: Arc<dyn StagingStore>,
        gateway: Arc<dyn PaymentGateway>,
        frontend_url: &str,
    ) -> Self {
        Self {
            staging,
            gateway,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    #[tracing::instrument(skip(self, email), fields(tier = %tier))]
    pub async fn create_checkout(
        &self,
        staging_id: Uuid,
        tier: Tier,
        email: &str,
    ) -> Result<CheckoutRedirect, AppError> {
        if !tier.is_payable() {
            return Err(AppError::InvalidTier(format!(
                "Tier '{}' cannot be purchased",
                tier
            )));
        }

        let email = normalize_email(email);
        email
            .parse::<lettre::Address>()
            .map_err(|_| AppError::Validation("email is not a valid address".to_string()))?;

        let staged = self
            .staging
            .get(staging_id)
            .await?
            .filter(|s| !s.is_expired(Utc::now()))
            .ok_or_else(|| AppError::NotFound("Staged submission not found".to_string()))?;

        if staged.tier != tier {
            return Err(AppError::Validation(format!(
                "Submission was staged for the {} tier",
                staged.tier
            )));
        }

        let info = tier.info();
        let request = CheckoutSessionRequest {
            staging_id,
            tier,
            email,
            amount_cents: info.price_cents,
            currency: info.currency.to_string(),
            product_name: format!("{}: {}", info.label, staged.display.name),
            success_url: format!(
                "{}/checkout/success?staging_id={}",
                self.frontend_url, staging_id
            ),
            cancel_url: format!(
                "{}/checkout/cancel?staging_id={}",
                self.frontend_url, staging_id
            ),
        };

        let session = self.gateway.create_checkout_session(&request).await?;

        tracing::info!(
            staging_id = %staging_id,
            session_id = %session.id,
            amount_cents = info.price_cents,
            "Checkout session created"
        );

        Ok(CheckoutRedirect {
            redirect_url: session.url,
            session_id: session.id,
        })
    }
}
