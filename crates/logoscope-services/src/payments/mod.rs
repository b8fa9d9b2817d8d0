//! Payment provider integration
//!
//! The checkout orchestrator talks to the provider through [`PaymentGateway`]; webhook
//! deliveries come back through [`signature`] and [`event`].

pub mod event;
pub mod signature;
pub mod stripe;

use async_trait::async_trait;
use logoscope_core::{AppError, Tier};
use uuid::Uuid;

pub use event::{CompletedCheckout, PaymentEvent, CHECKOUT_COMPLETED};
pub use signature::{sign_payload, verify_signature};

/// Everything the provider needs to open a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub staging_id: Uuid,
    pub tier: Tier,
    pub email: String,
    pub amount_cents: i64,
    pub currency: String,
    pub product_name: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionRequest {
    /// Derived only from the correlation metadata, so retries of the same checkout
    /// resolve to the same provider session.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.staging_id, self.tier.as_str())
    }
}

/// A checkout session opened at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, AppError>;
}
