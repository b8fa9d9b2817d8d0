//! Logoscope Services Layer
//!
//! Business services for the submission-to-result pipeline: staging intake, checkout,
//! payment webhook reconciliation, free-tier claims, the multi-stage analysis pipeline,
//! result visibility and curation. HTTP concerns stay in `logoscope-api`; every
//! collaborator here is injected as a trait object so tests can swap in fakes.

pub mod auth;
pub mod checkout;
pub mod claim;
pub mod curation;
pub mod notify;
pub mod payments;
pub mod pipeline;
pub mod reconcile;
pub mod results;
pub mod staging;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use auth::{AuthService, SessionGrant, TokenPurpose, TokenService};
pub use checkout::{CheckoutRedirect, CheckoutService};
pub use claim::ClaimService;
pub use curation::CurationService;
pub use notify::{EmailNotifier, LogNotifier, Notification, Notifier};
pub use payments::{
    stripe::StripeGateway, CheckoutSession, CheckoutSessionRequest, PaymentGateway,
};
pub use pipeline::{
    ClaudeProvider, ContentProvider, PipelineEvent, PipelineRun, PipelineRunner,
    PipelineSettings,
};
pub use reconcile::{
    ReconcileDeps, ReconcileOutcome, ReconcileSettings, ReconciliationService,
};
pub use results::{generate_share_token, CachePolicy, ResultService};
pub use staging::{StageRequest, StagingPolicy, StagingService};
