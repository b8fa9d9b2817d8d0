//! Application state and sub-state extractors.
//!
//! Handlers extract only the slice they need through `FromRef`; every service inside
//! is cheap to clone (trait objects behind `Arc`).

use axum::extract::FromRef;
use logoscope_services::{
    AuthService, CheckoutService, ClaimService, CurationService, PipelineRunner,
    ReconciliationService, ResultService, StagingService,
};
use logoscope_storage::Storage;
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Intake: staging uploads, paid checkout and free claims.
#[derive(Clone)]
pub struct SubmissionState {
    pub staging: StagingService,
    pub checkout: CheckoutService,
    pub claims: ClaimService,
}

/// Result projection, lifecycle actions and the pipeline runner.
#[derive(Clone)]
pub struct AnalysisState {
    pub results: ResultService,
    pub pipeline: PipelineRunner,
}

#[derive(Clone)]
pub struct PaymentState {
    pub reconciliation: ReconciliationService,
}

#[derive(Clone)]
pub struct CurationState {
    pub curation: CurationService,
}

/// Session token resolution for the auth middleware and the sign-in handlers.
#[derive(Clone)]
pub struct AuthState {
    pub auth: AuthService,
}

#[derive(Clone)]
pub struct HealthState {
    /// `None` when running without Postgres (integration tests)
    pub pool: Option<PgPool>,
    pub storage: Arc<dyn Storage>,
}

/// Main application state: aggregates sub-states for dependency injection.
#[derive(Clone)]
pub struct AppState {
    pub submissions: SubmissionState,
    pub analyses: AnalysisState,
    pub payments: PaymentState,
    pub curation: CurationState,
    pub auth: AuthState,
    pub health: HealthState,
    /// Fired on shutdown to stop background tasks such as the staging sweeper
    pub shutdown: CancellationToken,
}

/// Each handler extracts the slice of [`AppState`] it needs.
macro_rules! sub_state {
    ($($field:ident => $ty:ty),+ $(,)?) => {
        $(
            impl FromRef<Arc<AppState>> for $ty {
                fn from_ref(state: &Arc<AppState>) -> Self {
                    state.$field.clone()
                }
            }
        )+
    };
}

sub_state! {
    submissions => SubmissionState,
    analyses => AnalysisState,
    payments => PaymentState,
    curation => CurationState,
    auth => AuthState,
    health => HealthState,
}

const _: fn() = || {
    fn shared_across_tasks<T: Send + Sync + 'static>() {}
    shared_across_tasks::<AppState>();
};
