//! Service initialization
//!
//! Production wiring builds Postgres repositories and real provider clients, then hands
//! everything to [`build_state`], which tests call directly with in-memory stores.

use crate::constants::{ASSET_URL_TTL_SECS, PAYMENT_HTTP_TIMEOUT_SECS};
use crate::state::{
    AnalysisState, AppState, AuthState, CurationState, HealthState, PaymentState,
    SubmissionState,
};
use anyhow::{Context, Result};
use chrono::Duration as ChronoDuration;
use logoscope_core::Config;
use logoscope_db::{
    AccountRepository, AccountStore, AnalysisRepository, AnalysisStore, CurationRepository,
    CurationStore, StagingRepository, StagingStore,
};
use logoscope_services::{
    AuthService, CheckoutService, ClaimService, ClaudeProvider, ContentProvider,
    CurationService, EmailNotifier, LogNotifier, Notifier, PaymentGateway, PipelineRunner,
    PipelineSettings, ReconcileDeps, ReconcileSettings, ReconciliationService, ResultService,
    StagingPolicy, StagingService, StripeGateway, TokenService,
};
use logoscope_storage::StoragePair;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Persistence, storage and outbound clients the services are built from.
pub struct Collaborators {
    pub accounts: Arc<dyn AccountStore>,
    pub staging: Arc<dyn StagingStore>,
    pub analyses: Arc<dyn AnalysisStore>,
    pub curation: Arc<dyn CurationStore>,
    pub storage: StoragePair,
    pub gateway: Arc<dyn PaymentGateway>,
    pub provider: Arc<dyn ContentProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub tokens: Arc<TokenService>,
    pub pool: Option<PgPool>,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub staging: StagingPolicy,
    pub frontend_url: String,
    pub asset_url_ttl: Duration,
    pub reconcile: ReconcileSettings,
    pub pipeline: PipelineSettings,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            staging: StagingPolicy::from_config(config),
            frontend_url: config.frontend_url().to_string(),
            asset_url_ttl: Duration::from_secs(ASSET_URL_TTL_SECS),
            reconcile: ReconcileSettings::from_config(config),
            pipeline: PipelineSettings::from_config(config),
        }
    }
}

/// Assemble every service and the application state from its collaborators.
pub fn build_state(deps: Collaborators, settings: ServiceSettings) -> AppState {
    let Collaborators {
        accounts,
        staging,
        analyses,
        curation,
        storage,
        gateway,
        provider,
        notifier,
        tokens,
        pool,
    } = deps;
    let cooldown: ChronoDuration = settings.staging.free_tier_cooldown;

    let results = ResultService::new(
        analyses.clone(),
        storage.durable.clone(),
        settings.asset_url_ttl,
    );
    let pipeline = PipelineRunner::new(
        analyses.clone(),
        storage.durable.clone(),
        provider,
        results.clone(),
        settings.pipeline,
    );

    let submissions = SubmissionState {
        staging: StagingService::new(
            staging.clone(),
            accounts.clone(),
            storage.ephemeral.clone(),
            settings.staging,
        ),
        checkout: CheckoutService::new(staging.clone(), gateway, &settings.frontend_url),
        claims: ClaimService::new(
            accounts.clone(),
            staging.clone(),
            analyses.clone(),
            storage.ephemeral.clone(),
            storage.durable.clone(),
            cooldown,
        ),
    };

    let reconciliation = ReconciliationService::new(
        ReconcileDeps {
            accounts: accounts.clone(),
            staging,
            analyses: analyses.clone(),
            ephemeral: storage.ephemeral.clone(),
            durable: storage.durable.clone(),
            notifier: notifier.clone(),
            tokens: tokens.clone(),
        },
        settings.reconcile,
    );

    let curation = CurationService::new(
        curation,
        analyses,
        storage.durable.clone(),
        settings.asset_url_ttl,
    );

    AppState {
        submissions,
        analyses: AnalysisState { results, pipeline },
        payments: PaymentState { reconciliation },
        curation: CurationState { curation },
        auth: AuthState {
            auth: AuthService::new(accounts, tokens, notifier),
        },
        health: HealthState {
            pool,
            storage: storage.durable,
        },
        shutdown: CancellationToken::new(),
    }
}

fn setup_notifier(config: &Config) -> Arc<dyn Notifier> {
    match EmailNotifier::from_config(config) {
        Some(email) => {
            tracing::info!("Email notifications enabled");
            Arc::new(email)
        }
        None => {
            tracing::info!("Email notifications disabled; messages will be logged");
            Arc::new(LogNotifier)
        }
    }
}

fn setup_gateway(config: &Config) -> Result<Arc<dyn PaymentGateway>> {
    let secret_key = match config.stripe_secret_key() {
        Some(key) => key,
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set; checkout sessions will fail");
            ""
        }
    };
    let gateway = StripeGateway::new(
        config.stripe_api_base(),
        secret_key,
        Duration::from_secs(PAYMENT_HTTP_TIMEOUT_SECS),
    )
    .context("Failed to initialize payment gateway")?;
    Ok(Arc::new(gateway))
}

/// Initialize all services and start background tasks
pub async fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: StoragePair,
) -> Result<Arc<AppState>> {
    tracing::info!("Initializing repositories and services...");

    let provider = ClaudeProvider::from_config(config)
        .context("Failed to initialize analysis provider")?;

    let deps = Collaborators {
        accounts: Arc::new(AccountRepository::new(pool.clone())),
        staging: Arc::new(StagingRepository::new(pool.clone())),
        analyses: Arc::new(AnalysisRepository::new(pool.clone())),
        curation: Arc::new(CurationRepository::new(pool.clone())),
        storage,
        gateway: setup_gateway(config)?,
        provider: Arc::new(provider),
        notifier: setup_notifier(config),
        tokens: Arc::new(TokenService::from_config(config)),
        pool: Some(pool),
    };

    let state = build_state(deps, ServiceSettings::from_config(config));

    let sweep_interval = Duration::from_secs(config.staging_sweep_interval_secs().max(1));
    Arc::new(state.submissions.staging.clone())
        .start_sweeper(sweep_interval, state.shutdown.child_token());
    tracing::info!(
        interval_secs = sweep_interval.as_secs(),
        "Staging sweeper started"
    );

    Ok(Arc::new(state))
}
