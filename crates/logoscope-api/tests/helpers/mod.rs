//! Test helpers: build AppState and router over in-memory collaborators.
//!
//! Run from workspace root: `cargo test -p logoscope-api`.

#![allow(dead_code)]

use axum_test::TestServer;
use chrono::Duration as ChronoDuration;
use logoscope_api::constants;
use logoscope_api::setup::routes::app_router;
use logoscope_api::setup::services::{build_state, Collaborators, ServiceSettings};
use logoscope_core::{Account, Analysis, Tier};
use logoscope_services::test_helpers::{
    png_bytes, tokens, FakeGateway, InMemoryStore, MemoryStorage, RecordingNotifier,
    ScriptedProvider,
};
use logoscope_services::{
    PipelineSettings, ReconcileSettings, StagingPolicy, TokenPurpose, TokenService,
};
use logoscope_services::pipeline::StageSettings;
use logoscope_storage::StoragePair;
use std::sync::Arc;
use std::time::Duration;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Test application: server plus handles on every fake it was built from.
pub struct TestApp {
    pub server: TestServer,
    pub store: InMemoryStore,
    pub ephemeral: MemoryStorage,
    pub durable: MemoryStorage,
    pub gateway: FakeGateway,
    pub notifier: RecordingNotifier,
    pub provider: ScriptedProvider,
    pub tokens: Arc<TokenService>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Seed an account and return it with a bearer header value.
    pub fn sign_in(&self, email: &str, is_admin: bool) -> (Account, String) {
        let account = self.store.seed_account(email, is_admin);
        let (token, _) = self
            .tokens
            .issue(account.id, TokenPurpose::Session)
            .expect("Failed to issue session token");
        (account, format!("Bearer {}", token))
    }

    /// Seed an analysis whose asset exists in durable storage.
    pub fn seed_analysis(&self, analysis: Analysis) -> Analysis {
        self.durable.put(&analysis.asset_key, png_bytes());
        self.store.seed_analysis(analysis.clone());
        analysis
    }
}

fn settings() -> ServiceSettings {
    ServiceSettings {
        staging: StagingPolicy {
            max_file_size_bytes: MAX_UPLOAD_BYTES,
            allowed_content_types: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/svg+xml".to_string(),
            ],
            allowed_extensions: vec!["png".to_string(), "jpg".to_string(), "svg".to_string()],
            ttl: ChronoDuration::hours(24),
            free_tier_cooldown: ChronoDuration::hours(24),
        },
        frontend_url: "https://logoscope.test".to_string(),
        asset_url_ttl: Duration::from_secs(3600),
        reconcile: ReconcileSettings {
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            tolerance_secs: 300,
            inline_asset_max_bytes: 1024,
        },
        pipeline: PipelineSettings {
            stages: StageSettings {
                call_timeout: Duration::from_secs(5),
                max_concurrent_calls: 4,
                detail_description_chars: 2000,
            },
            keepalive_interval: Duration::from_secs(15),
            stale_run_after: ChronoDuration::minutes(10),
        },
    }
}

/// Setup test app over in-memory stores and fakes.
pub fn setup_test_app() -> TestApp {
    let store = InMemoryStore::new();
    let ephemeral = MemoryStorage::new();
    let durable = MemoryStorage::new();
    let gateway = FakeGateway::new();
    let notifier = RecordingNotifier::new();
    let provider = ScriptedProvider::new();
    let tokens = tokens();

    let state = build_state(
        Collaborators {
            accounts: Arc::new(store.clone()),
            staging: Arc::new(store.clone()),
            analyses: Arc::new(store.clone()),
            curation: Arc::new(store.clone()),
            storage: StoragePair {
                ephemeral: Arc::new(ephemeral.clone()),
                durable: Arc::new(durable.clone()),
            },
            gateway: Arc::new(gateway.clone()),
            provider: Arc::new(provider.clone()),
            notifier: Arc::new(notifier.clone()),
            tokens: tokens.clone(),
            pool: None,
        },
        settings(),
    );

    let router = app_router(Arc::new(state), &["*".to_string()], MAX_UPLOAD_BYTES);
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        store,
        ephemeral,
        durable,
        gateway,
        notifier,
        provider,
        tokens,
    }
}

/// A completed analysis at `tier` owned by a fresh account.
pub fn completed(app: &TestApp, tier: Tier) -> (Account, Analysis) {
    let owner = app.store.seed_account(&format!("owner-{}@example.com", uuid::Uuid::new_v4().simple()), false);
    let analysis = app.seed_analysis(logoscope_services::test_helpers::completed_analysis(owner.id, tier));
    (owner, analysis)
}
