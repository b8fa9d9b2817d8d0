//! Payment webhook reconciliation
//!
//! Deliveries are at-least-once, so every step is safe to repeat:
//!
//! 1. verify the signature (hard stop)
//! 2. ignore everything but `checkout.session.completed`
//! 3. extract `{staging_id, tier, email}`; missing data is acknowledged, not retried
//! 4. find or create the payer's account by case-folded email
//! 5. short-circuit when an analysis already carries the staging id
//! 6. promote the staged asset to durable storage (overwrite-safe)
//! 7. insert the analysis with `ON CONFLICT DO NOTHING`; this is the commit point
//! 8. notify the payer (best effort)
//! 9. delete the staging row and its asset (best effort)
//!
//! Errors from steps 4 to 7 propagate so the provider redelivers.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use logoscope_core::{
    AppError, Config, CreationChannel, NewAnalysis, PaymentCorrelation, Tier, Visibility,
};
use logoscope_db::{AccountStore, AnalysisStore, StagingStore};
use logoscope_storage::{keys, promote, Storage};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::TokenService;
use crate::notify::{Notification, Notifier};
use crate::payments::{verify_signature, CompletedCheckout, PaymentEvent};
use crate::results::generate_share_token;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Processed {
        analysis_id: Uuid,
        account_id: Uuid,
        new_account: bool,
    },
    AlreadyProcessed {
        analysis_id: Uuid,
    },
    Ignored {
        event_type: String,
    },
    MissingMetadata {
        missing: Vec<&'static str>,
    },
    StagingGone {
        staging_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub webhook_secret: Option<String>,
    pub tolerance_secs: i64,
    /// Assets up to this size also get a base64 copy on the analysis row
    pub inline_asset_max_bytes: usize,
}

impl ReconcileSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            webhook_secret: config.stripe_webhook_secret().map(String::from),
            tolerance_secs: config.payment_webhook_tolerance_secs(),
            inline_asset_max_bytes: config.inline_asset_max_bytes(),
        }
    }
}

/// Collaborators the reconciliation steps touch.
#[derive(Clone)]
pub struct ReconcileDeps {
    pub accounts: Arc<dyn AccountStore>,
    pub staging: Arc<dyn StagingStore>,
    pub analyses: Arc<dyn AnalysisStore>,
    pub ephemeral: Arc<dyn Storage>,
    pub durable: Arc<dyn Storage>,
    pub notifier: Arc<dyn Notifier>,
    pub tokens: Arc<TokenService>,
}

#[derive(Clone)]
pub struct ReconciliationService {
    deps: ReconcileDeps,
    settings: ReconcileSettings,
}

struct Correlation {
    staging_id: Uuid,
    tier: Tier,
    email: String,
}

fn correlate(checkout: &CompletedCheckout) -> Result<Correlation, Vec<&'static str>> {
    let staging_id = checkout
        .staging_id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id.trim()).ok());
    let tier = checkout
        .tier
        .as_deref()
        .and_then(|tier| tier.parse::<Tier>().ok())
        .filter(|tier| tier.is_payable());
    let email = checkout.email.clone();

    match (staging_id, tier, email) {
        (Some(staging_id), Some(tier), Some(email)) => Ok(Correlation {
            staging_id,
            tier,
            email,
        }),
        (staging_id, tier, email) => {
            let mut missing = Vec::new();
            if staging_id.is_none() {
                missing.push("staging_id");
            }
            if tier.is_none() {
                missing.push("tier");
            }
            if email.is_none() {
                missing.push("email");
            }
            Err(missing)
        }
    }
}

impl ReconciliationService {
    pub fn new(deps: ReconcileDeps, settings: ReconcileSettings) -> Self {
        Self { deps, settings }
    }

    /// Handle one webhook delivery.
    #[tracing::instrument(skip(self, payload, signature), fields(size = payload.len()))]
    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<ReconcileOutcome, AppError> {
        let secret = self
            .settings
            .webhook_secret
            .as_deref()
            .ok_or_else(|| AppError::Internal("Payment webhook secret is not configured".to_string()))?;
        let signature = signature
            .ok_or_else(|| AppError::InvalidSignature("Missing signature header".to_string()))?;
        verify_signature(
            payload,
            signature,
            secret,
            self.settings.tolerance_secs,
            Utc::now().timestamp(),
        )?;

        let event = PaymentEvent::parse(payload)?;
        let Some(checkout) = event.completed_checkout()? else {
            tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring payment event");
            return Ok(ReconcileOutcome::Ignored {
                event_type: event.event_type,
            });
        };

        let correlation = match correlate(&checkout) {
            Ok(correlation) => correlation,
            Err(missing) => {
                let err = AppError::MissingMetadata(missing.clone());
                tracing::warn!(event_id = %event.id, session_id = %checkout.session_id, error = %err, "Acknowledging event without correlation metadata");
                return Ok(ReconcileOutcome::MissingMetadata { missing });
            }
        };

        self.process(&event.id, &checkout, correlation).await
    }

    async fn process(
        &self,
        event_id: &str,
        checkout: &CompletedCheckout,
        correlation: Correlation,
    ) -> Result<ReconcileOutcome, AppError> {
        let deps = &self.deps;
        let Correlation {
            staging_id,
            tier,
            email,
        } = correlation;

        let resolved = deps
            .accounts
            .find_or_create(&email, checkout.customer_name.as_deref(), CreationChannel::Payment)
            .await?;
        let account = resolved.account;

        if deps.analyses.get(staging_id).await?.is_some() {
            tracing::info!(event_id, staging_id = %staging_id, "Checkout already reconciled");
            return Ok(ReconcileOutcome::AlreadyProcessed {
                analysis_id: staging_id,
            });
        }

        let Some(staged) = deps.staging.get(staging_id).await? else {
            tracing::error!(
                event_id,
                staging_id = %staging_id,
                session_id = %checkout.session_id,
                "Paid checkout references a staged submission that no longer exists"
            );
            return Ok(ReconcileOutcome::StagingGone { staging_id });
        };
        if staged.tier != tier {
            tracing::warn!(
                staging_id = %staging_id,
                staged_tier = %staged.tier,
                paid_tier = %tier,
                "Paid tier differs from staged tier; using the paid tier"
            );
        }

        let asset_key = keys::analysis_key(account.id, staging_id, staged.extension());
        let data = promote(
            deps.ephemeral.as_ref(),
            &staged.asset_key,
            deps.durable.as_ref(),
            &asset_key,
            &staged.content_type,
        )
        .await?;
        let inline_asset = (data.len() <= self.settings.inline_asset_max_bytes)
            .then(|| STANDARD.encode(&data));

        let new = NewAnalysis {
            id: staging_id,
            account_id: account.id,
            tier,
            visibility: Visibility::initial_for(tier),
            display: staged.display.clone(),
            asset_key,
            content_type: staged.content_type.clone(),
            inline_asset,
            share_token: Some(generate_share_token()),
            payment: PaymentCorrelation {
                session_id: Some(checkout.session_id.clone()),
                payment_intent_id: checkout.payment_intent_id.clone(),
                amount_total_cents: checkout.amount_total_cents,
            },
        };

        if !deps.analyses.insert_if_absent(&new).await? {
            tracing::info!(event_id, staging_id = %staging_id, "Lost insert race to a concurrent delivery");
            return Ok(ReconcileOutcome::AlreadyProcessed {
                analysis_id: staging_id,
            });
        }

        tracing::info!(
            event_id,
            analysis_id = %new.id,
            account_id = %account.id,
            tier = %tier,
            new_account = resolved.created,
            "Paid analysis created"
        );

        self.notify(&account.email, account.id, &new, resolved.created)
            .await;

        match deps.staging.consume(staging_id).await {
            Ok(_) => {
                if let Err(e) = deps.ephemeral.delete(&staged.asset_key).await {
                    tracing::warn!(error = %e, staging_id = %staging_id, "Failed to delete staged asset");
                }
            }
            Err(e) => tracing::warn!(error = %e, staging_id = %staging_id, "Failed to delete staging row"),
        }

        Ok(ReconcileOutcome::Processed {
            analysis_id: new.id,
            account_id: account.id,
            new_account: resolved.created,
        })
    }

    async fn notify(&self, email: &str, account_id: Uuid, new: &NewAnalysis, new_account: bool) {
        let sign_in_link = if new_account {
            match self.deps.tokens.sign_in_link(account_id) {
                Ok(link) => Some(link),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to issue sign-in link");
                    None
                }
            }
        } else {
            None
        };

        let notification = Notification::AnalysisReady {
            email: email.to_string(),
            analysis_id: new.id,
            display_name: new.display.name.clone(),
            sign_in_link,
        };
        if let Err(e) = self.deps.notifier.send(&notification).await {
            tracing::warn!(error = %e, analysis_id = %new.id, "Failed to send analysis notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::sign_payload;
    use crate::test_helpers::{png_bytes, staged_submission, tokens, MemoryStorage, RecordingNotifier};
    use logoscope_core::AnalysisStatus;
    use logoscope_db::test_helpers::InMemoryStore;
    use serde_json::json;

    const SECRET: &str = "whsec_test";

    struct Harness {
        store: InMemoryStore,
        ephemeral: MemoryStorage,
        durable: MemoryStorage,
        notifier: RecordingNotifier,
        service: ReconciliationService,
    }

    fn harness() -> Harness {
        let store = InMemoryStore::new();
        let ephemeral = MemoryStorage::new();
        let durable = MemoryStorage::new();
        let notifier = RecordingNotifier::new();
        let deps = ReconcileDeps {
            accounts: Arc::new(store.clone()),
            staging: Arc::new(store.clone()),
            analyses: Arc::new(store.clone()),
            ephemeral: Arc::new(ephemeral.clone()),
            durable: Arc::new(durable.clone()),
            notifier: Arc::new(notifier.clone()),
            tokens: tokens(),
        };
        let service = ReconciliationService::new(
            deps,
            ReconcileSettings {
                webhook_secret: Some(SECRET.to_string()),
                tolerance_secs: 300,
                inline_asset_max_bytes: 1024,
            },
        );
        Harness {
            store,
            ephemeral,
            durable,
            notifier,
            service,
        }
    }

    impl Harness {
        async fn stage(&self, tier: Tier) -> logoscope_core::StagedSubmission {
            let staged = staged_submission(tier);
            self.ephemeral.put(&staged.asset_key, png_bytes());
            self.store.insert(&staged).await.unwrap();
            staged
        }
    }

    fn completed_event(metadata: serde_json::Value, email: Option<&str>) -> Vec<u8> {
        json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {
                "id": "cs_test_1",
                "metadata": metadata,
                "customer_details": {"email": email, "name": "Pat Buyer"},
                "payment_intent": "pi_1",
                "amount_total": 1900
            }}
        })
        .to_string()
        .into_bytes()
    }

    fn signed(payload: &[u8]) -> String {
        sign_payload(payload, SECRET, Utc::now().timestamp()).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_delivery_creates_one_analysis() {
        let h = harness();
        let staged = h.stage(Tier::Paid).await;
        let payload = completed_event(
            json!({"staging_id": staged.id.to_string(), "tier": "paid"}),
            Some("Buyer@Example.com"),
        );

        let first = h.service.handle(&payload, Some(&signed(&payload))).await.unwrap();
        let ReconcileOutcome::Processed {
            analysis_id,
            account_id,
            new_account,
        } = first.clone()
        else {
            panic!("expected processed, got {:?}", first);
        };
        assert!(new_account);
        assert_eq!(analysis_id, staged.id);

        let second = h.service.handle(&payload, Some(&signed(&payload))).await.unwrap();
        assert_eq!(second, ReconcileOutcome::AlreadyProcessed { analysis_id });

        assert_eq!(h.store.analysis_count(), 1);
        assert_eq!(h.store.account_count(), 1);
        assert_eq!(h.durable.len(), 1);
        assert_eq!(h.notifier.sent().len(), 1);
        assert_eq!(h.store.staging_count(), 0);
        assert!(!h.ephemeral.contains(&staged.asset_key));

        let analysis = h.store.analysis(analysis_id).unwrap();
        assert_eq!(analysis.account_id, account_id);
        assert_eq!(analysis.status, AnalysisStatus::Pending);
        assert_eq!(analysis.visibility, Visibility::Private);
        assert_eq!(analysis.share_token.as_ref().map(|t| t.len()), Some(64));
        assert!(analysis.inline_asset.is_some());
        assert_eq!(analysis.payment.session_id.as_deref(), Some("cs_test_1"));

        let account = h.store.account(account_id).unwrap();
        assert_eq!(account.email, "buyer@example.com");
        assert_eq!(account.creation_channel, CreationChannel::Payment);
    }

    #[tokio::test]
    async fn test_new_account_gets_sign_in_link_existing_does_not() {
        let h = harness();
        h.store.seed_account("known@example.com", false);
        let staged = h.stage(Tier::Premium).await;
        let payload = completed_event(
            json!({"staging_id": staged.id.to_string(), "tier": "premium"}),
            Some("known@example.com"),
        );

        let outcome = h.service.handle(&payload, Some(&signed(&payload))).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Processed { new_account: false, .. }));

        let sent = h.notifier.sent();
        assert!(matches!(
            &sent[0],
            Notification::AnalysisReady { sign_in_link: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_bad_signature_has_no_side_effects() {
        let h = harness();
        let staged = h.stage(Tier::Paid).await;
        let payload = completed_event(
            json!({"staging_id": staged.id.to_string(), "tier": "paid"}),
            Some("buyer@example.com"),
        );
        let forged = sign_payload(&payload, "whsec_other", Utc::now().timestamp()).unwrap();

        let err = h.service.handle(&payload, Some(&forged)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature(_)));
        let err = h.service.handle(&payload, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature(_)));

        assert_eq!(h.store.account_count(), 0);
        assert_eq!(h.store.analysis_count(), 0);
        assert_eq!(h.store.staging_count(), 1);
    }

    #[tokio::test]
    async fn test_other_events_are_ignored() {
        let h = harness();
        let payload = json!({"id": "evt_9", "type": "payment_intent.created", "data": {"object": {}}})
            .to_string()
            .into_bytes();

        let outcome = h.service.handle(&payload, Some(&signed(&payload))).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Ignored {
                event_type: "payment_intent.created".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_metadata_is_acknowledged() {
        let h = harness();
        let payload = completed_event(json!({"tier": "free"}), None);

        let outcome = h.service.handle(&payload, Some(&signed(&payload))).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::MissingMetadata {
                missing: vec!["staging_id", "tier", "email"]
            }
        );
        assert_eq!(h.store.account_count(), 0);
    }

    #[tokio::test]
    async fn test_vanished_staging_is_acknowledged() {
        let h = harness();
        let staging_id = Uuid::new_v4();
        let payload = completed_event(
            json!({"staging_id": staging_id.to_string(), "tier": "paid"}),
            Some("buyer@example.com"),
        );

        let outcome = h.service.handle(&payload, Some(&signed(&payload))).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::StagingGone { staging_id });
        assert_eq!(h.store.analysis_count(), 0);
    }

    #[tokio::test]
    async fn test_promotion_failure_is_retryable() {
        let h = harness();
        let staged = h.stage(Tier::Paid).await;
        h.ephemeral.delete(&staged.asset_key).await.unwrap();
        let payload = completed_event(
            json!({"staging_id": staged.id.to_string(), "tier": "paid"}),
            Some("buyer@example.com"),
        );

        let err = h.service.handle(&payload, Some(&signed(&payload))).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(h.store.analysis_count(), 0);
        assert!(h.store.staged(staged.id).is_some());

        // Redelivery after the asset reappears succeeds.
        h.ephemeral.put(&staged.asset_key, png_bytes());
        let outcome = h.service.handle(&payload, Some(&signed(&payload))).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Processed { .. }));
    }

    #[tokio::test]
    async fn test_notification_failure_is_not_fatal() {
        let h = harness();
        h.notifier.set_failing(true);
        let staged = h.stage(Tier::Paid).await;
        let payload = completed_event(
            json!({"staging_id": staged.id.to_string(), "tier": "paid"}),
            Some("buyer@example.com"),
        );

        let outcome = h.service.handle(&payload, Some(&signed(&payload))).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Processed { .. }));
        assert_eq!(h.store.analysis_count(), 1);
    }

    #[tokio::test]
    async fn test_store_outage_is_retryable() {
        let h = harness();
        let staged = h.stage(Tier::Paid).await;
        h.store.set_unavailable(true);
        let payload = completed_event(
            json!({"staging_id": staged.id.to_string(), "tier": "paid"}),
            Some("buyer@example.com"),
        );

        let err = h.service.handle(&payload, Some(&signed(&payload))).await.unwrap_err();
        assert!(logoscope_core::ErrorMetadata::is_recoverable(&err));
    }
}
