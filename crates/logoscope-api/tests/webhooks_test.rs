//! Payment webhook integration tests.
//!
//! Run with: `cargo test -p logoscope-api --test webhooks_test`

mod helpers;

use chrono::Utc;
use helpers::{api_path, setup_test_app, TestApp, WEBHOOK_SECRET};
use logoscope_core::{StagedSubmission, Tier};
use logoscope_db::StagingStore;
use logoscope_services::payments::sign_payload;
use logoscope_services::test_helpers::{png_bytes, staged_submission};
use serde_json::{json, Value};

async fn stage(app: &TestApp, tier: Tier) -> StagedSubmission {
    let staged = staged_submission(tier);
    app.ephemeral.put(&staged.asset_key, png_bytes());
    app.store.insert(&staged).await.unwrap();
    staged
}

fn completed_event(staged: &StagedSubmission, email: &str) -> String {
    json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": "cs_test_1",
            "metadata": {"staging_id": staged.id.to_string(), "tier": staged.tier.to_string()},
            "customer_details": {"email": email, "name": "Pat Buyer"},
            "payment_intent": "pi_1",
            "amount_total": 1900
        }}
    })
    .to_string()
}

fn signature(payload: &str) -> String {
    sign_payload(payload.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp()).unwrap()
}

#[tokio::test]
async fn test_duplicate_delivery_creates_one_analysis() {
    let app = setup_test_app();
    let staged = stage(&app, Tier::Paid).await;
    let payload = completed_event(&staged, "buyer@example.com");

    let first = app
        .client()
        .post(&api_path("/webhooks/payments"))
        .add_header("Stripe-Signature", signature(&payload))
        .add_header("Content-Type", "application/json")
        .text(payload.clone())
        .await;
    assert_eq!(first.status_code(), 200);
    let body: Value = first.json();
    assert_eq!(body["outcome"], "processed");

    let second = app
        .client()
        .post(&api_path("/webhooks/payments"))
        .add_header("Stripe-Signature", signature(&payload))
        .add_header("Content-Type", "application/json")
        .text(payload)
        .await;
    assert_eq!(second.status_code(), 200);
    let body: Value = second.json();
    assert_eq!(body["outcome"], "already_processed");

    assert_eq!(app.store.analysis_count(), 1);
    assert_eq!(app.store.account_count(), 1);
    assert_eq!(app.notifier.sent().len(), 1);
    let analysis = app.store.analysis(staged.id).expect("analysis created");
    assert_eq!(analysis.tier, Tier::Paid);
}

#[tokio::test]
async fn test_bad_signature_is_rejected() {
    let app = setup_test_app();
    let staged = stage(&app, Tier::Premium).await;
    let payload = completed_event(&staged, "buyer@example.com");

    let forged = sign_payload(payload.as_bytes(), "whsec_other", Utc::now().timestamp()).unwrap();
    let response = app
        .client()
        .post(&api_path("/webhooks/payments"))
        .add_header("Stripe-Signature", forged)
        .text(payload.clone())
        .await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_SIGNATURE");

    let response = app
        .client()
        .post(&api_path("/webhooks/payments"))
        .text(payload)
        .await;
    assert_eq!(response.status_code(), 400);

    assert_eq!(app.store.analysis_count(), 0);
    assert!(app.store.staged(staged.id).is_some());
}

#[tokio::test]
async fn test_unrelated_event_is_acknowledged() {
    let app = setup_test_app();
    let payload = json!({
        "id": "evt_2",
        "type": "customer.created",
        "data": {"object": {"id": "cus_1"}}
    })
    .to_string();

    let response = app
        .client()
        .post(&api_path("/webhooks/payments"))
        .add_header("Stripe-Signature", signature(&payload))
        .text(payload)
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["outcome"], "ignored");
}

#[tokio::test]
async fn test_missing_staging_is_acknowledged() {
    let app = setup_test_app();
    let staged = staged_submission(Tier::Paid);
    let payload = completed_event(&staged, "buyer@example.com");

    let response = app
        .client()
        .post(&api_path("/webhooks/payments"))
        .add_header("Stripe-Signature", signature(&payload))
        .text(payload)
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["outcome"], "staging_gone");
    assert_eq!(app.store.analysis_count(), 0);
}
