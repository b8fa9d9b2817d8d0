//! Health check and OpenAPI document tests.
//!
//! Run with: `cargo test -p logoscope-api --test health_test`

mod helpers;

use helpers::setup_test_app;
use serde_json::Value;

#[tokio::test]
async fn test_health_without_database() {
    let app = setup_test_app();

    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["database"], "not_configured");
    assert_eq!(body["storage"], "healthy");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = setup_test_app();

    let response = app.client().get("/api/openapi.json").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["info"]["title"], "Logoscope API");
    assert!(body["paths"]["/api/v0/webhooks/payments"].is_object());
}
