//! Moderation and curation integration tests.
//!
//! Run with: `cargo test -p logoscope-api --test admin_test`

mod helpers;

use helpers::{api_path, completed, setup_test_app};
use logoscope_core::{Tier, Visibility};
use serde_json::{json, Value};

#[tokio::test]
async fn test_admin_approves_and_rejects_free_analyses() {
    let app = setup_test_app();
    let (_, admin) = app.sign_in("admin@example.com", true);
    let (_, first) = completed(&app, Tier::Free);
    let (_, second) = completed(&app, Tier::Free);

    let response = app
        .client()
        .get(&api_path("/admin/moderation?limit=500"))
        .add_header("Authorization", admin.clone())
        .await;
    assert_eq!(response.status_code(), 200);
    let queue: Vec<Value> = response.json();
    assert_eq!(queue.len(), 2);

    let response = app
        .client()
        .post(&api_path(&format!("/admin/analyses/{}/approve", first.id)))
        .add_header("Authorization", admin.clone())
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(app.store.analysis(first.id).unwrap().visibility, Visibility::Public);

    let response = app
        .client()
        .post(&api_path(&format!("/admin/analyses/{}/reject", second.id)))
        .add_header("Authorization", admin.clone())
        .json(&json!({ "reason": "Not a logo" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let stored = app.store.analysis(second.id).unwrap();
    assert_eq!(stored.visibility, Visibility::Rejected);
    assert_eq!(stored.rejection_reason.as_deref(), Some("Not a logo"));

    // Decisions are final.
    let response = app
        .client()
        .post(&api_path(&format!("/admin/analyses/{}/approve", second.id)))
        .add_header("Authorization", admin)
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = setup_test_app();
    let (_, member) = app.sign_in("member@example.com", false);
    let (_, analysis) = completed(&app, Tier::Free);

    let response = app
        .client()
        .post(&api_path(&format!("/admin/analyses/{}/approve", analysis.id)))
        .add_header("Authorization", member.clone())
        .await;
    assert_eq!(response.status_code(), 403);

    let response = app
        .client()
        .put(&api_path("/admin/curation"))
        .add_header("Authorization", member)
        .json(&json!({ "home_ids": [analysis.id], "gallery_ids": [] }))
        .await;
    assert_eq!(response.status_code(), 403);
    assert_eq!(
        app.store.analysis(analysis.id).unwrap().visibility,
        Visibility::PendingApproval
    );
}

#[tokio::test]
async fn test_curation_replace_and_public_listing() {
    let app = setup_test_app();
    let (_, admin) = app.sign_in("admin@example.com", true);
    let (_, home) = completed(&app, Tier::Premium);
    let (_, gallery_a) = completed(&app, Tier::Paid);
    let (_, gallery_b) = completed(&app, Tier::Paid);

    let response = app
        .client()
        .put(&api_path("/admin/curation"))
        .add_header("Authorization", admin.clone())
        .json(&json!({
            "home_ids": [home.id],
            "gallery_ids": [gallery_a.id, gallery_b.id]
        }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["home_ids"], json!([home.id]));
    assert_eq!(body["gallery_ids"], json!([gallery_a.id, gallery_b.id]));

    let response = app.client().get(&api_path("/curation/gallery")).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("cache-control"), "public, max-age=300");
    let entries: Vec<Value> = response.json();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["analysis_id"], gallery_a.id.to_string());
    assert_eq!(entries[1]["analysis_id"], gallery_b.id.to_string());

    // Over capacity leaves the previous assignment in place.
    let (_, extra) = completed(&app, Tier::Paid);
    let response = app
        .client()
        .put(&api_path("/admin/curation"))
        .add_header("Authorization", admin)
        .json(&json!({
            "home_ids": [home.id, gallery_a.id, gallery_b.id, extra.id],
            "gallery_ids": []
        }))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = app.client().get(&api_path("/curation/home")).await;
    let entries: Vec<Value> = response.json();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["analysis_id"], home.id.to_string());

    let unknown = app.client().get(&api_path("/curation/sidebar")).await;
    assert_eq!(unknown.status_code(), 400);
}

#[tokio::test]
async fn test_weekly_featured_flag() {
    let app = setup_test_app();
    let (_, admin) = app.sign_in("admin@example.com", true);
    let (_, analysis) = completed(&app, Tier::Premium);

    let response = app
        .client()
        .put(&api_path(&format!("/admin/analyses/{}/weekly", analysis.id)))
        .add_header("Authorization", admin)
        .json(&json!({ "featured": true }))
        .await;
    assert_eq!(response.status_code(), 200);
    let view: Value = response.json();
    assert_eq!(view["weekly_featured"], true);
    assert!(app.store.analysis(analysis.id).unwrap().weekly_featured);
}
