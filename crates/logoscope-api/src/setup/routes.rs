//! Route configuration and setup

use crate::auth::middleware::{auth_middleware, optional_auth_middleware};
use crate::constants::{API_PREFIX, MULTIPART_OVERHEAD_BYTES};
use crate::handlers::{
    admin, analyses, auth, checkout, curation, health, share, stream, submissions, webhooks,
};
use crate::state::{AppState, AuthState};
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Json, Router,
};
use logoscope_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    Ok(app_router(
        state,
        config.cors_origins(),
        config.max_file_size_bytes(),
    ))
}

/// The full application router. `max_upload_bytes` is the largest logo accepted; the
/// body limit adds multipart framing on top.
pub fn app_router(state: Arc<AppState>, cors_origins: &[String], max_upload_bytes: usize) -> Router {
    let auth_state = AuthState::from_ref(&state);
    let body_limit = max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let optional_auth_routes = optional_auth_routes().layer(from_fn_with_state(
        auth_state.clone(),
        optional_auth_middleware,
    ));
    let protected_routes =
        protected_routes().layer(from_fn_with_state(auth_state, auth_middleware));

    public_routes()
        .merge(optional_auth_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(setup_cors(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Setup CORS configuration
fn setup_cors(origins: &[String]) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    // Result projections differ by viewer, so caches must key on the bearer token too.
    let vary = [
        header::ORIGIN,
        header::ACCESS_CONTROL_REQUEST_METHOD,
        header::ACCESS_CONTROL_REQUEST_HEADERS,
        header::AUTHORIZATION,
    ];

    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
            .vary(vary)
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
            .vary(vary)
    }
}

/// Public routes (no authentication required)
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
        .route(
            &format!("{}/webhooks/payments", API_PREFIX),
            post(webhooks::payment_webhook),
        )
        .route(
            &format!("{}/checkout", API_PREFIX),
            post(checkout::create_checkout),
        )
        .route(
            &format!("{}/share/{{token}}", API_PREFIX),
            get(share::get_shared),
        )
        .route(
            &format!("{}/curation/{{list}}", API_PREFIX),
            get(curation::list_curation),
        )
        .route(
            &format!("{}/auth/sign-in", API_PREFIX),
            post(auth::request_sign_in),
        )
        .route(
            &format!("{}/auth/verify", API_PREFIX),
            post(auth::verify_sign_in),
        )
}

/// Routes that work anonymously but see more when a session token is sent
fn optional_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/submissions", API_PREFIX),
            post(submissions::stage_submission),
        )
        .route(
            &format!("{}/analyses/{{id}}", API_PREFIX),
            get(analyses::get_analysis),
        )
}

/// Protected routes (session token required)
fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/submissions/{{id}}/claim", API_PREFIX),
            post(submissions::claim_submission),
        )
        .route(
            &format!("{}/analyses", API_PREFIX),
            get(analyses::list_analyses),
        )
        .route(
            &format!("{}/analyses/{{id}}", API_PREFIX),
            axum::routing::delete(analyses::delete_analysis),
        )
        .route(
            &format!("{}/analyses/{{id}}/share", API_PREFIX),
            post(analyses::share_analysis),
        )
        .route(
            &format!("{}/analyses/{{id}}/visibility", API_PREFIX),
            put(analyses::set_visibility),
        )
        .route(
            &format!("{}/analyses/{{id}}/restart", API_PREFIX),
            post(analyses::restart_analysis),
        )
        .route(
            &format!("{}/analyses/{{id}}/stream", API_PREFIX),
            get(stream::stream_analysis),
        )
        // Admin
        .route(
            &format!("{}/admin/curation", API_PREFIX),
            put(admin::set_curation),
        )
        .route(
            &format!("{}/admin/moderation", API_PREFIX),
            get(admin::moderation_queue),
        )
        .route(
            &format!("{}/admin/analyses/{{id}}/approve", API_PREFIX),
            post(admin::approve_analysis),
        )
        .route(
            &format!("{}/admin/analyses/{{id}}/reject", API_PREFIX),
            post(admin::reject_analysis),
        )
        .route(
            &format!("{}/admin/analyses/{{id}}/weekly", API_PREFIX),
            put(admin::set_weekly_featured),
        )
}
