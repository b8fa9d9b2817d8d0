//! OpenAPI documentation.
//! Versioned paths are annotated with the literal `/api/v0` prefix (`crate::constants::API_PREFIX`).

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use logoscope_core::models;

/// Returns the OpenAPI spec served at `/api/openapi.json`.
pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Logoscope API",
        version = "0.1.0",
        description = "Logo analysis API (v0). Uploads are staged, paid for or claimed, analysed by a multi-stage pipeline streamed over server-sent events, and published through a moderated visibility model. All endpoints are versioned under /api/v0/."
    ),
    paths(
        // Submissions
        handlers::submissions::stage_submission,
        handlers::submissions::claim_submission,
        handlers::checkout::create_checkout,
        handlers::webhooks::payment_webhook,
        // Analyses
        handlers::analyses::get_analysis,
        handlers::analyses::list_analyses,
        handlers::analyses::delete_analysis,
        handlers::analyses::share_analysis,
        handlers::analyses::set_visibility,
        handlers::analyses::restart_analysis,
        handlers::stream::stream_analysis,
        handlers::share::get_shared,
        // Curation
        handlers::curation::list_curation,
        // Admin
        handlers::admin::set_curation,
        handlers::admin::moderation_queue,
        handlers::admin::approve_analysis,
        handlers::admin::reject_analysis,
        handlers::admin::set_weekly_featured,
        // Auth
        handlers::auth::request_sign_in,
        handlers::auth::verify_sign_in,
        // Health
        handlers::health::health_check,
    ),
    components(schemas(
        error::ErrorResponse,
        models::Tier,
        models::ReportSection,
        models::DisplayMetadata,
        models::StagingReceipt,
        models::AnalysisStatus,
        models::Visibility,
        models::AnalysisView,
        models::AnalysisReport,
        models::PartialReport,
        models::ScoreCard,
        models::ScoreOverview,
        models::CriterionScore,
        models::CriterionValue,
        models::BrandSummary,
        models::ColorAnalysis,
        models::ColorSwatch,
        models::TypographyAnalysis,
        models::VisualLanguage,
        models::Account,
        models::CreationChannel,
        models::CurationList,
        models::CurationEntry,
        logoscope_core::Rating,
        logoscope_services::CheckoutRedirect,
        handlers::submissions::ClaimRequest,
        handlers::checkout::CheckoutRequest,
        handlers::analyses::ShareResponse,
        handlers::analyses::VisibilityRequest,
        handlers::admin::CurationRequest,
        handlers::admin::CurationAssignment,
        handlers::admin::RejectRequest,
        handlers::admin::WeeklyFeatureRequest,
        handlers::auth::SignInRequest,
        handlers::auth::VerifyRequest,
        handlers::auth::SessionResponse,
        handlers::health::HealthCheckResponse,
    )),
    tags(
        (name = "submissions", description = "Logo staging and free-tier claims"),
        (name = "checkout", description = "Hosted checkout for paid tiers"),
        (name = "payments", description = "Payment provider webhooks"),
        (name = "analyses", description = "Analysis results, sharing, visibility and the pipeline stream"),
        (name = "curation", description = "Curated home and gallery listings"),
        (name = "admin", description = "Moderation and curation management"),
        (name = "auth", description = "Passwordless sign-in"),
        (name = "health", description = "Service health checks"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_versioned_paths() {
        let spec = get_openapi_spec();
        assert!(spec.paths.paths.contains_key("/api/v0/submissions"));
        assert!(spec.paths.paths.contains_key("/api/v0/analyses/{id}/stream"));
        assert!(spec.paths.paths.contains_key("/health"));
    }
}
