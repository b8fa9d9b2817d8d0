use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::parse_tier;
use crate::state::SubmissionState;
use axum::{extract::State, response::IntoResponse, Json};
use logoscope_services::CheckoutRedirect;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub staging_id: Uuid,
    /// `paid` or `premium`
    pub tier: String,
    pub email: String,
}

/// Open a hosted checkout session for a staged paid submission
#[utoipa::path(
    post,
    path = "/api/v0/checkout",
    tag = "checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutRedirect),
        (status = 400, description = "Invalid tier, email or tier mismatch", body = ErrorResponse),
        (status = 404, description = "Submission not found or expired", body = ErrorResponse),
        (status = 502, description = "Payment provider unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(submissions, body),
    fields(staging_id = %body.staging_id, operation = "create_checkout")
)]
pub async fn create_checkout(
    State(submissions): State<SubmissionState>,
    ValidatedJson(body): ValidatedJson<CheckoutRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let tier = parse_tier(&body.tier)?;
    let redirect = submissions
        .checkout
        .create_checkout(body.staging_id, tier, &body.email)
        .await?;

    Ok(Json(redirect))
}
