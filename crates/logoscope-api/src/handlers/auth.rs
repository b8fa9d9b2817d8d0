use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AuthState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use logoscope_core::Account;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignInRequest {
    pub email: String,
    pub display_name: Option<String>,
}

/// Email a sign-in link, creating the account on first use
#[utoipa::path(
    post,
    path = "/api/v0/auth/sign-in",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 202, description = "Sign-in link sent"),
        (status = 400, description = "Invalid email", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(auth, body), fields(operation = "request_sign_in"))]
pub async fn request_sign_in(
    State(auth): State<AuthState>,
    ValidatedJson(body): ValidatedJson<SignInRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    auth.auth
        .request_sign_in(&body.email, body.display_name.as_deref())
        .await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyRequest {
    /// Token from the emailed sign-in link
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    pub account: Account,
}

/// Exchange a sign-in link token for a session token
#[utoipa::path(
    post,
    path = "/api/v0/auth/verify",
    tag = "auth",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Invalid or expired link", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(auth, body), fields(operation = "verify_sign_in"))]
pub async fn verify_sign_in(
    State(auth): State<AuthState>,
    ValidatedJson(body): ValidatedJson<VerifyRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let grant = auth.auth.complete_sign_in(&body.token).await?;
    tracing::info!(account_id = %grant.account.id, "Session issued");

    Ok(Json(SessionResponse {
        session_token: grant.session_token,
        expires_at: grant.expires_at,
        account: grant.account,
    }))
}
