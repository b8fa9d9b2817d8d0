use crate::auth::AccountContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::viewer_cache_headers;
use crate::state::AnalysisState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use logoscope_core::{AnalysisView, Visibility};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Get an analysis
///
/// Owners and admins always see the full report. Everyone else sees public analyses
/// only, with scores alone for free analyses and the full report for paid tiers.
#[utoipa::path(
    get,
    path = "/api/v0/analyses/{id}",
    tag = "analyses",
    params(("id" = Uuid, Path, description = "Analysis ID")),
    responses(
        (status = 200, description = "Analysis projection", body = AnalysisView),
        (status = 401, description = "Not public and not signed in", body = ErrorResponse),
        (status = 403, description = "Not public", body = ErrorResponse),
        (status = 404, description = "Analysis not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(analyses),
    fields(account_id = ?account.map(|a| a.account_id), analysis_id = %id, operation = "get_analysis")
)]
pub async fn get_analysis(
    Path(id): Path<Uuid>,
    State(analyses): State<AnalysisState>,
    account: Option<AccountContext>,
) -> Result<impl IntoResponse, HttpAppError> {
    let requester = account.map(|a| a.requester());
    let (view, policy) = analyses.results.get_result(id, requester.as_ref()).await?;

    Ok((viewer_cache_headers(policy), Json(view)))
}

/// List the signed-in account's analyses, newest first
#[utoipa::path(
    get,
    path = "/api/v0/analyses",
    tag = "analyses",
    responses(
        (status = 200, description = "Analyses owned by the caller", body = Vec<AnalysisView>),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(analyses), fields(account_id = %account.account_id, operation = "list_analyses"))]
pub async fn list_analyses(
    State(analyses): State<AnalysisState>,
    account: AccountContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let views = analyses.results.list_own(&account.requester()).await?;
    Ok(Json(views))
}

/// Soft-delete an analysis
#[utoipa::path(
    delete,
    path = "/api/v0/analyses/{id}",
    tag = "analyses",
    params(("id" = Uuid, Path, description = "Analysis ID")),
    responses(
        (status = 204, description = "Analysis deleted"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Analysis not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(analyses),
    fields(account_id = %account.account_id, analysis_id = %id, operation = "delete_analysis")
)]
pub async fn delete_analysis(
    Path(id): Path<Uuid>,
    State(analyses): State<AnalysisState>,
    account: AccountContext,
) -> Result<impl IntoResponse, HttpAppError> {
    analyses.results.delete(id, &account.requester()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ShareResponse {
    pub share_token: String,
}

/// Issue (or return) the share token of a paid analysis
#[utoipa::path(
    post,
    path = "/api/v0/analyses/{id}/share",
    tag = "analyses",
    params(("id" = Uuid, Path, description = "Analysis ID")),
    responses(
        (status = 200, description = "Share token", body = ShareResponse),
        (status = 403, description = "Free tier or not the owner", body = ErrorResponse),
        (status = 404, description = "Analysis not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(analyses),
    fields(account_id = %account.account_id, analysis_id = %id, operation = "share_analysis")
)]
pub async fn share_analysis(
    Path(id): Path<Uuid>,
    State(analyses): State<AnalysisState>,
    account: AccountContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let share_token = analyses.results.share(id, &account.requester()).await?;
    Ok(Json(ShareResponse { share_token }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VisibilityRequest {
    /// `public` or `private`
    pub visibility: Visibility,
}

/// Publish or unpublish a paid analysis
#[utoipa::path(
    put,
    path = "/api/v0/analyses/{id}/visibility",
    tag = "analyses",
    params(("id" = Uuid, Path, description = "Analysis ID")),
    request_body = VisibilityRequest,
    responses(
        (status = 200, description = "Visibility changed", body = AnalysisView),
        (status = 400, description = "Unsupported target visibility", body = ErrorResponse),
        (status = 403, description = "Free tier or not the owner", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(analyses, body),
    fields(account_id = %account.account_id, analysis_id = %id, visibility = %body.visibility, operation = "set_visibility")
)]
pub async fn set_visibility(
    Path(id): Path<Uuid>,
    State(analyses): State<AnalysisState>,
    account: AccountContext,
    ValidatedJson(body): ValidatedJson<VisibilityRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let view = analyses
        .results
        .set_visibility(id, &account.requester(), body.visibility)
        .await?;
    Ok(Json(view))
}

/// Move a failed analysis back to pending so it can be streamed again
#[utoipa::path(
    post,
    path = "/api/v0/analyses/{id}/restart",
    tag = "analyses",
    params(("id" = Uuid, Path, description = "Analysis ID")),
    responses(
        (status = 200, description = "Analysis is pending again", body = AnalysisView),
        (status = 400, description = "Analysis has not failed", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(analyses),
    fields(account_id = %account.account_id, analysis_id = %id, operation = "restart_analysis")
)]
pub async fn restart_analysis(
    Path(id): Path<Uuid>,
    State(analyses): State<AnalysisState>,
    account: AccountContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let view = analyses.results.restart(id, &account.requester()).await?;
    Ok(Json(view))
}
