use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::cache_control;
use crate::state::AnalysisState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use logoscope_core::AnalysisView;

/// Resolve a share token to its analysis
///
/// Works for any non-deleted paid analysis regardless of visibility.
#[utoipa::path(
    get,
    path = "/api/v0/share/{token}",
    tag = "analyses",
    params(("token" = String, Path, description = "Share token")),
    responses(
        (status = 200, description = "Shared analysis", body = AnalysisView),
        (status = 404, description = "Unknown share token", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(analyses, token), fields(operation = "get_shared"))]
pub async fn get_shared(
    Path(token): Path<String>,
    State(analyses): State<AnalysisState>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (view, policy) = analyses.results.get_shared(&token).await?;
    Ok((cache_control(policy), Json(view)))
}
