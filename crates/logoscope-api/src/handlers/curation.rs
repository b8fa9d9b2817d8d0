use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::cache_control;
use crate::state::CurationState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use logoscope_core::{AppError, CurationEntry, CurationList};
use logoscope_services::CachePolicy;

/// Public curated listing
#[utoipa::path(
    get,
    path = "/api/v0/curation/{list}",
    tag = "curation",
    params(("list" = String, Path, description = "`home` or `gallery`")),
    responses(
        (status = 200, description = "Curated analyses in position order", body = Vec<CurationEntry>),
        (status = 400, description = "Unknown list", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(curation), fields(list = %list, operation = "list_curation"))]
pub async fn list_curation(
    Path(list): Path<String>,
    State(curation): State<CurationState>,
) -> Result<impl IntoResponse, HttpAppError> {
    let list = list
        .parse::<CurationList>()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let entries = curation.curation.list(list).await?;

    Ok((cache_control(CachePolicy::Public), Json(entries)))
}
