//! Administrator endpoints: moderation of free analyses, weekly featuring and the
//! curated home/gallery lists.

use crate::auth::AccountContext;
use crate::constants::{DEFAULT_MODERATION_LIMIT, MAX_MODERATION_LIMIT};
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::{AnalysisState, CurationState};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use logoscope_core::{AnalysisView, CurationList, CurationSlot};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CurationRequest {
    /// Home list in display order (at most 3)
    #[serde(default)]
    pub home_ids: Vec<Uuid>,
    /// Gallery list in display order (at most 6)
    #[serde(default)]
    pub gallery_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurationAssignment {
    pub home_ids: Vec<Uuid>,
    pub gallery_ids: Vec<Uuid>,
}

impl CurationAssignment {
    fn from_slots(slots: &[CurationSlot]) -> Self {
        let mut ordered = slots.to_vec();
        ordered.sort_by_key(|slot| slot.position);

        let ids_in = |list: CurationList| {
            ordered
                .iter()
                .filter(|slot| CurationList::from_position(slot.position) == Some(list))
                .map(|slot| slot.analysis_id)
                .collect()
        };

        Self {
            home_ids: ids_in(CurationList::Home),
            gallery_ids: ids_in(CurationList::Gallery),
        }
    }
}

/// Replace the home and gallery lists
///
/// Either both lists are stored or nothing changes.
#[utoipa::path(
    put,
    path = "/api/v0/admin/curation",
    tag = "admin",
    request_body = CurationRequest,
    responses(
        (status = 200, description = "Curation replaced", body = CurationAssignment),
        (status = 400, description = "Over capacity, duplicate or ineligible analysis", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(curation, body),
    fields(account_id = %account.account_id, operation = "set_curation")
)]
pub async fn set_curation(
    State(curation): State<CurationState>,
    account: AccountContext,
    ValidatedJson(body): ValidatedJson<CurationRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let slots = curation
        .curation
        .set_curation(&account.requester(), &body.home_ids, &body.gallery_ids)
        .await?;

    Ok(Json(CurationAssignment::from_slots(&slots)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ModerationQuery {
    /// Maximum number of analyses to return (default 50, max 200)
    pub limit: Option<i64>,
}

/// Free analyses awaiting approval, oldest first
#[utoipa::path(
    get,
    path = "/api/v0/admin/moderation",
    tag = "admin",
    params(ModerationQuery),
    responses(
        (status = 200, description = "Pending analyses", body = Vec<AnalysisView>),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(analyses), fields(account_id = %account.account_id, operation = "moderation_queue"))]
pub async fn moderation_queue(
    State(analyses): State<AnalysisState>,
    account: AccountContext,
    Query(query): Query<ModerationQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MODERATION_LIMIT)
        .clamp(1, MAX_MODERATION_LIMIT);
    let views = analyses
        .results
        .moderation_queue(&account.requester(), limit)
        .await?;
    Ok(Json(views))
}

/// Approve a free analysis for public display
#[utoipa::path(
    post,
    path = "/api/v0/admin/analyses/{id}/approve",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Analysis ID")),
    responses(
        (status = 200, description = "Analysis is public", body = AnalysisView),
        (status = 400, description = "Not awaiting approval", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(analyses),
    fields(account_id = %account.account_id, analysis_id = %id, operation = "approve_analysis")
)]
pub async fn approve_analysis(
    Path(id): Path<Uuid>,
    State(analyses): State<AnalysisState>,
    account: AccountContext,
) -> Result<impl IntoResponse, HttpAppError> {
    let view = analyses.results.approve(id, &account.requester()).await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRequest {
    pub reason: String,
}

/// Reject a free analysis awaiting approval
#[utoipa::path(
    post,
    path = "/api/v0/admin/analyses/{id}/reject",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Analysis ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Analysis rejected", body = AnalysisView),
        (status = 400, description = "Not awaiting approval", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(analyses, body),
    fields(account_id = %account.account_id, analysis_id = %id, operation = "reject_analysis")
)]
pub async fn reject_analysis(
    Path(id): Path<Uuid>,
    State(analyses): State<AnalysisState>,
    account: AccountContext,
    ValidatedJson(body): ValidatedJson<RejectRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let view = analyses
        .results
        .reject(id, &account.requester(), &body.reason)
        .await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WeeklyFeatureRequest {
    pub featured: bool,
}

/// Mark or unmark an analysis as weekly featured
#[utoipa::path(
    put,
    path = "/api/v0/admin/analyses/{id}/weekly",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Analysis ID")),
    request_body = WeeklyFeatureRequest,
    responses(
        (status = 200, description = "Flag updated", body = AnalysisView),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 404, description = "Analysis not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(analyses, body),
    fields(account_id = %account.account_id, analysis_id = %id, featured = body.featured, operation = "set_weekly_featured")
)]
pub async fn set_weekly_featured(
    Path(id): Path<Uuid>,
    State(analyses): State<AnalysisState>,
    account: AccountContext,
    ValidatedJson(body): ValidatedJson<WeeklyFeatureRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let view = analyses
        .results
        .set_weekly_featured(id, &account.requester(), body.featured)
        .await?;
    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_groups_slots_by_band() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let slots = vec![
            CurationSlot { position: 101, analysis_id: c },
            CurationSlot { position: 0, analysis_id: a },
            CurationSlot { position: 100, analysis_id: b },
        ];

        let assignment = CurationAssignment::from_slots(&slots);
        assert_eq!(assignment.home_ids, vec![a]);
        assert_eq!(assignment.gallery_ids, vec![b, c]);
    }
}
