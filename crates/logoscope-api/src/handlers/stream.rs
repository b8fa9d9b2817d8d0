//! Server-sent events for a pipeline run.
//!
//! Progress events are named after the pipeline step and carry JSON data. Keep-alives
//! are SSE comments so clients never see them as events. The stream ends after
//! `complete` or `error`; closing the connection early cancels the run.

use crate::auth::AccountContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AnalysisState;
use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
};
use futures::Stream;
use logoscope_services::PipelineEvent;
use std::convert::Infallible;
use uuid::Uuid;

fn to_sse_event(event: &PipelineEvent) -> Event {
    match event {
        PipelineEvent::KeepAlive => Event::default().comment("keep-alive"),
        other => Event::default()
            .event(other.name())
            .data(other.data().to_string()),
    }
}

/// Run (or replay) the analysis pipeline as an event stream
#[utoipa::path(
    get,
    path = "/api/v0/analyses/{id}/stream",
    tag = "analyses",
    params(("id" = Uuid, Path, description = "Analysis ID")),
    responses(
        (status = 200, description = "Pipeline events", body = String, content_type = "text/event-stream"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Analysis not found", body = ErrorResponse),
        (status = 409, description = "A run is already in progress", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(analyses),
    fields(account_id = %account.account_id, analysis_id = %id, operation = "stream_analysis")
)]
pub async fn stream_analysis(
    Path(id): Path<Uuid>,
    State(analyses): State<AnalysisState>,
    account: AccountContext,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, HttpAppError> {
    let mut run = analyses.pipeline.start(id, &account.requester()).await?;

    let stream = async_stream::stream! {
        while let Some(event) = run.next().await {
            let terminal = event.is_terminal();
            yield Ok(to_sse_event(&event));
            if terminal {
                break;
            }
        }
    };

    Ok(Sse::new(stream))
}

