//! Streaming pipeline runner
//!
//! A run is two tasks feeding one channel: the work task drives Stage A, B and C, and
//! a keep-alive task ticks while the work task waits on slow calls. The work task
//! stops the keep-alive task before it sends the single terminal event. Dropping the
//! [`PipelineRun`] cancels both.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use logoscope_core::{
    Analysis, AnalysisStatus, AnalysisView, AppError, Config, ErrorMetadata, PartialReport,
    ReportSection, Requester,
};
use logoscope_db::{AnalysisStore, RunLease};
use logoscope_storage::Storage;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use super::assembly::assemble;
use super::provider::ContentProvider;
use super::stages::{self, SectionOutput, StageSettings};
use crate::results::ResultService;

const CHANNEL_CAPACITY: usize = 32;
const FAILED_CODE: &str = "ANALYSIS_FAILED";

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Started { analysis_id: Uuid },
    Describing,
    Described { chars: usize },
    Extracting { sections: Vec<ReportSection> },
    Section { section: ReportSection, ok: bool },
    Assembling,
    Complete(Box<AnalysisView>),
    Error { message: String, code: String },
    KeepAlive,
}

impl PipelineEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Started { .. } => "started",
            PipelineEvent::Describing => "describing",
            PipelineEvent::Described { .. } => "described",
            PipelineEvent::Extracting { .. } => "extracting",
            PipelineEvent::Section { .. } => "section",
            PipelineEvent::Assembling => "assembling",
            PipelineEvent::Complete(_) => "complete",
            PipelineEvent::Error { .. } => "error",
            PipelineEvent::KeepAlive => "keep-alive",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::Complete(_) | PipelineEvent::Error { .. })
    }

    /// SSE data payload.
    pub fn data(&self) -> Value {
        match self {
            PipelineEvent::Started { analysis_id } => json!({ "analysis_id": analysis_id }),
            PipelineEvent::Described { chars } => json!({ "chars": chars }),
            PipelineEvent::Extracting { sections } => json!({ "sections": sections }),
            PipelineEvent::Section { section, ok } => json!({ "section": section, "ok": ok }),
            PipelineEvent::Complete(view) => serde_json::to_value(view.as_ref()).unwrap_or(Value::Null),
            PipelineEvent::Error { message, code } => json!({ "message": message, "code": code }),
            PipelineEvent::Describing | PipelineEvent::Assembling | PipelineEvent::KeepAlive => {
                json!({})
            }
        }
    }

    fn from_error(err: &AppError) -> Self {
        PipelineEvent::Error {
            message: err.client_message(),
            code: err.error_code().to_string(),
        }
    }
}

/// Receiving end of a run. Dropping it cancels the run.
#[derive(Debug)]
pub struct PipelineRun {
    events: mpsc::Receiver<PipelineEvent>,
    _cancel_on_drop: DropGuard,
}

impl PipelineRun {
    fn new(events: mpsc::Receiver<PipelineEvent>, token: CancellationToken) -> Self {
        Self {
            events,
            _cancel_on_drop: token.drop_guard(),
        }
    }

    /// A run that replays a single terminal event.
    fn finished(event: PipelineEvent) -> Self {
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 and a fresh channel: this cannot fail.
        let _ = tx.try_send(event);
        Self::new(rx, CancellationToken::new())
    }

    pub async fn next(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub stages: StageSettings,
    pub keepalive_interval: Duration,
    /// Leases older than this are treated as abandoned
    pub stale_run_after: ChronoDuration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            stages: StageSettings {
                call_timeout: Duration::from_secs(config.analysis_call_timeout_secs()),
                max_concurrent_calls: config.analysis_max_concurrent_calls().max(1),
                detail_description_chars: config.analysis_detail_description_chars(),
            },
            keepalive_interval: Duration::from_secs(config.pipeline_keepalive_secs().max(1)),
            stale_run_after: ChronoDuration::seconds(config.pipeline_stale_run_secs()),
        }
    }
}

#[derive(Clone)]
pub struct PipelineRunner {
    analyses: Arc<dyn AnalysisStore>,
    durable: Arc<dyn Storage>,
    provider: Arc<dyn ContentProvider>,
    results: ResultService,
    settings: PipelineSettings,
}

impl PipelineRunner {
    pub fn new(
        analyses: Arc<dyn AnalysisStore>,
        durable: Arc<dyn Storage>,
        provider: Arc<dyn ContentProvider>,
        results: ResultService,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            analyses,
            durable,
            provider,
            results,
            settings,
        }
    }

    /// Start (or replay) the run for an analysis.
    ///
    /// Completed and failed analyses replay their terminal event. Pending ones, and
    /// processing ones whose lease is gone or stale, start a new run. A live run is
    /// `AlreadyProcessing`.
    #[tracing::instrument(skip(self, requester))]
    pub async fn start(&self, id: Uuid, requester: &Requester) -> Result<PipelineRun, AppError> {
        let analysis = self.load(id).await?;
        if !requester.can_manage(analysis.account_id) {
            return Err(AppError::Forbidden(
                "Only the owner or an administrator can run this analysis".to_string(),
            ));
        }
        if let Some(run) = self.replay(&analysis, requester).await {
            return Ok(run);
        }

        let lease = RunLease {
            analysis_id: id,
            run_id: Uuid::new_v4(),
        };
        let now = Utc::now();
        let Some(leased) = self
            .analyses
            .begin_run(lease, now, now - self.settings.stale_run_after)
            .await?
        else {
            // Lost to a concurrent start, or finished in between.
            let current = self.load(id).await?;
            return match self.replay(&current, requester).await {
                Some(run) => Ok(run),
                None => Err(AppError::AlreadyProcessing(id)),
            };
        };

        tracing::info!(analysis_id = %id, run_id = %lease.run_id, tier = %leased.tier, "Pipeline run started");

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let token = CancellationToken::new();
        let runner = self.clone();
        let requester = *requester;
        let work_token = token.clone();

        tokio::spawn(async move {
            runner.drive(leased, lease, requester, tx, work_token).await;
        });

        Ok(PipelineRun::new(rx, token))
    }

    async fn load(&self, id: Uuid) -> Result<Analysis, AppError> {
        self.analyses
            .get(id)
            .await?
            .filter(|a| !a.is_deleted())
            .ok_or_else(|| AppError::NotFound("Analysis not found".to_string()))
    }

    async fn replay(&self, analysis: &Analysis, requester: &Requester) -> Option<PipelineRun> {
        match analysis.status {
            AnalysisStatus::Completed => {
                let view = self.results.project(analysis, Some(requester)).await;
                Some(PipelineRun::finished(PipelineEvent::Complete(Box::new(view))))
            }
            AnalysisStatus::Failed => Some(PipelineRun::finished(PipelineEvent::Error {
                message: analysis
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "Analysis failed".to_string()),
                code: FAILED_CODE.to_string(),
            })),
            AnalysisStatus::Pending | AnalysisStatus::Processing => None,
        }
    }

    async fn drive(
        self,
        analysis: Analysis,
        lease: RunLease,
        requester: Requester,
        tx: mpsc::Sender<PipelineEvent>,
        token: CancellationToken,
    ) {
        let keepalive_token = token.child_token();
        let keepalive = tokio::spawn(keep_alive(
            tx.clone(),
            self.settings.keepalive_interval,
            keepalive_token.clone(),
        ));

        let terminal = tokio::select! {
            _ = token.cancelled() => None,
            event = self.execute(&analysis, lease, &requester, &tx) => Some(event),
        };

        keepalive_token.cancel();
        if let Err(e) = keepalive.await {
            tracing::warn!(error = %e, "Keep-alive task ended abnormally");
        }

        match terminal {
            Some(event) => {
                let _ = tx.send(event).await;
            }
            None => {
                tracing::info!(analysis_id = %analysis.id, "Pipeline run cancelled");
                if let Err(e) = self.analyses.release_run(lease).await {
                    tracing::error!(error = %e, analysis_id = %analysis.id, "Failed to release run lease");
                }
            }
        }
    }

    async fn execute(
        &self,
        analysis: &Analysis,
        lease: RunLease,
        requester: &Requester,
        tx: &mpsc::Sender<PipelineEvent>,
    ) -> PipelineEvent {
        let start = std::time::Instant::now();
        let _ = tx
            .send(PipelineEvent::Started {
                analysis_id: analysis.id,
            })
            .await;

        let image = match self.load_asset(analysis).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(error = %e, analysis_id = %analysis.id, "Logo asset could not be loaded");
                return self.fail(lease, "Logo asset is unavailable".to_string(), None).await;
            }
        };

        let _ = tx.send(PipelineEvent::Describing).await;
        let description = match stages::describe(
            self.provider.as_ref(),
            &self.settings.stages,
            &image,
            &analysis.content_type,
        )
        .await
        {
            Ok(description) => description,
            Err(e) => {
                tracing::warn!(error = %e, analysis_id = %analysis.id, "Visual description failed");
                let reason = format!("Visual description failed: {}", e.client_message());
                return self.fail(lease, reason, None).await;
            }
        };
        let _ = tx
            .send(PipelineEvent::Described {
                chars: description.chars().count(),
            })
            .await;

        let sections = analysis.tier.sections();
        let _ = tx
            .send(PipelineEvent::Extracting {
                sections: sections.to_vec(),
            })
            .await;

        let mut outputs: Vec<SectionOutput> = Vec::with_capacity(sections.len());
        let shared: Arc<str> = Arc::from(description.as_str());
        let provider = Arc::clone(&self.provider);
        let stage_settings = self.settings.stages.clone();
        let mut calls = stream::iter(sections.iter().copied())
            .map(move |section| {
                let provider = Arc::clone(&provider);
                let settings = stage_settings.clone();
                let description = Arc::clone(&shared);
                async move {
                    let outcome =
                        stages::extract_section(provider.as_ref(), &settings, section, &description)
                            .await;
                    (section, outcome)
                }
            })
            .buffer_unordered(self.settings.stages.max_concurrent_calls);

        while let Some((section, outcome)) = calls.next().await {
            let ok = outcome.is_ok();
            match outcome {
                Ok(output) => outputs.push(output),
                Err(e) => tracing::warn!(
                    analysis_id = %analysis.id,
                    section = %section,
                    error = %e,
                    "Section extraction failed"
                ),
            }
            let _ = tx.send(PipelineEvent::Section { section, ok }).await;
        }
        drop(calls);

        let _ = tx.send(PipelineEvent::Assembling).await;
        let report = match assemble(analysis.tier, description, outputs, Utc::now()) {
            Ok(report) => report,
            Err(failure) => {
                return self
                    .fail(lease, failure.reason, failure.partial.as_ref())
                    .await;
            }
        };

        match self.analyses.complete_run(lease, &report, Utc::now()).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(analysis_id = %analysis.id, "Run lease lost before completion");
                return PipelineEvent::Error {
                    message: "This run was superseded by another".to_string(),
                    code: "RUN_SUPERSEDED".to_string(),
                };
            }
            Err(e) => {
                tracing::error!(error = %e, analysis_id = %analysis.id, "Failed to store result");
                return PipelineEvent::from_error(&e);
            }
        }

        tracing::info!(
            analysis_id = %analysis.id,
            overall_score = report.overall_score,
            rating = %report.rating,
            omitted = report.omitted_sections.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Analysis completed"
        );

        match self.load(analysis.id).await {
            Ok(completed) => PipelineEvent::Complete(Box::new(
                self.results.project(&completed, Some(requester)).await,
            )),
            Err(e) => PipelineEvent::from_error(&e),
        }
    }

    /// Durable copy first, inline copy when storage is unreachable.
    async fn load_asset(&self, analysis: &Analysis) -> Result<Vec<u8>, AppError> {
        match self.durable.download(&analysis.asset_key).await {
            Ok(data) => Ok(data),
            Err(e) => {
                let inline = analysis.inline_asset.as_deref().ok_or_else(|| AppError::from(e))?;
                tracing::warn!(analysis_id = %analysis.id, "Durable asset unavailable, using inline copy");
                STANDARD
                    .decode(inline)
                    .map_err(|e| AppError::Storage(format!("Inline asset is corrupt: {}", e)))
            }
        }
    }

    async fn fail(
        &self,
        lease: RunLease,
        reason: String,
        partial: Option<&PartialReport>,
    ) -> PipelineEvent {
        tracing::warn!(analysis_id = %lease.analysis_id, reason = %reason, "Analysis failed");

        match self.analyses.fail_run(lease, &reason, partial).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(analysis_id = %lease.analysis_id, "Run lease lost before failure was recorded"),
            Err(e) => tracing::error!(error = %e, analysis_id = %lease.analysis_id, "Failed to record failure"),
        }

        PipelineEvent::Error {
            message: reason,
            code: FAILED_CODE.to_string(),
        }
    }
}

async fn keep_alive(tx: mpsc::Sender<PipelineEvent>, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            _ = token.cancelled() => break,
            sent = tx.send(PipelineEvent::KeepAlive) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}
