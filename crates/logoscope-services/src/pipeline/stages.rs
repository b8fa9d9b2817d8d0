//! Stage A and Stage B calls
//!
//! Every external call gets a timeout and exactly one retry. Extraction output is
//! typed with serde and range-checked with `validator` before it counts as a success.

use logoscope_core::{
    AppError, BrandSummary, ColorAnalysis, ReportSection, ScoreCard, TypographyAnalysis,
    VisualLanguage,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use validator::Validate;

use super::provider::ContentProvider;

const ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct StageSettings {
    pub call_timeout: Duration,
    pub max_concurrent_calls: usize,
    /// Description length handed to the optional detail sections
    pub detail_description_chars: usize,
}

/// A validated Stage B result.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionOutput {
    Scoring(ScoreCard),
    Summary(BrandSummary),
    Colors(ColorAnalysis),
    Typography(TypographyAnalysis),
    VisualLanguage(VisualLanguage),
}

fn typed<T: DeserializeOwned + Validate>(section: ReportSection, value: Value) -> Result<T, AppError> {
    let schema_error = |message: String| AppError::SchemaValidation {
        section: section.to_string(),
        message,
    };
    let parsed: T = serde_json::from_value(value).map_err(|e| schema_error(e.to_string()))?;
    parsed.validate().map_err(|e| schema_error(e.to_string()))?;
    Ok(parsed)
}

impl SectionOutput {
    pub fn section(&self) -> ReportSection {
        match self {
            SectionOutput::Scoring(_) => ReportSection::Scoring,
            SectionOutput::Summary(_) => ReportSection::Summary,
            SectionOutput::Colors(_) => ReportSection::Colors,
            SectionOutput::Typography(_) => ReportSection::Typography,
            SectionOutput::VisualLanguage(_) => ReportSection::VisualLanguage,
        }
    }

    pub fn parse(section: ReportSection, value: Value) -> Result<Self, AppError> {
        Ok(match section {
            ReportSection::Scoring => SectionOutput::Scoring(typed(section, value)?),
            ReportSection::Summary => SectionOutput::Summary(typed(section, value)?),
            ReportSection::Colors => SectionOutput::Colors(typed(section, value)?),
            ReportSection::Typography => SectionOutput::Typography(typed(section, value)?),
            ReportSection::VisualLanguage => {
                SectionOutput::VisualLanguage(typed(section, value)?)
            }
        })
    }
}

/// Run `call` with a timeout, retrying once on any failure.
async fn with_retry<T, F, Fut>(label: &str, timeout: Duration, mut call: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut last_error = None;

    for attempt in 1..=ATTEMPTS {
        let outcome = match tokio::time::timeout(timeout, call()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AppError::external(
                "anthropic",
                format!("{} timed out after {}s", label, timeout.as_secs()),
            )),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(stage = label, attempt, error = %e, "Generation call failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::Internal(format!("{} was never attempted", label))))
}

/// Stage A.
pub async fn describe(
    provider: &dyn ContentProvider,
    settings: &StageSettings,
    image: &[u8],
    media_type: &str,
) -> Result<String, AppError> {
    with_retry("description", settings.call_timeout, || async move {
        let text = provider.describe(image, media_type).await?;
        if text.trim().is_empty() {
            return Err(AppError::SchemaValidation {
                section: "description".to_string(),
                message: "empty description".to_string(),
            });
        }
        Ok(text)
    })
    .await
}

/// Truncate on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// One Stage B call. Optional sections get the truncated description.
pub async fn extract_section(
    provider: &dyn ContentProvider,
    settings: &StageSettings,
    section: ReportSection,
    description: &str,
) -> Result<SectionOutput, AppError> {
    let input = if section.is_mandatory() {
        description
    } else {
        truncate_chars(description, settings.detail_description_chars)
    };

    with_retry(section.as_str(), settings.call_timeout, || async move {
        let value = provider.extract(section, input).await?;
        SectionOutput::parse(section, value)
    })
    .await
}
