//! Structured analysis report.
//!
//! Extraction outputs are deserialized into these types and then checked with
//! `validator`, so a malformed section is caught before it reaches assembly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::ReportSection;
use crate::rating::Rating;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct CriterionScore {
    #[validate(range(max = 100))]
    pub score: u8,
    #[validate(length(min = 1, max = 600))]
    pub rationale: String,
}

/// The seven scoring criteria, each 0-100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ScoreCard {
    #[validate(nested)]
    pub simplicity: CriterionScore,
    #[validate(nested)]
    pub memorability: CriterionScore,
    #[validate(nested)]
    pub timelessness: CriterionScore,
    #[validate(nested)]
    pub versatility: CriterionScore,
    #[validate(nested)]
    pub relevance: CriterionScore,
    #[validate(nested)]
    pub distinctiveness: CriterionScore,
    #[validate(nested)]
    pub balance: CriterionScore,
}

impl ScoreCard {
    pub const CRITERIA: [&'static str; 7] = [
        "simplicity",
        "memorability",
        "timelessness",
        "versatility",
        "relevance",
        "distinctiveness",
        "balance",
    ];

    pub fn values(&self) -> [u8; 7] {
        [
            self.simplicity.score,
            self.memorability.score,
            self.timelessness.score,
            self.versatility.score,
            self.relevance.score,
            self.distinctiveness.score,
            self.balance.score,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct BrandSummary {
    #[validate(length(min = 1, max = 200))]
    pub headline: String,
    #[validate(length(min = 1))]
    pub summary: String,
    #[validate(length(min = 1, max = 8))]
    pub strengths: Vec<String>,
    #[validate(length(min = 1, max = 8))]
    pub weaknesses: Vec<String>,
    #[validate(length(max = 8))]
    #[serde(default)]
    pub recommendations: Vec<String>,
}

fn validate_hex_color(value: &str) -> Result<(), ValidationError> {
    let digits = value.strip_prefix('#').unwrap_or(value);
    if (digits.len() == 6 || digits.len() == 3) && digits.chars().all(|c| c.is_ascii_hexdigit())
    {
        Ok(())
    } else {
        Err(ValidationError::new("hex_color"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ColorSwatch {
    #[validate(custom(function = "validate_hex_color"))]
    pub hex: String,
    #[validate(length(min = 1, max = 60))]
    pub name: String,
    #[validate(length(min = 1, max = 60))]
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ColorAnalysis {
    #[validate(length(min = 1, max = 12), nested)]
    pub palette: Vec<ColorSwatch>,
    #[validate(length(min = 1))]
    pub harmony: String,
    #[validate(length(min = 1))]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct TypographyAnalysis {
    #[validate(length(min = 1, max = 120))]
    pub classification: String,
    #[validate(length(min = 1, max = 10))]
    pub characteristics: Vec<String>,
    #[validate(length(max = 10))]
    #[serde(default)]
    pub pairing_suggestions: Vec<String>,
    #[validate(length(min = 1))]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct VisualLanguage {
    #[validate(length(min = 1, max = 120))]
    pub style: String,
    #[validate(length(min = 1, max = 10))]
    pub motifs: Vec<String>,
    #[validate(length(min = 1, max = 200))]
    pub mood: String,
    #[validate(length(min = 1, max = 10))]
    pub applications: Vec<String>,
}

/// Fully assembled report, stored as the analysis result once completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisReport {
    pub description: String,
    pub scores: ScoreCard,
    pub overall_score: u8,
    pub rating: Rating,
    pub summary: BrandSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<ColorAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typography: Option<TypographyAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_language: Option<VisualLanguage>,
    /// Optional sections that the tier included but generation failed to produce.
    #[serde(default)]
    pub omitted_sections: Vec<ReportSection>,
    pub generated_at: DateTime<Utc>,
}

/// Whatever a failed run managed to produce before it stopped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PartialReport {
    pub description: Option<String>,
    pub scores: Option<ScoreCard>,
    pub summary: Option<BrandSummary>,
    pub colors: Option<ColorAnalysis>,
    pub typography: Option<TypographyAnalysis>,
    pub visual_language: Option<VisualLanguage>,
    pub failed_sections: Vec<ReportSection>,
}

impl PartialReport {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.scores.is_none()
            && self.summary.is_none()
            && self.colors.is_none()
            && self.typography.is_none()
            && self.visual_language.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CriterionValue {
    pub criterion: String,
    pub score: u8,
}

/// Scores-only projection shown to non-owners of a free analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoreOverview {
    pub overall_score: u8,
    pub rating: Rating,
    pub criteria: Vec<CriterionValue>,
}

impl From<&AnalysisReport> for ScoreOverview {
    fn from(report: &AnalysisReport) -> Self {
        let criteria = ScoreCard::CRITERIA
            .iter()
            .zip(report.scores.values())
            .map(|(name, score)| CriterionValue {
                criterion: (*name).to_string(),
                score,
            })
            .collect();
        ScoreOverview {
            overall_score: report.overall_score,
            rating: report.rating,
            criteria,
        }
    }
}
