//! Overall score and rating bands.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;

use crate::models::ScoreCard;

/// Qualitative band for an overall score. Bands are contiguous over 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Exceptional,
    Professional,
    Good,
    Average,
    Problematic,
    Reconsider,
}

impl Rating {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Rating::Exceptional,
            80..=89 => Rating::Professional,
            70..=79 => Rating::Good,
            60..=69 => Rating::Average,
            40..=59 => Rating::Problematic,
            _ => Rating::Reconsider,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rating::Exceptional => "Exceptional",
            Rating::Professional => "Professional",
            Rating::Good => "Good",
            Rating::Average => "Average",
            Rating::Problematic => "Problematic",
            Rating::Reconsider => "Reconsider",
        }
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.label())
    }
}

/// Rounded mean of the seven criterion scores.
pub fn overall_score(scores: &ScoreCard) -> u8 {
    let values = scores.values();
    let sum: u32 = values.iter().map(|v| u32::from(*v)).sum();
    let mean = f64::from(sum) / values.len() as f64;
    mean.round().clamp(0.0, 100.0) as u8
}
