use chrono::{Duration, Utc};
use logoscope_core::{
    overall_score, Analysis, AnalysisReport, AnalysisStatus, BrandSummary, DisplayMetadata,
    PaymentCorrelation, Rating, ReportSection, ScoreCard, StagedSubmission, Tier, Visibility,
};
use logoscope_storage::keys;
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::TokenService;

/// A real 2x2 PNG.
pub fn png_bytes() -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(2, 2, image::Rgba([20, 40, 200, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// A valid extraction output for `section`.
pub fn section_json(section: ReportSection) -> Value {
    match section {
        ReportSection::Scoring => {
            let scores = [82, 88, 75, 90, 70, 85, 78];
            let mut card = serde_json::Map::new();
            for (name, score) in ScoreCard::CRITERIA.iter().zip(scores) {
                card.insert(
                    (*name).to_string(),
                    json!({ "score": score, "rationale": format!("Solid {}.", name) }),
                );
            }
            Value::Object(card)
        }
        ReportSection::Summary => json!({
            "headline": "A confident, scalable monogram",
            "summary": "The mark is simple and reads well at small sizes.",
            "strengths": ["Strong silhouette", "Works in one color"],
            "weaknesses": ["Generic letterform"],
            "recommendations": ["Add a distinctive terminal"]
        }),
        ReportSection::Colors => json!({
            "palette": [
                { "hex": "#1428C8", "name": "Deep blue", "role": "primary" },
                { "hex": "#FFFFFF", "name": "White", "role": "background" }
            ],
            "harmony": "monochromatic",
            "notes": "High contrast on light backgrounds."
        }),
        ReportSection::Typography => json!({
            "classification": "Geometric sans",
            "characteristics": ["Uniform stroke", "Circular bowls"],
            "pairing_suggestions": ["Inter"],
            "notes": "Legible down to 16px."
        }),
        ReportSection::VisualLanguage => json!({
            "style": "Modernist",
            "motifs": ["Circle", "Negative space"],
            "mood": "Calm and precise",
            "applications": ["App icon", "Signage"]
        }),
    }
}

pub fn sample_report() -> AnalysisReport {
    let scores: ScoreCard = serde_json::from_value(section_json(ReportSection::Scoring)).unwrap();
    let summary: BrandSummary =
        serde_json::from_value(section_json(ReportSection::Summary)).unwrap();
    let overall = overall_score(&scores);
    AnalysisReport {
        description: "A bold geometric monogram.".to_string(),
        overall_score: overall,
        rating: Rating::from_score(overall),
        scores,
        summary,
        colors: serde_json::from_value(section_json(ReportSection::Colors)).ok(),
        typography: serde_json::from_value(section_json(ReportSection::Typography)).ok(),
        visual_language: None,
        omitted_sections: Vec::new(),
        generated_at: Utc::now(),
    }
}

fn display() -> DisplayMetadata {
    DisplayMetadata {
        name: "Acme".to_string(),
        author: Some("Jo Designer".to_string()),
        category: Some("Retail".to_string()),
    }
}

/// A pending analysis owned by `account_id`.
pub fn analysis_fixture(account_id: Uuid, tier: Tier) -> Analysis {
    let id = Uuid::new_v4();
    let now = Utc::now();
    Analysis {
        id,
        account_id,
        tier,
        status: AnalysisStatus::Pending,
        visibility: Visibility::initial_for(tier),
        display: display(),
        asset_key: keys::analysis_key(account_id, id, "png"),
        content_type: "image/png".to_string(),
        inline_asset: None,
        result: None,
        partial_result: None,
        failure_reason: None,
        share_token: None,
        weekly_featured: false,
        rejection_reason: None,
        payment: PaymentCorrelation::default(),
        run_id: None,
        run_started_at: None,
        created_at: now,
        updated_at: now,
        completed_at: None,
        deleted_at: None,
    }
}

pub fn completed_analysis(account_id: Uuid, tier: Tier) -> Analysis {
    let mut analysis = analysis_fixture(account_id, tier);
    analysis.status = AnalysisStatus::Completed;
    analysis.result = Some(sample_report());
    analysis.completed_at = Some(Utc::now());
    analysis
}

/// A staged submission that has not been written anywhere yet.
pub fn staged_submission(tier: Tier) -> StagedSubmission {
    let id = Uuid::new_v4();
    let now = Utc::now();
    StagedSubmission {
        id,
        session_token: format!("session-{}", id.simple()),
        tier,
        asset_key: keys::staging_key(id, "png"),
        content_type: "image/png".to_string(),
        file_size: 128,
        display: display(),
        email: Some("buyer@example.com".to_string()),
        account_id: None,
        created_at: now,
        expires_at: now + Duration::hours(24),
    }
}

pub fn tokens() -> Arc<TokenService> {
    Arc::new(TokenService::new(
        "test-secret-key-min-32-characters-long",
        Duration::hours(1),
        Duration::minutes(30),
        "https://logoscope.test",
    ))
}
