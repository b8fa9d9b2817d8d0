//! Extraction tool schemas
//!
//! Each report section is produced by a forced tool call whose `input_schema` mirrors
//! the matching report struct in `logoscope_core`.

use logoscope_core::{ReportSection, ScoreCard};
use serde_json::{json, Map, Value};

fn string_list(max_items: u64) -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "maxItems": max_items
    })
}

fn scoring_schema() -> Value {
    let criterion = json!({
        "type": "object",
        "properties": {
            "score": { "type": "integer", "minimum": 0, "maximum": 100 },
            "rationale": { "type": "string", "description": "One sentence" }
        },
        "required": ["score", "rationale"]
    });

    let mut properties = Map::new();
    for name in ScoreCard::CRITERIA {
        properties.insert(name.to_string(), criterion.clone());
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": ScoreCard::CRITERIA
    })
}

/// JSON schema for the tool input of `section`.
pub fn input_schema(section: ReportSection) -> Value {
    match section {
        ReportSection::Scoring => scoring_schema(),
        ReportSection::Summary => json!({
            "type": "object",
            "properties": {
                "headline": { "type": "string" },
                "summary": { "type": "string" },
                "strengths": string_list(8),
                "weaknesses": string_list(8),
                "recommendations": string_list(8)
            },
            "required": ["headline", "summary", "strengths", "weaknesses"]
        }),
        ReportSection::Colors => json!({
            "type": "object",
            "properties": {
                "palette": {
                    "type": "array",
                    "maxItems": 12,
                    "items": {
                        "type": "object",
                        "properties": {
                            "hex": { "type": "string", "pattern": "^#[0-9a-fA-F]{6}$" },
                            "name": { "type": "string" },
                            "role": { "type": "string" }
                        },
                        "required": ["hex", "name", "role"]
                    }
                },
                "harmony": { "type": "string" },
                "notes": { "type": "string" }
            },
            "required": ["palette", "harmony", "notes"]
        }),
        ReportSection::Typography => json!({
            "type": "object",
            "properties": {
                "classification": { "type": "string" },
                "characteristics": string_list(10),
                "pairing_suggestions": string_list(10),
                "notes": { "type": "string" }
            },
            "required": ["classification", "characteristics", "notes"]
        }),
        ReportSection::VisualLanguage => json!({
            "type": "object",
            "properties": {
                "style": { "type": "string" },
                "motifs": string_list(10),
                "mood": { "type": "string" },
                "applications": string_list(10)
            },
            "required": ["style", "motifs", "mood", "applications"]
        }),
    }
}

pub fn tool_name(section: ReportSection) -> String {
    format!("record_{}", section.as_str())
}

/// Task given to the model alongside the visual description.
pub fn instructions(section: ReportSection) -> &'static str {
    match section {
        ReportSection::Scoring => {
            "Score the logo from 0 to 100 on simplicity, memorability, timelessness, \
             versatility, relevance, distinctiveness and balance. Give a one-sentence \
             rationale for every score."
        }
        ReportSection::Summary => {
            "Write a short headline and a one-paragraph assessment of the logo, then list \
             its main strengths, weaknesses and concrete recommendations."
        }
        ReportSection::Colors => {
            "Describe the color palette: each color as a hex value with a name and its role \
             in the mark, the overall harmony, and notes on contrast and reproduction."
        }
        ReportSection::Typography => {
            "Classify any lettering in the logo, list its characteristics, suggest typefaces \
             that pair with it, and add notes on legibility."
        }
        ReportSection::VisualLanguage => {
            "Describe the visual language of the mark: its style, recurring motifs, mood, \
             and where the system can be applied across a brand."
        }
    }
}

pub const DESCRIPTION_PROMPT: &str = "Describe this logo in detail for a brand designer who \
cannot see it. Cover the overall composition, every shape and symbol, the colors (with \
approximate hex values), any lettering and its style, negative space, symmetry and balance, \
and how the mark would read at small sizes and in one color.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_schema_requires_every_criterion() {
        let schema = input_schema(ReportSection::Scoring);
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 7);
        assert!(schema["properties"]["balance"]["properties"]["score"].is_object());
    }

    #[test]
    fn test_tool_names_are_distinct() {
        let names: std::collections::HashSet<_> = [
            ReportSection::Scoring,
            ReportSection::Summary,
            ReportSection::Colors,
            ReportSection::Typography,
            ReportSection::VisualLanguage,
        ]
        .into_iter()
        .map(tool_name)
        .collect();
        assert_eq!(names.len(), 5);
    }
}
