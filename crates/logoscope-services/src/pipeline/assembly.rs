//! Stage C: merge section outputs into one report

use chrono::{DateTime, Utc};
use logoscope_core::{overall_score, AnalysisReport, PartialReport, Rating, ReportSection, Tier};

use super::stages::SectionOutput;

/// Why assembly could not produce a report, with whatever should be kept.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyFailure {
    pub reason: String,
    /// Present only when at least one mandatory section succeeded
    pub partial: Option<PartialReport>,
}

pub fn assemble(
    tier: Tier,
    description: String,
    outputs: Vec<SectionOutput>,
    now: DateTime<Utc>,
) -> Result<AnalysisReport, AssemblyFailure> {
    let mut partial = PartialReport {
        description: Some(description),
        ..Default::default()
    };

    for output in outputs {
        match output {
            SectionOutput::Scoring(scores) => partial.scores = Some(scores),
            SectionOutput::Summary(summary) => partial.summary = Some(summary),
            SectionOutput::Colors(colors) => partial.colors = Some(colors),
            SectionOutput::Typography(typography) => partial.typography = Some(typography),
            SectionOutput::VisualLanguage(visual) => partial.visual_language = Some(visual),
        }
    }

    let present = |section: &ReportSection| match section {
        ReportSection::Scoring => partial.scores.is_some(),
        ReportSection::Summary => partial.summary.is_some(),
        ReportSection::Colors => partial.colors.is_some(),
        ReportSection::Typography => partial.typography.is_some(),
        ReportSection::VisualLanguage => partial.visual_language.is_some(),
    };
    let missing: Vec<ReportSection> = tier
        .sections()
        .iter()
        .filter(|s| !present(s))
        .copied()
        .collect();

    let (scores, summary) = match (partial.scores.take(), partial.summary.take()) {
        (Some(scores), Some(summary)) => (scores, summary),
        (scores, summary) => {
            let failed_mandatory: Vec<&str> = missing
                .iter()
                .filter(|s| s.is_mandatory())
                .map(|s| s.as_str())
                .collect();
            let keep = scores.is_some() || summary.is_some();
            partial.scores = scores;
            partial.summary = summary;
            partial.failed_sections = missing;
            return Err(AssemblyFailure {
                reason: format!("Required sections failed: {}", failed_mandatory.join(", ")),
                partial: keep.then_some(partial),
            });
        }
    };

    let overall = overall_score(&scores);
    Ok(AnalysisReport {
        description: partial.description.unwrap_or_default(),
        overall_score: overall,
        rating: Rating::from_score(overall),
        scores,
        summary,
        colors: partial.colors,
        typography: partial.typography,
        visual_language: partial.visual_language,
        omitted_sections: missing,
        generated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::section_json;

    fn output(section: ReportSection) -> SectionOutput {
        SectionOutput::parse(section, section_json(section)).unwrap()
    }

    #[test]
    fn test_full_premium_report() {
        let outputs = Tier::Premium.sections().iter().map(|s| output(*s)).collect();
        let report = assemble(Tier::Premium, "desc".to_string(), outputs, Utc::now()).unwrap();

        assert!(report.colors.is_some());
        assert!(report.visual_language.is_some());
        assert!(report.omitted_sections.is_empty());
        assert_eq!(report.rating, Rating::from_score(report.overall_score));
    }

    #[test]
    fn test_optional_sections_degrade_by_omission() {
        let outputs = vec![
            output(ReportSection::Summary),
            output(ReportSection::Scoring),
            output(ReportSection::Colors),
        ];
        let report = assemble(Tier::Premium, "desc".to_string(), outputs, Utc::now()).unwrap();

        assert!(report.typography.is_none());
        assert_eq!(
            report.omitted_sections,
            vec![ReportSection::Typography, ReportSection::VisualLanguage]
        );
    }

    #[test]
    fn test_missing_mandatory_section_fails_with_partial() {
        let outputs = vec![output(ReportSection::Scoring), output(ReportSection::Colors)];
        let failure = assemble(Tier::Paid, "desc".to_string(), outputs, Utc::now()).unwrap_err();

        assert!(failure.reason.contains("summary"));
        let partial = failure.partial.unwrap();
        assert!(partial.scores.is_some());
        assert!(partial.colors.is_some());
        assert_eq!(
            partial.failed_sections,
            vec![ReportSection::Summary, ReportSection::Typography]
        );
    }

    #[test]
    fn test_no_mandatory_output_keeps_nothing() {
        let outputs = vec![output(ReportSection::Colors)];
        let failure = assemble(Tier::Paid, "desc".to_string(), outputs, Utc::now()).unwrap_err();
        assert!(failure.partial.is_none());
    }
}
