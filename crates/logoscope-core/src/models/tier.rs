use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

/// Analysis tier chosen at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Paid,
    Premium,
}

/// A section of the generated report, each produced by one extraction call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportSection {
    Scoring,
    Summary,
    Colors,
    Typography,
    VisualLanguage,
}

impl ReportSection {
    /// Scoring and summary must succeed for an analysis to complete.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, ReportSection::Scoring | ReportSection::Summary)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportSection::Scoring => "scoring",
            ReportSection::Summary => "summary",
            ReportSection::Colors => "colors",
            ReportSection::Typography => "typography",
            ReportSection::VisualLanguage => "visual_language",
        }
    }
}

impl Display for ReportSection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Static pricing and content entry for a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierInfo {
    pub tier: Tier,
    pub payable: bool,
    pub price_cents: i64,
    pub currency: &'static str,
    pub label: &'static str,
    pub sections: &'static [ReportSection],
}

const FREE_SECTIONS: &[ReportSection] = &[ReportSection::Scoring, ReportSection::Summary];
const PAID_SECTIONS: &[ReportSection] = &[
    ReportSection::Scoring,
    ReportSection::Summary,
    ReportSection::Colors,
    ReportSection::Typography,
];
const PREMIUM_SECTIONS: &[ReportSection] = &[
    ReportSection::Scoring,
    ReportSection::Summary,
    ReportSection::Colors,
    ReportSection::Typography,
    ReportSection::VisualLanguage,
];

pub static TIER_TABLE: [TierInfo; 3] = [
    TierInfo {
        tier: Tier::Free,
        payable: false,
        price_cents: 0,
        currency: "usd",
        label: "Free score check",
        sections: FREE_SECTIONS,
    },
    TierInfo {
        tier: Tier::Paid,
        payable: true,
        price_cents: 1900,
        currency: "usd",
        label: "Full brand analysis",
        sections: PAID_SECTIONS,
    },
    TierInfo {
        tier: Tier::Premium,
        payable: true,
        price_cents: 4900,
        currency: "usd",
        label: "Brand system deep dive",
        sections: PREMIUM_SECTIONS,
    },
];

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Paid => "paid",
            Tier::Premium => "premium",
        }
    }

    pub fn info(&self) -> &'static TierInfo {
        match self {
            Tier::Free => &TIER_TABLE[0],
            Tier::Paid => &TIER_TABLE[1],
            Tier::Premium => &TIER_TABLE[2],
        }
    }

    pub fn is_payable(&self) -> bool {
        self.info().payable
    }

    /// Report sections generated for this tier, mandatory ones first.
    pub fn sections(&self) -> &'static [ReportSection] {
        self.info().sections
    }

    /// Non-owners of a free analysis only ever see its scores.
    pub fn shows_full_report_publicly(&self) -> bool {
        !matches!(self, Tier::Free)
    }
}

impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "paid" => Ok(Tier::Paid),
            "premium" => Ok(Tier::Premium),
            _ => Err(anyhow::anyhow!("Invalid tier: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_tier_is_not_payable() {
        assert!(!Tier::Free.is_payable());
        assert!(Tier::Paid.is_payable());
        assert!(Tier::Premium.is_payable());
    }

    #[test]
    fn test_sections_grow_with_tier() {
        assert_eq!(Tier::Free.sections().len(), 2);
        assert!(Tier::Paid.sections().contains(&ReportSection::Colors));
        assert!(!Tier::Paid.sections().contains(&ReportSection::VisualLanguage));
        assert!(Tier::Premium
            .sections()
            .contains(&ReportSection::VisualLanguage));
        for tier in [Tier::Free, Tier::Paid, Tier::Premium] {
            assert!(tier.sections().iter().filter(|s| s.is_mandatory()).count() == 2);
        }
    }

    #[test]
    fn test_tier_parse() {
        assert_eq!("Premium".parse::<Tier>().unwrap(), Tier::Premium);
        assert!("gold".parse::<Tier>().is_err());
    }
}
