use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::Range;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::rating::Rating;

pub const CURATION_HOME_CAPACITY: usize = 3;
pub const CURATION_GALLERY_CAPACITY: usize = 6;

/// One of the two placement lists. Each owns a disjoint band of positions in the
/// same ordered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CurationList {
    Home,
    Gallery,
}

impl CurationList {
    pub fn positions(&self) -> Range<i32> {
        match self {
            CurationList::Home => 0..100,
            CurationList::Gallery => 100..200,
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            CurationList::Home => CURATION_HOME_CAPACITY,
            CurationList::Gallery => CURATION_GALLERY_CAPACITY,
        }
    }

    pub fn from_position(position: i32) -> Option<Self> {
        [CurationList::Home, CurationList::Gallery]
            .into_iter()
            .find(|list| list.positions().contains(&position))
    }
}

impl Display for CurationList {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            CurationList::Home => write!(f, "home"),
            CurationList::Gallery => write!(f, "gallery"),
        }
    }
}

impl FromStr for CurationList {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(CurationList::Home),
            "gallery" => Ok(CurationList::Gallery),
            _ => Err(anyhow::anyhow!("Invalid curation list: {}", s)),
        }
    }
}

/// A stored placement row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurationSlot {
    pub position: i32,
    pub analysis_id: Uuid,
}

/// Public listing entry for a curated analysis.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurationEntry {
    pub position: i32,
    pub analysis_id: Uuid,
    pub name: String,
    pub author: Option<String>,
    pub overall_score: Option<u8>,
    pub rating: Option<Rating>,
    pub asset_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_are_disjoint() {
        let home = CurationList::Home.positions();
        let gallery = CurationList::Gallery.positions();
        assert!(home.end <= gallery.start);
        assert_eq!(CurationList::from_position(2), Some(CurationList::Home));
        assert_eq!(CurationList::from_position(105), Some(CurationList::Gallery));
        assert_eq!(CurationList::from_position(250), None);
    }
}
