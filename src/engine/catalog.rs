use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::badges::{self, BadgeDefinition, PERFECTIONIST};
use crate::engine::levels::LevelTable;
use crate::engine::missions::{self, MissionDefinition};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("level table is empty")]
    EmptyLevelTable,
    #[error("level table must start at level 1 with 0 XP (got level {level} at {xp_required} XP)")]
    FirstLevel { level: u32, xp_required: u64 },
    #[error("level {found} follows level {after}; levels must be consecutive")]
    LevelGap { after: u32, found: u32 },
    #[error("level {level} threshold {xp_required} is not above the previous {previous}")]
    ThresholdOrder {
        level: u32,
        xp_required: u64,
        previous: u64,
    },
    #[error("duplicate {kind} id {id:?}")]
    DuplicateId { kind: &'static str, id: String },
    #[error("mission {mission:?} rewards unknown badge {badge:?}")]
    UnknownRewardBadge { mission: String, badge: String },
    #[error("perfect score badge {0:?} is not in the badge catalog")]
    UnknownPerfectBadge(String),
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_perfect_score_badge() -> String {
    PERFECTIONIST.to_string()
}

/// Level, badge and mission tables. Immutable once built; share it behind an
/// `Arc` and swap in reduced catalogs for tests.
///
/// The TOML format uses camelCase keys throughout, like the learner
/// documents. Only rule `kind` values are snake_case.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default = "default_perfect_score_badge")]
    pub perfect_score_badge: String,
    pub levels: LevelTable,
    #[serde(default)]
    pub badges: Vec<BadgeDefinition>,
    #[serde(default)]
    pub missions: Vec<MissionDefinition>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            perfect_score_badge: default_perfect_score_badge(),
            levels: LevelTable::default(),
            badges: badges::default_badges(),
            missions: missions::default_missions(),
        }
    }
}

impl Catalog {
    pub fn new(
        levels: LevelTable,
        badges: Vec<BadgeDefinition>,
        missions: Vec<MissionDefinition>,
    ) -> Result<Self, CatalogError> {
        let catalog = Self {
            perfect_score_badge: default_perfect_score_badge(),
            levels,
            badges,
            missions,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Level table validity is enforced when the table is built; this checks
    /// the cross references.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut badge_ids = HashSet::new();
        for badge in &self.badges {
            if !badge_ids.insert(badge.id.as_str()) {
                return Err(CatalogError::DuplicateId {
                    kind: "badge",
                    id: badge.id.clone(),
                });
            }
        }
        let mut mission_ids = HashSet::new();
        for mission in &self.missions {
            if !mission_ids.insert(mission.id.as_str()) {
                return Err(CatalogError::DuplicateId {
                    kind: "mission",
                    id: mission.id.clone(),
                });
            }
            if let Some(badge) = &mission.reward.badge_id
                && !badge_ids.contains(badge.as_str())
            {
                return Err(CatalogError::UnknownRewardBadge {
                    mission: mission.id.clone(),
                    badge: badge.clone(),
                });
            }
        }
        if !badge_ids.contains(self.perfect_score_badge.as_str()) {
            return Err(CatalogError::UnknownPerfectBadge(
                self.perfect_score_badge.clone(),
            ));
        }
        Ok(())
    }

    pub fn badge(&self, id: &str) -> Option<&BadgeDefinition> {
        self.badges.iter().find(|b| b.id == id)
    }

    pub fn mission(&self, id: &str) -> Option<&MissionDefinition> {
        self.missions.iter().find(|m| m.id == id)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
