use serde::{Deserialize, Serialize};

use crate::engine::catalog::CatalogError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
    pub level: u32,
    pub name: String,
    pub xp_required: u64,
}

/// Ordered XP thresholds. Level 1 always starts at 0 XP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LevelInfo>", into = "Vec<LevelInfo>")]
pub struct LevelTable {
    levels: Vec<LevelInfo>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelProgress {
    pub percent: f64,
    pub xp_for_next_level: u64,
}

const DEFAULT_LEVELS: &[(&str, u64)] = &[
    ("prospect", 0),
    ("rookie", 100),
    ("starter", 250),
    ("specialist", 500),
    ("veteran", 1000),
    ("playmaker", 1750),
    ("trequartista", 2500),
    ("maestro", 5000),
    ("champion", 7500),
    ("legend", 10000),
];

impl LevelTable {
    pub fn new(levels: Vec<LevelInfo>) -> Result<Self, CatalogError> {
        let first = levels.first().ok_or(CatalogError::EmptyLevelTable)?;
        if first.level != 1 || first.xp_required != 0 {
            return Err(CatalogError::FirstLevel {
                level: first.level,
                xp_required: first.xp_required,
            });
        }
        for pair in levels.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.level != prev.level + 1 {
                return Err(CatalogError::LevelGap {
                    after: prev.level,
                    found: next.level,
                });
            }
            if next.xp_required <= prev.xp_required {
                return Err(CatalogError::ThresholdOrder {
                    level: next.level,
                    xp_required: next.xp_required,
                    previous: prev.xp_required,
                });
            }
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[LevelInfo] {
        &self.levels
    }

    pub fn max_level(&self) -> u32 {
        self.levels.last().map(|l| l.level).unwrap_or(1)
    }

    /// Highest level whose threshold is reached. Saturates at the last entry.
    pub fn resolve_level(&self, xp: u64) -> u32 {
        self.levels
            .iter()
            .rev()
            .find(|l| xp >= l.xp_required)
            .map(|l| l.level)
            .unwrap_or(1)
    }

    /// Info for `level`, clamped into the table's range.
    pub fn info(&self, level: u32) -> &LevelInfo {
        let index = level.clamp(1, self.max_level()) as usize - 1;
        &self.levels[index]
    }

    pub fn next(&self, level: u32) -> Option<&LevelInfo> {
        self.levels.iter().find(|l| l.level == level.saturating_add(1))
    }

    pub fn progress_toward_next(&self, xp: u64, level: u32) -> LevelProgress {
        let current = self.info(level);
        match self.next(current.level) {
            None => LevelProgress {
                percent: 100.0,
                xp_for_next_level: current.xp_required,
            },
            Some(next) => {
                let span = (next.xp_required - current.xp_required) as f64;
                let into = xp as f64 - current.xp_required as f64;
                LevelProgress {
                    percent: (into / span * 100.0).clamp(0.0, 100.0),
                    xp_for_next_level: next.xp_required,
                }
            }
        }
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        let levels = DEFAULT_LEVELS
            .iter()
            .zip(1u32..)
            .map(|(&(name, xp_required), level)| LevelInfo {
                level,
                name: name.to_string(),
                xp_required,
            })
            .collect();
        Self { levels }
    }
}

impl TryFrom<Vec<LevelInfo>> for LevelTable {
    type Error = CatalogError;

    fn try_from(levels: Vec<LevelInfo>) -> Result<Self, Self::Error> {
        Self::new(levels)
    }
}

impl From<LevelTable> for Vec<LevelInfo> {
    fn from(table: LevelTable) -> Self {
        table.levels
    }
}
