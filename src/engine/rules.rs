use serde::{Deserialize, Serialize};

use crate::store::schema::LearnerState;

/// Unlock condition for a badge or mission, expressed as data so catalogs can
/// be loaded, listed and tested rule by rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Rule {
    Always,
    /// Reserved id; the unlock path needs data outside the learner document.
    Disabled,
    /// Awarded directly by the transition pipeline, never by evaluation.
    Granted,
    QuizzesCompleted { min: usize },
    QuizCompleted { quiz_id: String },
    QuizPrefixCompleted { prefix: String, min: usize },
    XpAtLeast { min: u64 },
    LevelAtLeast { min: u32 },
    StreakAtLeast { min: u32 },
    BadgesAtLeast { min: usize },
    HasBadge { badge_id: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
}

impl Progress {
    fn toward(current: u64, total: u64) -> Self {
        Self {
            current: current.min(total),
            total,
        }
    }

    fn flag(done: bool) -> Self {
        Self::toward(u64::from(done), 1)
    }

    pub fn complete(self) -> Self {
        Self {
            current: self.total,
            total: self.total,
        }
    }
}

impl Rule {
    /// Rules the generic evaluators may fire.
    pub fn is_evaluated(&self) -> bool {
        !matches!(self, Rule::Disabled | Rule::Granted)
    }

    pub fn holds(&self, state: &LearnerState) -> bool {
        match self {
            Rule::Always => true,
            Rule::Disabled | Rule::Granted => false,
            Rule::QuizzesCompleted { min } => state.completed_quizzes.len() >= *min,
            Rule::QuizCompleted { quiz_id } => state.completed_quizzes.contains(quiz_id),
            Rule::QuizPrefixCompleted { prefix, min } => {
                count_with_prefix(state, prefix) >= *min
            }
            Rule::XpAtLeast { min } => state.xp >= *min,
            Rule::LevelAtLeast { min } => state.level >= *min,
            Rule::StreakAtLeast { min } => state.streak >= *min,
            Rule::BadgesAtLeast { min } => state.badges.len() >= *min,
            Rule::HasBadge { badge_id } => state.badges.contains(badge_id),
        }
    }

    /// How far the learner is toward satisfying the rule, for display.
    pub fn progress(&self, state: &LearnerState) -> Progress {
        match self {
            Rule::Always => Progress::flag(true),
            Rule::Disabled | Rule::Granted => Progress::flag(false),
            Rule::QuizzesCompleted { min } => {
                Progress::toward(state.completed_quizzes.len() as u64, *min as u64)
            }
            Rule::QuizCompleted { quiz_id } => {
                Progress::flag(state.completed_quizzes.contains(quiz_id))
            }
            Rule::QuizPrefixCompleted { prefix, min } => {
                Progress::toward(count_with_prefix(state, prefix) as u64, *min as u64)
            }
            Rule::XpAtLeast { min } => Progress::toward(state.xp, *min),
            Rule::LevelAtLeast { min } => {
                Progress::toward(u64::from(state.level), u64::from(*min))
            }
            Rule::StreakAtLeast { min } => {
                Progress::toward(u64::from(state.streak), u64::from(*min))
            }
            Rule::BadgesAtLeast { min } => {
                Progress::toward(state.badges.len() as u64, *min as u64)
            }
            Rule::HasBadge { badge_id } => Progress::flag(state.badges.contains(badge_id)),
        }
    }
}

fn count_with_prefix(state: &LearnerState, prefix: &str) -> usize {
    state
        .completed_quizzes
        .iter()
        .filter(|id| id.starts_with(prefix))
        .count()
}
