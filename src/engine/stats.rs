use serde::Serialize;

use crate::engine::levels::{LevelInfo, LevelTable};
use crate::store::schema::{LearnerState, Position};

/// Read-side view computed from a learner document. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedStats {
    pub accuracy: u32,
    pub badges_earned: usize,
    pub level_progress: f64,
    pub xp_for_next_level: u64,
    pub current_level: LevelInfo,
    pub next_level: Option<LevelInfo>,
    pub penalty_success_rate: u32,
}

/// Rounded percentage; 0 when there is nothing to divide by.
pub fn percentage(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (f64::from(part) / f64::from(whole) * 100.0).round() as u32
}

/// The level comes from XP, not the stored field, so a document written under
/// another level table still reads consistently.
pub fn derive(state: &LearnerState, levels: &LevelTable) -> DerivedStats {
    let current_level = levels.info(levels.resolve_level(state.xp)).clone();
    let progress = levels.progress_toward_next(state.xp, current_level.level);
    let penalty_success_rate = match state.profile.position {
        Position::Goalkeeper => percentage(state.penalties_saved, state.penalties_faced),
        _ => percentage(state.penalties_scored, state.penalties_taken),
    };

    DerivedStats {
        accuracy: percentage(state.correct_answers, state.total_questions),
        badges_earned: state.badges.len(),
        level_progress: progress.percent,
        xp_for_next_level: progress.xp_for_next_level,
        next_level: levels.next(current_level.level).cloned(),
        current_level,
        penalty_success_rate,
    }
}
