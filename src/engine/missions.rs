use serde::{Deserialize, Serialize};

use crate::engine::rules::{Progress, Rule};
use crate::store::schema::LearnerState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionCategory {
    Daily,
    Weekly,
    Special,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionReward {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionDefinition {
    pub id: String,
    pub category: MissionCategory,
    pub rule: Rule,
    #[serde(default)]
    pub reward: MissionReward,
}

/// One row of the mission list shown to the learner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionStatus {
    pub id: String,
    pub category: MissionCategory,
    pub completed: bool,
    pub progress: Progress,
    pub reward: MissionReward,
}

impl MissionDefinition {
    pub fn is_completed(&self, state: &LearnerState) -> bool {
        state.completed_missions.contains(&self.id)
    }

    /// Read-only; completed missions always report a full bar.
    pub fn progress(&self, state: &LearnerState) -> Progress {
        let progress = self.rule.progress(state);
        if self.is_completed(state) {
            progress.complete()
        } else {
            progress
        }
    }
}

/// Missions not yet completed whose rule holds. Completed missions are never
/// re-evaluated.
pub fn evaluate<'a>(
    missions: &'a [MissionDefinition],
    state: &LearnerState,
) -> Vec<&'a MissionDefinition> {
    missions
        .iter()
        .filter(|m| m.rule.is_evaluated())
        .filter(|m| !m.is_completed(state) && m.rule.holds(state))
        .collect()
}

pub fn board(missions: &[MissionDefinition], state: &LearnerState) -> Vec<MissionStatus> {
    missions
        .iter()
        .map(|m| MissionStatus {
            id: m.id.clone(),
            category: m.category,
            completed: m.is_completed(state),
            progress: m.progress(state),
            reward: m.reward.clone(),
        })
        .collect()
}

pub fn default_missions() -> Vec<MissionDefinition> {
    vec![
        MissionDefinition {
            id: "completeOneQuiz".to_string(),
            category: MissionCategory::Daily,
            rule: Rule::QuizzesCompleted { min: 1 },
            reward: MissionReward {
                xp: Some(50),
                badge_id: None,
            },
        },
        MissionDefinition {
            id: "completeTacticsQuiz".to_string(),
            category: MissionCategory::Daily,
            rule: Rule::QuizPrefixCompleted {
                prefix: "tactics".to_string(),
                min: 1,
            },
            reward: MissionReward {
                xp: Some(75),
                badge_id: Some("tacticsExpert".to_string()),
            },
        },
    ]
}
