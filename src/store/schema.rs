use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::levels::LevelTable;

pub const WELCOME_BADGE: &str = "welcome";

const DEFAULT_NAME: &str = "New Player";
const DEFAULT_TEAM: &str = "Digital Champions";
const PLACEHOLDER_IMAGE: &str = "https://placehold.co/128x128.png";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defender,
    #[default]
    Midfielder,
    Forward,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Foot {
    Left,
    #[default]
    Right,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub team: String,
    pub avatar: String,
    pub team_logo: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub preferred_foot: Foot,
}

/// What the authentication collaborator knows about a new learner.
#[derive(Clone, Debug, Default)]
pub struct Identity {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// The persisted per-learner document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerState {
    pub profile: Profile,
    pub xp: u64,
    pub level: u32,
    #[serde(default)]
    pub completed_quizzes: BTreeSet<String>,
    #[serde(default)]
    pub correct_answers: u32,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub badges: BTreeSet<String>,
    #[serde(default)]
    pub streak: u32,
    #[serde(default, alias = "lastLogin")]
    pub last_login_date: Option<NaiveDate>,
    #[serde(default)]
    pub penalties_taken: u32,
    #[serde(default)]
    pub penalties_scored: u32,
    #[serde(default)]
    pub penalties_faced: u32,
    #[serde(default)]
    pub penalties_saved: u32,
    #[serde(default)]
    pub completed_missions: BTreeSet<String>,
    #[serde(default)]
    pub correctly_answered_terms: BTreeSet<String>,
    #[serde(default)]
    pub unread_messages: bool,
}

impl LearnerState {
    /// Seed document for a learner's first sign-in.
    pub fn initial(identity: &Identity, today: NaiveDate) -> Self {
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            profile: Profile {
                name: non_blank(&identity.display_name).unwrap_or_else(|| DEFAULT_NAME.to_string()),
                team: DEFAULT_TEAM.to_string(),
                avatar: non_blank(&identity.photo_url)
                    .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
                team_logo: PLACEHOLDER_IMAGE.to_string(),
                position: Position::default(),
                preferred_foot: Foot::default(),
            },
            xp: 0,
            level: 1,
            completed_quizzes: BTreeSet::new(),
            correct_answers: 0,
            total_questions: 0,
            badges: BTreeSet::from([WELCOME_BADGE.to_string()]),
            streak: 1,
            last_login_date: Some(today),
            penalties_taken: 0,
            penalties_scored: 0,
            penalties_faced: 0,
            penalties_saved: 0,
            completed_missions: BTreeSet::new(),
            correctly_answered_terms: BTreeSet::new(),
            unread_messages: false,
        }
    }

    /// Add XP and keep `level` in step with it.
    pub fn add_xp(&mut self, amount: u64, levels: &LevelTable) {
        self.xp = self.xp.saturating_add(amount);
        self.level = levels.resolve_level(self.xp);
    }

    /// Returns true if the badge was not owned before.
    pub fn grant_badge(&mut self, id: &str) -> bool {
        self.badges.insert(id.to_string())
    }

    /// Advance the daily login streak. Same-day logins change nothing.
    pub fn record_login(&mut self, date: NaiveDate) {
        match self.last_login_date {
            Some(last) if last == date => return,
            Some(last) if last.succ_opt() == Some(date) => {
                self.streak = self.streak.saturating_add(1);
            }
            _ => self.streak = 1,
        }
        self.last_login_date = Some(date);
    }
}
