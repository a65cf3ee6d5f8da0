use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::store::schema::{Foot, LearnerState, Position, Profile};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizCompletion {
    pub quiz_id: String,
    pub score: u32,
    pub xp_gained: u64,
    pub total_questions: u32,
}

impl QuizCompletion {
    pub fn is_perfect(&self) -> bool {
        self.score == self.total_questions
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub team: Option<String>,
    pub avatar: Option<String>,
    pub team_logo: Option<String>,
    pub position: Option<Position>,
    pub preferred_foot: Option<Foot>,
}

impl ProfilePatch {
    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(name) = &self.name {
            profile.name = name.trim().to_string();
        }
        if let Some(team) = &self.team {
            profile.team = team.clone();
        }
        if let Some(avatar) = &self.avatar {
            profile.avatar = avatar.clone();
        }
        if let Some(team_logo) = &self.team_logo {
            profile.team_logo = team_logo.clone();
        }
        if let Some(position) = self.position {
            profile.position = position;
        }
        if let Some(foot) = self.preferred_foot {
            profile.preferred_foot = foot;
        }
    }
}

/// Narrow field updates. XP, level, badges, quizzes and missions are only
/// changed by the pipeline and cannot be patched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsPatch {
    pub streak: Option<u32>,
    pub last_login_date: Option<NaiveDate>,
    pub penalties_taken: Option<u32>,
    pub penalties_scored: Option<u32>,
    pub penalties_faced: Option<u32>,
    pub penalties_saved: Option<u32>,
    /// Merged into the existing set; terms are never forgotten.
    #[serde(default)]
    pub correctly_answered_terms: BTreeSet<String>,
}

impl StatsPatch {
    pub fn apply_to(&self, state: &mut LearnerState) -> Result<(), ValidationError> {
        if let Some(streak) = self.streak {
            state.streak = streak;
        }
        if let Some(date) = self.last_login_date {
            state.last_login_date = Some(date);
        }
        if let Some(n) = self.penalties_taken {
            state.penalties_taken = n;
        }
        if let Some(n) = self.penalties_scored {
            state.penalties_scored = n;
        }
        if let Some(n) = self.penalties_faced {
            state.penalties_faced = n;
        }
        if let Some(n) = self.penalties_saved {
            state.penalties_saved = n;
        }
        state
            .correctly_answered_terms
            .extend(self.correctly_answered_terms.iter().cloned());

        if state.penalties_scored > state.penalties_taken {
            return Err(ValidationError::PenaltyTally {
                made_field: "penaltiesScored",
                made: state.penalties_scored,
                attempted_field: "penaltiesTaken",
                attempted: state.penalties_taken,
            });
        }
        if state.penalties_saved > state.penalties_faced {
            return Err(ValidationError::PenaltyTally {
                made_field: "penaltiesSaved",
                made: state.penalties_saved,
                attempted_field: "penaltiesFaced",
                attempted: state.penalties_faced,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    QuizCompleted(QuizCompletion),
    TermGuessed { term_id: String },
    ProfileEdited(ProfilePatch),
    FieldsPatched(StatsPatch),
    LoggedIn { date: NaiveDate },
}

fn require_id(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::BlankId { field })
    } else {
        Ok(())
    }
}

impl ProgressEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::QuizCompleted(_) => "quiz_completed",
            ProgressEvent::TermGuessed { .. } => "term_guessed",
            ProgressEvent::ProfileEdited(_) => "profile_edited",
            ProgressEvent::FieldsPatched(_) => "fields_patched",
            ProgressEvent::LoggedIn { .. } => "logged_in",
        }
    }

    /// Checks that need no stored state. Penalty tallies are checked against
    /// the merged document when the patch is applied.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            ProgressEvent::QuizCompleted(quiz) => {
                require_id(&quiz.quiz_id, "quizId")?;
                if quiz.total_questions == 0 {
                    return Err(ValidationError::NoQuestions {
                        quiz_id: quiz.quiz_id.clone(),
                    });
                }
                if quiz.score > quiz.total_questions {
                    return Err(ValidationError::ScoreExceedsTotal {
                        score: quiz.score,
                        total_questions: quiz.total_questions,
                    });
                }
                Ok(())
            }
            ProgressEvent::TermGuessed { term_id } => require_id(term_id, "termId"),
            ProgressEvent::ProfileEdited(patch) => match &patch.name {
                Some(name) if name.trim().is_empty() => Err(ValidationError::BlankName),
                _ => Ok(()),
            },
            ProgressEvent::FieldsPatched(patch) => patch
                .correctly_answered_terms
                .iter()
                .try_for_each(|term| require_id(term, "correctlyAnsweredTerms")),
            ProgressEvent::LoggedIn { .. } => Ok(()),
        }
    }
}
