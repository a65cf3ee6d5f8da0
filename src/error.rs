use thiserror::Error;

use crate::coordinator::ProgressView;
use crate::store::document::StoreError;

/// Rejected events. Raised before anything is read or written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be blank")]
    BlankId { field: &'static str },
    #[error("score {score} exceeds the {total_questions} questions asked")]
    ScoreExceedsTotal { score: u32, total_questions: u32 },
    #[error("quiz {quiz_id:?} reported no questions")]
    NoQuestions { quiz_id: String },
    #[error("profile name must not be blank")]
    BlankName,
    #[error("{made} {made_field} exceeds {attempted} {attempted_field}")]
    PenaltyTally {
        made_field: &'static str,
        made: u32,
        attempted_field: &'static str,
        attempted: u32,
    },
}

#[derive(Debug, Error)]
pub enum ProgressionError {
    #[error("invalid event: {0}")]
    Validation(#[from] ValidationError),
    #[error("no progression record for learner {learner_id:?}")]
    NotFound { learner_id: String },
    #[error("update for learner {learner_id:?} still conflicted after {attempts} attempts")]
    Conflict {
        learner_id: String,
        attempts: u32,
        /// The last state read from the store, still valid for display.
        last_known: Option<Box<ProgressView>>,
    },
    #[error("document store error: {0}")]
    Store(#[source] StoreError),
}

impl ProgressionError {
    pub(crate) fn from_store(learner_id: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ProgressionError::NotFound {
                learner_id: learner_id.to_string(),
            },
            other => ProgressionError::Store(other),
        }
    }

    /// Whether offering the same action again may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ProgressionError::Conflict { .. } => true,
            ProgressionError::Store(err) => err.is_transient(),
            ProgressionError::Validation(_) | ProgressionError::NotFound { .. } => false,
        }
    }
}
