use serde::Serialize;

use crate::engine::badges;
use crate::engine::catalog::Catalog;
use crate::engine::missions;
use crate::error::ValidationError;
use crate::event::{ProgressEvent, QuizCompletion};
use crate::store::schema::LearnerState;

/// Accounting choices the catalog does not decide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Policy {
    /// Re-submitting an already completed quiz adds its XP and answer counts
    /// again. When false the repeat only re-runs the evaluators.
    pub allow_rescoring: bool,
    pub max_attempts: u32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            allow_rescoring: true,
            max_attempts: 5,
        }
    }
}

/// What a single transition newly awarded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grants {
    pub xp_gained: u64,
    pub previous_level: u32,
    pub badges: Vec<String>,
    pub missions: Vec<String>,
}

impl Grants {
    pub fn is_empty(&self) -> bool {
        self.xp_gained == 0 && self.badges.is_empty() && self.missions.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: LearnerState,
    pub grants: Grants,
}

/// Apply one event to a copy of `state` and run the evaluators.
///
/// Order: raw deltas, missions (to a fixpoint, rewards folded in), badges,
/// level. The input is untouched, so a rejected event has no effect.
pub fn apply(
    catalog: &Catalog,
    policy: &Policy,
    state: &LearnerState,
    event: &ProgressEvent,
) -> Result<Transition, ValidationError> {
    event.validate()?;

    let mut next = state.clone();
    let mut grants = Grants {
        previous_level: state.level,
        ..Grants::default()
    };

    match event {
        ProgressEvent::QuizCompleted(quiz) => {
            apply_quiz(catalog, policy, &mut next, &mut grants, quiz)
        }
        ProgressEvent::TermGuessed { term_id } => {
            next.correctly_answered_terms.insert(term_id.clone());
        }
        ProgressEvent::ProfileEdited(patch) => patch.apply_to(&mut next.profile),
        ProgressEvent::FieldsPatched(patch) => patch.apply_to(&mut next)?,
        ProgressEvent::LoggedIn { date } => next.record_login(*date),
    }

    apply_missions(catalog, &mut next, &mut grants);

    for id in badges::evaluate(&catalog.badges, &next) {
        next.badges.insert(id.clone());
        grants.badges.push(id);
    }

    next.level = catalog.levels.resolve_level(next.xp);
    // XP only grows and saturates at u64::MAX
    grants.xp_gained = next.xp.saturating_sub(state.xp);

    Ok(Transition {
        state: next,
        grants,
    })
}

fn apply_quiz(
    catalog: &Catalog,
    policy: &Policy,
    state: &mut LearnerState,
    grants: &mut Grants,
    quiz: &QuizCompletion,
) {
    let first_completion = !state.completed_quizzes.contains(&quiz.quiz_id);

    if first_completion || policy.allow_rescoring {
        state.add_xp(quiz.xp_gained, &catalog.levels);
        state.correct_answers = state.correct_answers.saturating_add(quiz.score);
        state.total_questions = state.total_questions.saturating_add(quiz.total_questions);
    } else {
        log::debug!("quiz {} already completed; not rescoring", quiz.quiz_id);
    }

    if first_completion {
        state.completed_quizzes.insert(quiz.quiz_id.clone());
        if quiz.is_perfect() && state.grant_badge(&catalog.perfect_score_badge) {
            grants.badges.push(catalog.perfect_score_badge.clone());
        }
    }
}

fn apply_missions(catalog: &Catalog, state: &mut LearnerState, grants: &mut Grants) {
    loop {
        let due: Vec<_> = missions::evaluate(&catalog.missions, state)
            .into_iter()
            .cloned()
            .collect();
        if due.is_empty() {
            return;
        }
        for mission in due {
            state.completed_missions.insert(mission.id.clone());
            if let Some(xp) = mission.reward.xp {
                state.add_xp(xp, &catalog.levels);
            }
            if let Some(badge) = &mission.reward.badge_id
                && state.grant_badge(badge)
            {
                grants.badges.push(badge.clone());
            }
            grants.missions.push(mission.id);
        }
    }
}
