use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::engine::catalog::Catalog;
use crate::engine::missions::{self, MissionStatus};
use crate::engine::stats::{self, DerivedStats};
use crate::engine::transition::{self, Grants, Policy};
use crate::error::ProgressionError;
use crate::event::{ProfilePatch, ProgressEvent, QuizCompletion, StatsPatch};
use crate::store::document::{DocumentStore, Precondition, StoreError, Versioned};
use crate::store::schema::{Identity, LearnerState};

/// Everything the UI needs after a read or a transition.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub state: LearnerState,
    pub stats: DerivedStats,
    pub grants: Grants,
}

impl ProgressView {
    fn new(state: LearnerState, grants: Grants, catalog: &Catalog) -> Self {
        let stats = stats::derive(&state, &catalog.levels);
        Self {
            state,
            stats,
            grants,
        }
    }
}

/// Runs learner transitions against a document store.
///
/// Each transition is an optimistic transaction: read the document and its
/// version, compute the whole pipeline, write conditioned on that version,
/// and start over from a fresh read if someone else wrote first.
pub struct Progression<S> {
    store: S,
    catalog: Arc<Catalog>,
    policy: Policy,
}

impl<S: DocumentStore> Progression<S> {
    pub fn new(store: S, catalog: Arc<Catalog>, policy: Policy) -> Self {
        Self {
            store,
            catalog,
            policy,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create the learner's document unless one already exists.
    pub fn seed(
        &self,
        learner_id: &str,
        identity: &Identity,
        today: NaiveDate,
    ) -> Result<ProgressView, ProgressionError> {
        let state = LearnerState::initial(identity, today);
        let document = serde_json::to_value(&state).map_err(StoreError::from);
        let written = document.and_then(|doc| {
            self.store
                .set(learner_id, doc, false, Precondition::Absent)
        });
        match written {
            Ok(_) => {
                log::info!("seeded learner {learner_id}");
                Ok(ProgressView::new(state, Grants::default(), &self.catalog))
            }
            Err(StoreError::AlreadyExists { .. }) => {
                log::debug!("learner {learner_id} already seeded");
                self.view(learner_id)
            }
            Err(err) => Err(ProgressionError::from_store(learner_id, err)),
        }
    }

    pub fn view(&self, learner_id: &str) -> Result<ProgressView, ProgressionError> {
        let current = self.load(learner_id)?;
        Ok(ProgressView::new(
            current.value,
            Grants::default(),
            &self.catalog,
        ))
    }

    pub fn mission_board(&self, learner_id: &str) -> Result<Vec<MissionStatus>, ProgressionError> {
        let current = self.load(learner_id)?;
        Ok(missions::board(&self.catalog.missions, &current.value))
    }

    pub fn complete_quiz(
        &self,
        learner_id: &str,
        completion: QuizCompletion,
    ) -> Result<ProgressView, ProgressionError> {
        self.transact(learner_id, ProgressEvent::QuizCompleted(completion))
    }

    pub fn complete_term_guess(
        &self,
        learner_id: &str,
        term_id: &str,
    ) -> Result<ProgressView, ProgressionError> {
        self.transact(
            learner_id,
            ProgressEvent::TermGuessed {
                term_id: term_id.to_string(),
            },
        )
    }

    pub fn update_profile(
        &self,
        learner_id: &str,
        patch: ProfilePatch,
    ) -> Result<ProgressView, ProgressionError> {
        self.transact(learner_id, ProgressEvent::ProfileEdited(patch))
    }

    pub fn patch_fields(
        &self,
        learner_id: &str,
        patch: StatsPatch,
    ) -> Result<ProgressView, ProgressionError> {
        self.transact(learner_id, ProgressEvent::FieldsPatched(patch))
    }

    pub fn record_login(
        &self,
        learner_id: &str,
        date: NaiveDate,
    ) -> Result<ProgressView, ProgressionError> {
        self.transact(learner_id, ProgressEvent::LoggedIn { date })
    }

    /// Flag owned by the messaging collaborator. No rule reads it, so it is a
    /// plain field update; the version bump still makes concurrent
    /// transitions re-read.
    pub fn set_unread_messages(
        &self,
        learner_id: &str,
        unread: bool,
    ) -> Result<(), ProgressionError> {
        let mut fields = Map::new();
        fields.insert("unreadMessages".to_string(), Value::Bool(unread));
        self.store
            .update(learner_id, fields)
            .map(|_| ())
            .map_err(|err| ProgressionError::from_store(learner_id, err))
    }

    /// Run `event` through the full pipeline as one optimistic transaction.
    pub fn transact(
        &self,
        learner_id: &str,
        event: ProgressEvent,
    ) -> Result<ProgressView, ProgressionError> {
        event.validate()?;

        let attempts = self.policy.max_attempts.max(1);
        let mut last_known = None;
        for attempt in 1..=attempts {
            let current = self.load(learner_id)?;
            let transition =
                transition::apply(&self.catalog, &self.policy, &current.value, &event)?;

            let document = serde_json::to_value(&transition.state)
                .map_err(|err| ProgressionError::Store(err.into()))?;
            match self.store.set(
                learner_id,
                document,
                true,
                Precondition::Version(current.version),
            ) {
                Ok(version) => {
                    log_committed(learner_id, &event, version, &transition.grants);
                    return Ok(ProgressView::new(
                        transition.state,
                        transition.grants,
                        &self.catalog,
                    ));
                }
                Err(StoreError::Conflict { found, .. }) => {
                    log::debug!(
                        "{} for {learner_id}: version {} superseded by {found:?} (attempt {attempt}/{attempts})",
                        event.kind(),
                        current.version,
                    );
                    last_known = Some(current.value);
                }
                Err(err) => return Err(ProgressionError::from_store(learner_id, err)),
            }
        }

        log::warn!(
            "{} for {learner_id} gave up after {attempts} conflicting writes",
            event.kind()
        );
        Err(ProgressionError::Conflict {
            learner_id: learner_id.to_string(),
            attempts,
            last_known: last_known.map(|state| {
                Box::new(ProgressView::new(state, Grants::default(), &self.catalog))
            }),
        })
    }

    fn load(&self, learner_id: &str) -> Result<Versioned<LearnerState>, ProgressionError> {
        let doc = self
            .store
            .get(learner_id)
            .map_err(|err| ProgressionError::from_store(learner_id, err))?;
        let mut state: LearnerState = serde_json::from_value(doc.value)
            .map_err(|err| ProgressionError::Store(err.into()))?;
        // stale if written under another level table
        state.level = self.catalog.levels.resolve_level(state.xp);
        Ok(Versioned {
            version: doc.version,
            value: state,
        })
    }
}

fn log_committed(learner_id: &str, event: &ProgressEvent, version: u64, grants: &Grants) {
    log::info!(
        "{} for {learner_id} committed at version {version} (+{} xp)",
        event.kind(),
        grants.xp_gained
    );
    for mission in &grants.missions {
        log::info!("{learner_id} completed mission {mission}");
    }
    for badge in &grants.badges {
        log::info!("{learner_id} earned badge {badge}");
    }
}
