use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{Days, NaiveDate};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value, json};
use tempfile::TempDir;

use campione::store::json_store::JsonStore;
use campione::store::memory_store::MemoryStore;
use campione::{
    Catalog, DocumentStore, Identity, Policy, Precondition, ProfilePatch, ProgressEvent,
    Progression, ProgressionError, QuizCompletion, StatsPatch, StoreError, ValidationError,
    Version, Versioned,
};

const LEARNER: &str = "learner-1";

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

fn quiz(id: &str, score: u32, xp_gained: u64, total_questions: u32) -> QuizCompletion {
    QuizCompletion {
        quiz_id: id.to_string(),
        score,
        xp_gained,
        total_questions,
    }
}

fn seeded<S: DocumentStore>(store: S, policy: Policy) -> Progression<S> {
    let progression = Progression::new(store, Arc::new(Catalog::default()), policy);
    progression
        .seed(LEARNER, &Identity::default(), day(1))
        .unwrap();
    progression
}

/// Runs `interference` against the inner store right before each
/// versioned write, as if another device got there first.
struct RacingStore<'a> {
    inner: &'a MemoryStore,
    interference: Mutex<Box<dyn FnMut(&MemoryStore) + Send + 'a>>,
}

impl<'a> RacingStore<'a> {
    fn new(inner: &'a MemoryStore, interference: impl FnMut(&MemoryStore) + Send + 'a) -> Self {
        Self {
            inner,
            interference: Mutex::new(Box::new(interference)),
        }
    }
}

impl DocumentStore for RacingStore<'_> {
    fn get(&self, key: &str) -> Result<Versioned<Value>, StoreError> {
        self.inner.get(key)
    }

    fn set(
        &self,
        key: &str,
        document: Value,
        merge: bool,
        precondition: Precondition,
    ) -> Result<Version, StoreError> {
        if let Precondition::Version(_) = precondition {
            let mut interfere = self.interference.lock().unwrap();
            interfere(self.inner);
        }
        self.inner.set(key, document, merge, precondition)
    }

    fn update(&self, key: &str, fields: Map<String, Value>) -> Result<Version, StoreError> {
        self.inner.update(key, fields)
    }
}

/// Fails every write with a transient error.
struct UnavailableStore<'a>(&'a MemoryStore);

impl DocumentStore for UnavailableStore<'_> {
    fn get(&self, key: &str) -> Result<Versioned<Value>, StoreError> {
        self.0.get(key)
    }

    fn set(&self, _: &str, _: Value, _: bool, _: Precondition) -> Result<Version, StoreError> {
        Err(StoreError::Unavailable("backend offline".to_string()))
    }

    fn update(&self, _: &str, _: Map<String, Value>) -> Result<Version, StoreError> {
        Err(StoreError::Unavailable("backend offline".to_string()))
    }
}

fn presence(value: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("presence".to_string(), json!(value));
    fields
}

#[test]
fn test_first_perfect_quiz_scenario() {
    let p = seeded(MemoryStore::new(), Policy::default());
    let view = p.complete_quiz(LEARNER, quiz("rules_1", 5, 50, 5)).unwrap();
    let state = &view.state;

    // quiz XP plus the completeOneQuiz reward
    assert_eq!(state.xp, 100);
    assert_eq!(state.level, 2);
    assert_eq!(state.completed_quizzes.len(), 1);
    assert!(state.completed_quizzes.contains("rules_1"));
    assert!(state.completed_missions.contains("completeOneQuiz"));
    assert!(state.badges.contains("welcome"));
    assert!(state.badges.contains("perfectionist"));
    assert_eq!(view.stats.accuracy, 100);
    assert_eq!(view.stats.current_level.level, 2);
    assert_eq!(view.grants.previous_level, 1);
}

#[test]
fn test_tactics_quiz_scenario() {
    let p = seeded(MemoryStore::new(), Policy::default());
    p.complete_quiz(LEARNER, quiz("rules_1", 5, 50, 5)).unwrap();
    let view = p.complete_quiz(LEARNER, quiz("tactics_1", 3, 80, 5)).unwrap();
    let state = &view.state;

    // 100 + 80 + the completeTacticsQuiz reward
    assert_eq!(state.xp, 255);
    assert_eq!(state.level, 3);
    assert!(state.badges.contains("tacticsExpert"));
    assert!(state.completed_missions.contains("completeTacticsQuiz"));
    assert_eq!(view.stats.accuracy, 80);
    assert!(view.grants.missions.iter().any(|m| m == "completeTacticsQuiz"));
    assert!(!view.grants.missions.iter().any(|m| m == "completeOneQuiz"));
}

#[test]
fn test_rescoring_policy_branches() {
    let allow = seeded(MemoryStore::new(), Policy::default());
    allow.complete_quiz(LEARNER, quiz("history_1", 2, 30, 5)).unwrap();
    let again = allow.complete_quiz(LEARNER, quiz("history_1", 4, 30, 5)).unwrap();
    assert_eq!(again.state.xp, 30 + 50 + 30);
    assert_eq!(again.state.correct_answers, 6);
    assert_eq!(again.state.total_questions, 10);

    let deny = seeded(
        MemoryStore::new(),
        Policy {
            allow_rescoring: false,
            ..Policy::default()
        },
    );
    let first = deny.complete_quiz(LEARNER, quiz("history_1", 2, 30, 5)).unwrap();
    let again = deny.complete_quiz(LEARNER, quiz("history_1", 4, 30, 5)).unwrap();
    assert_eq!(again.state, first.state);
    assert!(again.grants.is_empty());
}

#[test]
fn test_oversized_xp_award_saturates() {
    let p = seeded(MemoryStore::new(), Policy::default());
    let view = p
        .complete_quiz(LEARNER, quiz("rules_1", 1, u64::MAX, 5))
        .unwrap();
    assert_eq!(view.state.xp, u64::MAX);
    assert_eq!(view.grants.xp_gained, u64::MAX);
    assert_eq!(view.state.level, 10);
    assert!(view.state.completed_missions.contains("completeOneQuiz"));

    let view = p.complete_quiz(LEARNER, quiz("tactics_1", 2, 80, 5)).unwrap();
    assert_eq!(view.state.xp, u64::MAX);
    assert_eq!(view.grants.xp_gained, 0);
}

#[test]
fn test_unknown_learner_is_not_created() {
    let store = MemoryStore::new();
    let p = Progression::new(&store, Arc::new(Catalog::default()), Policy::default());
    let err = p.record_login("nobody", day(2)).unwrap_err();
    assert!(matches!(err, ProgressionError::NotFound { .. }));
    assert!(store.is_empty());
}

#[test]
fn test_rejected_events_leave_document_untouched() {
    let store = MemoryStore::new();
    let p = seeded(&store, Policy::default());
    let before = store.get(LEARNER).unwrap();

    let err = p
        .complete_quiz(LEARNER, quiz("rules_1", 6, 50, 5))
        .unwrap_err();
    assert!(matches!(
        err,
        ProgressionError::Validation(ValidationError::ScoreExceedsTotal { .. })
    ));

    let err = p
        .update_profile(
            LEARNER,
            ProfilePatch {
                name: Some("   ".to_string()),
                ..ProfilePatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ProgressionError::Validation(ValidationError::BlankName)));

    // tally checked against the stored counters
    p.patch_fields(
        LEARNER,
        StatsPatch {
            penalties_taken: Some(4),
            penalties_scored: Some(3),
            ..StatsPatch::default()
        },
    )
    .unwrap();
    let mid = store.get(LEARNER).unwrap();
    let err = p
        .patch_fields(
            LEARNER,
            StatsPatch {
                penalties_taken: Some(2),
                ..StatsPatch::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ProgressionError::Validation(ValidationError::PenaltyTally { .. })
    ));

    assert_eq!(mid.version, before.version + 1);
    assert_eq!(store.get(LEARNER).unwrap(), mid);
}

#[test]
fn test_patch_fields_unions_terms_and_updates_rates() {
    let p = seeded(MemoryStore::new(), Policy::default());
    p.complete_term_guess(LEARNER, "offside").unwrap();
    let view = p
        .patch_fields(
            LEARNER,
            StatsPatch {
                penalties_taken: Some(4),
                penalties_scored: Some(3),
                correctly_answered_terms: ["corner".to_string()].into_iter().collect(),
                ..StatsPatch::default()
            },
        )
        .unwrap();
    assert_eq!(view.state.correctly_answered_terms.len(), 2);
    assert_eq!(view.stats.penalty_success_rate, 75);
}

#[test]
fn test_lost_race_retries_from_fresh_read() {
    let store = MemoryStore::new();
    seeded(&store, Policy::default());

    let catalog = Arc::new(Catalog::default());
    let mut raced = false;
    let racing = RacingStore::new(&store, move |inner| {
        if raced {
            return;
        }
        raced = true;
        let rival = Progression::new(inner, Arc::new(Catalog::default()), Policy::default());
        rival
            .complete_quiz(LEARNER, quiz("history_1", 3, 20, 5))
            .unwrap();
    });

    let p = Progression::new(&racing, catalog, Policy::default());
    let view = p.complete_quiz(LEARNER, quiz("rules_1", 4, 30, 5)).unwrap();

    // both completions survive; the mission reward is paid once
    assert!(view.state.completed_quizzes.contains("history_1"));
    assert!(view.state.completed_quizzes.contains("rules_1"));
    assert_eq!(view.state.xp, 20 + 50 + 30);
    assert_eq!(view.state.correct_answers, 7);
    assert_eq!(view.state.total_questions, 10);

    let stored: campione::LearnerState =
        serde_json::from_value(store.get(LEARNER).unwrap().value).unwrap();
    assert_eq!(stored, view.state);
}

#[test]
fn test_exhausted_retries_report_last_known_state() {
    let store = MemoryStore::new();
    seeded(&store, Policy::default());

    let mut n = 0;
    let racing = RacingStore::new(&store, move |inner| {
        n += 1;
        inner.update(LEARNER, presence(&format!("ping-{n}"))).unwrap();
    });
    let policy = Policy {
        max_attempts: 3,
        ..Policy::default()
    };
    let p = Progression::new(&racing, Arc::new(Catalog::default()), policy);

    let err = p
        .complete_quiz(LEARNER, quiz("rules_1", 5, 50, 5))
        .unwrap_err();
    assert!(err.is_recoverable());
    match err {
        ProgressionError::Conflict {
            attempts,
            last_known,
            ..
        } => {
            assert_eq!(attempts, 3);
            let view = last_known.expect("a state was read");
            assert_eq!(view.state.xp, 0);
            assert!(view.state.completed_quizzes.is_empty());
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    let doc = store.get(LEARNER).unwrap();
    assert_eq!(doc.value["xp"], json!(0));
    assert_eq!(doc.value["presence"], json!("ping-3"));
}

#[test]
fn test_transient_store_failure_is_recoverable() {
    let store = MemoryStore::new();
    seeded(&store, Policy::default());
    let before = store.get(LEARNER).unwrap();

    let p = Progression::new(
        UnavailableStore(&store),
        Arc::new(Catalog::default()),
        Policy::default(),
    );
    let err = p.complete_term_guess(LEARNER, "offside").unwrap_err();
    assert!(matches!(err, ProgressionError::Store(StoreError::Unavailable(_))));
    assert!(err.is_recoverable());
    assert_eq!(store.get(LEARNER).unwrap(), before);
}

#[test]
fn test_concurrent_writers_keep_every_delta() {
    let store = MemoryStore::new();
    let p = seeded(
        &store,
        Policy {
            max_attempts: 10,
            ..Policy::default()
        },
    );

    thread::scope(|scope| {
        for prefix in ["a", "b"] {
            let p = &p;
            scope.spawn(move || {
                for i in 0..4 {
                    p.complete_quiz(LEARNER, quiz(&format!("{prefix}_{i}"), 1, 10, 5))
                        .unwrap();
                }
            });
        }
    });

    let view = p.view(LEARNER).unwrap();
    assert_eq!(view.state.completed_quizzes.len(), 8);
    assert_eq!(view.state.xp, 8 * 10 + 50);
    assert_eq!(view.state.correct_answers, 8);
    assert_eq!(view.state.total_questions, 40);
}

#[test]
fn test_merge_write_preserves_foreign_fields() {
    let store = MemoryStore::new();
    let p = seeded(&store, Policy::default());
    store.update(LEARNER, presence("online")).unwrap();

    p.complete_quiz(LEARNER, quiz("rules_1", 2, 10, 5)).unwrap();
    p.set_unread_messages(LEARNER, true).unwrap();

    let doc = store.get(LEARNER).unwrap().value;
    assert_eq!(doc["presence"], json!("online"));
    assert_eq!(doc["unreadMessages"], json!(true));
    assert_eq!(doc["xp"], json!(60));
}

#[test]
fn test_unread_flag_forces_concurrent_transition_to_reread() {
    let store = MemoryStore::new();
    seeded(&store, Policy::default());

    let mut fired = false;
    let racing = RacingStore::new(&store, move |inner| {
        if fired {
            return;
        }
        fired = true;
        let mut fields = Map::new();
        fields.insert("unreadMessages".to_string(), json!(true));
        inner.update(LEARNER, fields).unwrap();
    });
    let p = Progression::new(&racing, Arc::new(Catalog::default()), Policy::default());
    let view = p.complete_term_guess(LEARNER, "penalty").unwrap();
    assert!(view.state.unread_messages);
    assert_eq!(store.get(LEARNER).unwrap().value["unreadMessages"], json!(true));
}

#[test]
fn test_json_store_persists_across_instances() {
    let dir = TempDir::new().unwrap();
    {
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        let p = seeded(store, Policy::default());
        p.complete_quiz(LEARNER, quiz("tactics_1", 5, 80, 5)).unwrap();
        p.record_login(LEARNER, day(2)).unwrap();
    }

    let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
    let p = Progression::new(store, Arc::new(Catalog::default()), Policy::default());
    let view = p.view(LEARNER).unwrap();
    assert_eq!(view.state.xp, 80 + 50 + 75);
    assert_eq!(view.state.streak, 2);
    assert_eq!(view.state.last_login_date, Some(day(2)));
    assert!(view.state.badges.contains("perfectionist"));
    assert!(view.state.badges.contains("tacticsExpert"));
    assert_eq!(p.store().keys().unwrap(), vec![LEARNER.to_string()]);
}

#[test]
fn test_reduced_catalog_drives_the_pipeline() {
    let catalog = Catalog::from_toml_str(
        r#"
[[levels]]
level = 1
name = "rookie"
xpRequired = 0

[[levels]]
level = 2
name = "pro"
xpRequired = 30

[[badges]]
id = "perfectionist"
rule = { kind = "granted" }

[[badges]]
id = "welcome"
rule = { kind = "always" }

[[badges]]
id = "pro"
rule = { kind = "level_at_least", min = 2 }
"#,
    )
    .unwrap();
    let store = MemoryStore::new();
    let p = Progression::new(&store, Arc::new(catalog), Policy::default());
    p.seed(LEARNER, &Identity::default(), day(1)).unwrap();

    let view = p.complete_quiz(LEARNER, quiz("any", 1, 30, 3)).unwrap();
    assert_eq!(view.state.level, 2);
    assert_eq!(view.grants.badges, vec!["pro".to_string()]);
    assert!(view.state.completed_missions.is_empty());
    assert_eq!(view.stats.next_level, None);
}

fn random_event(rng: &mut SmallRng, today: &mut NaiveDate) -> ProgressEvent {
    const TOPICS: [&str; 5] = ["rules", "history", "tactics", "nutrition", "referee"];
    match rng.gen_range(0..5) {
        0 | 1 => {
            let total = rng.gen_range(1..=10);
            let topic = TOPICS[rng.gen_range(0..TOPICS.len())];
            ProgressEvent::QuizCompleted(quiz(
                &format!("{topic}_{}", rng.gen_range(1..=4)),
                rng.gen_range(0..=total),
                rng.gen_range(0..=120),
                total,
            ))
        }
        2 => ProgressEvent::TermGuessed {
            term_id: format!("term-{}", rng.gen_range(0..30)),
        },
        3 => {
            *today = *today + Days::new(rng.gen_range(0..3));
            ProgressEvent::LoggedIn { date: *today }
        }
        _ => {
            let taken = rng.gen_range(0..20);
            let faced = rng.gen_range(0..20);
            ProgressEvent::FieldsPatched(StatsPatch {
                penalties_taken: Some(taken),
                penalties_scored: Some(rng.gen_range(0..=taken)),
                penalties_faced: Some(faced),
                penalties_saved: Some(rng.gen_range(0..=faced)),
                ..StatsPatch::default()
            })
        }
    }
}

#[test]
fn test_random_sequences_keep_invariants() {
    let catalog = Arc::new(Catalog::default());
    for seed in 0..8u64 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let store = MemoryStore::new();
        let policy = Policy {
            allow_rescoring: seed % 2 == 0,
            ..Policy::default()
        };
        let p = Progression::new(&store, Arc::clone(&catalog), policy);
        let mut today = day(1);
        let mut previous = p.seed(LEARNER, &Identity::default(), today).unwrap().state;

        for _ in 0..60 {
            let event = random_event(&mut rng, &mut today);
            let view = p.transact(LEARNER, event.clone()).unwrap();
            let state = view.state;

            assert!(state.xp >= previous.xp, "xp went down on {event:?}");
            assert_eq!(state.level, catalog.levels.resolve_level(state.xp));
            assert!(state.badges.is_superset(&previous.badges));
            assert!(state.completed_quizzes.is_superset(&previous.completed_quizzes));
            assert!(state.completed_missions.is_superset(&previous.completed_missions));
            assert!(
                state
                    .correctly_answered_terms
                    .is_superset(&previous.correctly_answered_terms)
            );
            assert!(state.correct_answers <= state.total_questions);
            assert!(view.stats.accuracy <= 100);
            assert_eq!(view.grants.xp_gained, state.xp - previous.xp);
            previous = state;
        }
    }
}
