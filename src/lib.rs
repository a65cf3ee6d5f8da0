//! Learner progression for the football-rules quiz app: XP and levels,
//! badges, missions and the optimistic store transaction that keeps them
//! consistent when several writers touch the same learner.

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod event;
pub mod store;

pub use coordinator::{ProgressView, Progression};
pub use engine::catalog::Catalog;
pub use engine::transition::{Grants, Policy};
pub use error::{ProgressionError, ValidationError};
pub use event::{ProfilePatch, ProgressEvent, QuizCompletion, StatsPatch};
pub use store::document::{DocumentStore, Precondition, StoreError, Version, Versioned};
pub use store::schema::{Identity, LearnerState};
