use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Per-document counter bumped by every successful write.
pub type Version = u64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no document stored under {key:?}")]
    NotFound { key: String },
    #[error("document {key:?} already exists")]
    AlreadyExists { key: String },
    #[error("document {key:?} changed concurrently (expected version {expected}, found {found:?})")]
    Conflict {
        key: String,
        expected: Version,
        found: Option<Version>,
    },
    #[error("invalid document key {0:?}")]
    InvalidKey(String),
    #[error("document {key:?} is not a JSON object")]
    NotAnObject { key: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Io(_) | StoreError::Conflict { .. }
        )
    }
}

/// Write guard checked atomically with the write itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precondition {
    Any,
    Absent,
    Version(Version),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Versioned<T> {
    pub version: Version,
    pub value: T,
}

/// On-disk / in-memory envelope: the document plus its version stamp.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredDocument {
    pub version: Version,
    pub document: Value,
}

/// The external key/document service. Implementations serialize their own
/// check-and-write so preconditions hold under concurrent callers.
pub trait DocumentStore {
    fn get(&self, key: &str) -> Result<Versioned<Value>, StoreError>;

    /// Write `document` under `key`. With `merge`, top-level fields are laid
    /// over the stored document instead of replacing it.
    fn set(
        &self,
        key: &str,
        document: Value,
        merge: bool,
        precondition: Precondition,
    ) -> Result<Version, StoreError>;

    /// Merge `fields` into an existing document.
    fn update(&self, key: &str, fields: Map<String, Value>) -> Result<Version, StoreError>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn get(&self, key: &str) -> Result<Versioned<Value>, StoreError> {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        document: Value,
        merge: bool,
        precondition: Precondition,
    ) -> Result<Version, StoreError> {
        (**self).set(key, document, merge, precondition)
    }

    fn update(&self, key: &str, fields: Map<String, Value>) -> Result<Version, StoreError> {
        (**self).update(key, fields)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Versioned<Value>, StoreError> {
        (**self).get(key)
    }

    fn set(
        &self,
        key: &str,
        document: Value,
        merge: bool,
        precondition: Precondition,
    ) -> Result<Version, StoreError> {
        (**self).set(key, document, merge, precondition)
    }

    fn update(&self, key: &str, fields: Map<String, Value>) -> Result<Version, StoreError> {
        (**self).update(key, fields)
    }
}

pub(crate) fn check_precondition(
    key: &str,
    current: Option<Version>,
    precondition: Precondition,
) -> Result<(), StoreError> {
    match (precondition, current) {
        (Precondition::Any, _) | (Precondition::Absent, None) => Ok(()),
        (Precondition::Absent, Some(_)) => Err(StoreError::AlreadyExists {
            key: key.to_string(),
        }),
        (Precondition::Version(expected), found) if found != Some(expected) => {
            Err(StoreError::Conflict {
                key: key.to_string(),
                expected,
                found,
            })
        }
        (Precondition::Version(_), _) => Ok(()),
    }
}

/// Compute the document that a `set` leaves behind.
pub(crate) fn next_document(
    key: &str,
    existing: Option<&StoredDocument>,
    document: Value,
    merge: bool,
) -> Result<StoredDocument, StoreError> {
    let version = existing.map_or(1, |d| d.version + 1);
    let document = match (merge, existing) {
        (true, Some(stored)) => {
            let Value::Object(fields) = document else {
                return Err(StoreError::NotAnObject {
                    key: key.to_string(),
                });
            };
            merged(key, &stored.document, fields)?
        }
        _ => document,
    };
    Ok(StoredDocument { version, document })
}

pub(crate) fn merged(
    key: &str,
    base: &Value,
    fields: Map<String, Value>,
) -> Result<Value, StoreError> {
    let mut target = match base {
        Value::Object(map) => map.clone(),
        _ => {
            return Err(StoreError::NotAnObject {
                key: key.to_string(),
            });
        }
    };
    target.extend(fields);
    Ok(Value::Object(target))
}
