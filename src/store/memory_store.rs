use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};

use crate::store::document::{
    DocumentStore, Precondition, StoreError, StoredDocument, Version, Versioned,
    check_precondition, merged, next_document,
};

/// Process-local document store. Every operation holds one lock, so the
/// precondition check and the write are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, StoredDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn documents(&self) -> Result<MutexGuard<'_, HashMap<String, StoredDocument>>, StoreError> {
        self.documents
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.documents().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Versioned<Value>, StoreError> {
        let documents = self.documents()?;
        let stored = documents.get(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        Ok(Versioned {
            version: stored.version,
            value: stored.document.clone(),
        })
    }

    fn set(
        &self,
        key: &str,
        document: Value,
        merge: bool,
        precondition: Precondition,
    ) -> Result<Version, StoreError> {
        let mut documents = self.documents()?;
        let existing = documents.get(key);
        check_precondition(key, existing.map(|d| d.version), precondition)?;
        let next = next_document(key, existing, document, merge)?;
        let version = next.version;
        documents.insert(key.to_string(), next);
        Ok(version)
    }

    fn update(&self, key: &str, fields: Map<String, Value>) -> Result<Version, StoreError> {
        let mut documents = self.documents()?;
        let stored = documents.get_mut(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        stored.document = merged(key, &stored.document, fields)?;
        stored.version += 1;
        Ok(stored.version)
    }
}
