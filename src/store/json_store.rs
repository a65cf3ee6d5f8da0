use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use serde_json::{Map, Value};

use crate::store::document::{
    DocumentStore, Precondition, StoreError, StoredDocument, Version, Versioned,
    check_precondition, merged, next_document,
};

/// One `<key>.json` file per learner holding `{version, document}`.
///
/// Writes go to a `.tmp` sibling, are synced, then renamed over the original,
/// so a crash never leaves a half-written document. The write lock covers
/// check-and-write within this process only.
pub struct JsonStore {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStore {
    pub fn new() -> Result<Self, StoreError> {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("campione")
            .join("learners");
        Self::with_base_dir(base_dir)
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn file_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.base_dir.join(format!("{key}.json")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("json store lock poisoned".to_string()))
    }

    fn load(&self, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        let path = self.file_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, key: &str, stored: &StoredDocument) -> Result<(), StoreError> {
        let path = self.file_path(key)?;
        let tmp_path = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(stored)?;
        let written = fs::File::create(&tmp_path)
            .and_then(|mut file| {
                file.write_all(json.as_bytes())?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp_path, &path));
        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&tmp_path)
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                log::warn!("could not remove {}: {cleanup}", tmp_path.display());
            }
            return Err(err.into());
        }
        log::debug!("wrote {} at version {}", path.display(), stored.version);
        Ok(())
    }

    /// Keys of every stored document, sorted.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|x| x.to_str()) == Some("json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl DocumentStore for JsonStore {
    fn get(&self, key: &str) -> Result<Versioned<Value>, StoreError> {
        let stored = self.load(key)?.ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        Ok(Versioned {
            version: stored.version,
            value: stored.document,
        })
    }

    fn set(
        &self,
        key: &str,
        document: Value,
        merge: bool,
        precondition: Precondition,
    ) -> Result<Version, StoreError> {
        let _guard = self.lock()?;
        let existing = self.load(key)?;
        check_precondition(key, existing.as_ref().map(|d| d.version), precondition)?;
        let next = next_document(key, existing.as_ref(), document, merge)?;
        self.save(key, &next)?;
        Ok(next.version)
    }

    fn update(&self, key: &str, fields: Map<String, Value>) -> Result<Version, StoreError> {
        let _guard = self.lock()?;
        let stored = self.load(key)?.ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        let next = StoredDocument {
            version: stored.version + 1,
            document: merged(key, &stored.document, fields)?,
        };
        self.save(key, &next)?;
        Ok(next.version)
    }
}
