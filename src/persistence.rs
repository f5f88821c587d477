//! Persistence bridge: best-effort save/load of form values
//!
//! Only `form_data` is ever persisted, as a JSON object of string to string.
//! Errors, touched flags and submit/loading flags stay in memory.

use crate::error::FormError;
use crate::state::FieldMap;
use crate::validation::lock_or_recover;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Durable client storage keyed by string
pub trait SnapshotStorage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, snapshot: &str) -> Result<()>;
}

/// In-memory storage, shared between engine instances through `Arc`
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(lock_or_recover(&self.entries).get(key).cloned())
    }

    fn save(&self, key: &str, snapshot: &str) -> Result<()> {
        lock_or_recover(&self.entries).insert(key.to_string(), snapshot.to_string());
        Ok(())
    }
}

/// One JSON file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl SnapshotStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(content))
    }

    fn save(&self, key: &str, snapshot: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.path_for(key);
        fs::write(&path, snapshot).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

/// Loads and saves one form's values under an explicit, per-form key
#[derive(Clone)]
pub struct PersistenceBridge {
    storage: Arc<dyn SnapshotStorage>,
    key: String,
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl PersistenceBridge {
    pub fn new(storage: Arc<dyn SnapshotStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Declared fields overlaid with any stored values
    ///
    /// Stored keys outside the declared set are dropped. Any failure falls
    /// back to the declared values.
    pub fn load_values(&self, declared: &FieldMap) -> FieldMap {
        match self.try_load() {
            Ok(Some(stored)) => declared
                .iter()
                .map(|(name, initial)| {
                    let value = stored.get(name).unwrap_or(initial);
                    (name.clone(), value.clone())
                })
                .collect(),
            Ok(None) => declared.clone(),
            Err(err) => {
                tracing::warn!(error = %err, "falling back to initial form values");
                declared.clone()
            }
        }
    }

    /// Persist values; failures are logged and returned for reporting only
    pub fn save_values(&self, values: &FieldMap) -> std::result::Result<(), FormError> {
        self.try_save(values).map_err(|err| {
            tracing::warn!(error = %err, "failed to persist form values");
            err
        })
    }

    fn try_load(&self) -> std::result::Result<Option<FieldMap>, FormError> {
        let raw = self
            .storage
            .load(&self.key)
            .map_err(|err| self.storage_failure("load", &err))?;
        match raw {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|err| self.storage_failure("load", &err.into())),
            None => Ok(None),
        }
    }

    fn try_save(&self, values: &FieldMap) -> std::result::Result<(), FormError> {
        let snapshot =
            serde_json::to_string(values).map_err(|err| self.storage_failure("save", &err.into()))?;
        self.storage
            .save(&self.key, &snapshot)
            .map_err(|err| self.storage_failure("save", &err))
    }

    fn storage_failure(&self, operation: &'static str, err: &anyhow::Error) -> FormError {
        FormError::StorageFailure {
            operation,
            key: self.key.clone(),
            message: format!("{err:#}"),
        }
    }
}
