//! Persisted user overrides.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::errors::{AnythingLlmError, AnythingLlmResult};

/// Key/value store holding the settings a user changed in the UI.
#[cfg_attr(test, mockall::automock)]
pub trait OverrideStore: Send + Sync {
    /// Reads a persisted value.
    fn get(&self, key: &str) -> AnythingLlmResult<Option<String>>;

    /// Writes a persisted value.
    fn set(&self, key: &str, value: &str) -> AnythingLlmResult<()>;

    /// Removes a persisted value.
    fn remove(&self, key: &str) -> AnythingLlmResult<()>;
}

fn poisoned() -> AnythingLlmError {
    AnythingLlmError::configuration("override store lock poisoned")
}

/// In-memory override store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-filled with values.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl OverrideStore for MemoryStore {
    fn get(&self, key: &str) -> AnythingLlmResult<Option<String>> {
        let values = self.values.read().map_err(|_| poisoned())?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AnythingLlmResult<()> {
        let mut values = self.values.write().map_err(|_| poisoned())?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AnythingLlmResult<()> {
        let mut values = self.values.write().map_err(|_| poisoned())?;
        values.remove(key);
        Ok(())
    }
}

/// Override store persisted as a flat JSON object on disk.
///
/// The whole file is read on every access and rewritten on every change,
/// which is fine for a handful of settings.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonFileStore {
    /// Creates a store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> AnythingLlmResult<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            AnythingLlmError::configuration(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))
        })?;

        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, values: &HashMap<String, String>) -> AnythingLlmResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AnythingLlmError::configuration(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, content).map_err(|e| {
            AnythingLlmError::configuration(format!(
                "Failed to write {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl OverrideStore for JsonFileStore {
    fn get(&self, key: &str) -> AnythingLlmResult<Option<String>> {
        let _guard = self.lock.read().map_err(|_| poisoned())?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> AnythingLlmResult<()> {
        let _guard = self.lock.write().map_err(|_| poisoned())?;
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn remove(&self, key: &str) -> AnythingLlmResult<()> {
        let _guard = self.lock.write().map_err(|_| poisoned())?;
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}
