//! Persistence for client-local settings.
//!
//! Settings are a flat JSON object of string keys to string values, the
//! same shape a browser's local storage holds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistedSettings {
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub fn load(path: &Path) -> Result<Option<PersistedSettings>, PersistenceError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let settings = serde_json::from_str::<PersistedSettings>(&contents)?;
    Ok(Some(settings))
}

pub fn save(path: &Path, settings: &PersistedSettings) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Where settings live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsStore {
    /// Kept for the life of the process only.
    Memory,
    /// JSON file on disk.
    File(PathBuf),
}

impl SettingsStore {
    pub fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match self {
            SettingsStore::Memory => Ok(None),
            SettingsStore::File(path) => {
                Ok(load(path)?.and_then(|mut settings| settings.values.remove(key)))
            }
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    pub fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.update(|values| {
            values.remove(key);
        })
    }

    fn update(&self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), PersistenceError> {
        let SettingsStore::File(path) = self else {
            return Ok(());
        };
        // An unreadable file is replaced rather than left blocking every write.
        let mut settings = match load(path) {
            Ok(settings) => settings.unwrap_or_default(),
            Err(PersistenceError::Serde(err)) => {
                warn!(path = %path.display(), error = %err, "settings file is corrupt, overwriting");
                PersistedSettings::default()
            }
            Err(err) => return Err(err),
        };
        change(&mut settings.values);
        save(path, &settings)
    }
}
