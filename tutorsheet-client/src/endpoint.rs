//! Script endpoint URL: default, user override, persistence.

use crate::persistence::{PersistenceError, SettingsStore};
use std::sync::RwLock;
use tracing::{info, warn};
use tutorsheet_core::ConfigError;

/// Settings key the override is persisted under.
pub const ENDPOINT_SETTING_KEY: &str = "akademik_apps_script_url";

/// Every usable endpoint lives under this prefix.
pub const SCRIPT_HOST_PREFIX: &str = "https://script.google.com/";

pub const DEFAULT_ENDPOINT: &str = "https://script.google.com/macros/s/AKfycbxJYL__OE81FMUFKbXecW3T2HFiFwM7RozLje293UQF6X6WNIqgtuJHAF3A6sCyPTNKqw/exec";

/// Whether `url` looks like a deployed script endpoint.
pub fn is_script_url(url: &str) -> bool {
    !url.is_empty() && url.starts_with(SCRIPT_HOST_PREFIX)
}

/// The endpoint the RPC path talks to.
///
/// An empty override counts as no override.
#[derive(Debug)]
pub struct EndpointSettings {
    default: String,
    saved: RwLock<Option<String>>,
    store: SettingsStore,
}

impl EndpointSettings {
    /// Load the persisted override from `store`. A store that cannot be read
    /// is logged and treated as holding no override.
    pub fn new(default: impl Into<String>, store: SettingsStore) -> Self {
        let saved = match store.get(ENDPOINT_SETTING_KEY) {
            Ok(saved) => saved,
            Err(err) => {
                warn!(error = %err, "could not read saved endpoint, using default");
                None
            }
        };
        Self {
            default: default.into(),
            saved: RwLock::new(saved),
            store,
        }
    }

    pub fn in_memory(default: impl Into<String>) -> Self {
        Self::new(default, SettingsStore::Memory)
    }

    /// Current endpoint: the override if set and non-empty, else the default.
    pub fn endpoint(&self) -> String {
        self.read()
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.default.clone())
    }

    /// Endpoint if it is usable, otherwise [`ConfigError::EndpointNotConfigured`].
    pub fn require(&self) -> Result<String, ConfigError> {
        let url = self.endpoint();
        if is_script_url(&url) {
            Ok(url)
        } else {
            Err(ConfigError::EndpointNotConfigured)
        }
    }

    /// Store a trimmed override.
    pub fn set_endpoint(&self, url: &str) -> Result<(), PersistenceError> {
        let url = url.trim();
        self.store.set(ENDPOINT_SETTING_KEY, url)?;
        *self.write() = Some(url.to_string());
        info!(endpoint = url, "script endpoint updated");
        Ok(())
    }

    /// Drop the override and go back to the default.
    pub fn reset(&self) -> Result<(), PersistenceError> {
        self.store.remove(ENDPOINT_SETTING_KEY)?;
        *self.write() = None;
        info!("script endpoint reset to default");
        Ok(())
    }

    pub fn default_endpoint(&self) -> &str {
        &self.default
    }

    pub fn is_configured(&self) -> bool {
        is_script_url(&self.endpoint())
    }

    pub fn is_overridden(&self) -> bool {
        self.read().as_deref().is_some_and(|url| !url.is_empty())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<String>> {
        self.saved.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<String>> {
        self.saved.write().unwrap_or_else(|e| e.into_inner())
    }
}
