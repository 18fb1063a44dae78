//! Configuration loading for the tutorsheet client.
//!
//! Every field has a default, so an empty file is a valid config. Unknown
//! fields are rejected.

use crate::endpoint::DEFAULT_ENDPOINT;
use crate::fetcher::{ExportTimeouts, DEFAULT_EXPORT_BASE_URL};
use crate::rpc::RpcTimeouts;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tutorsheet_storage::CacheConfig;

pub const CONFIG_ENV_VAR: &str = "TUTORSHEET_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base of the CSV export URL; the spreadsheet id is appended.
    pub export_base_url: String,
    /// Script endpoint used when no override is saved.
    pub default_endpoint: String,
    /// JSON file holding the endpoint override. `None` keeps it in memory.
    pub settings_path: Option<PathBuf>,
    pub export_timeout_ms: u64,
    pub rpc_read_timeout_ms: u64,
    pub rpc_write_timeout_ms: u64,
    pub options_timeout_ms: u64,
    pub cache_ttl_secs: u64,
    pub options_ttl_secs: u64,
    /// `EnvFilter` directives used when `TUTORSHEET_LOG` is unset.
    pub log_filter: String,
    pub log_json: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            export_base_url: DEFAULT_EXPORT_BASE_URL.to_string(),
            default_endpoint: DEFAULT_ENDPOINT.to_string(),
            settings_path: None,
            export_timeout_ms: 12_000,
            rpc_read_timeout_ms: 15_000,
            rpc_write_timeout_ms: 20_000,
            options_timeout_ms: 10_000,
            cache_ttl_secs: 300,
            options_ttl_secs: 600,
            log_filter: "tutorsheet_client=info,tutorsheet_storage=info,warn".to_string(),
            log_json: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    /// Load from `--config <path>` or `TUTORSHEET_CONFIG`, else defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match config_path_from_args().or_else(config_path_from_env) {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.export_base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "export_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !base.starts_with("https://") && !base.starts_with("http://") {
            return Err(ConfigError::InvalidValue {
                field: "export_base_url",
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if let Some(path) = &self.settings_path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "settings_path",
                    reason: "must not be empty".to_string(),
                });
            }
        }
        let timeouts = [
            ("export_timeout_ms", self.export_timeout_ms),
            ("rpc_read_timeout_ms", self.rpc_read_timeout_ms),
            ("rpc_write_timeout_ms", self.rpc_write_timeout_ms),
            ("options_timeout_ms", self.options_timeout_ms),
            ("cache_ttl_secs", self.cache_ttl_secs),
            ("options_ttl_secs", self.options_ttl_secs),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be > 0".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn cache(&self) -> CacheConfig {
        CacheConfig::new()
            .with_ttl(Duration::from_secs(self.cache_ttl_secs))
            .with_options_ttl(Duration::from_secs(self.options_ttl_secs))
    }

    pub fn export_timeouts(&self) -> ExportTimeouts {
        ExportTimeouts {
            dataset: Duration::from_millis(self.export_timeout_ms),
            options: Duration::from_millis(self.options_timeout_ms),
        }
    }

    pub fn rpc_timeouts(&self) -> RpcTimeouts {
        RpcTimeouts {
            read: Duration::from_millis(self.rpc_read_timeout_ms),
            write: Duration::from_millis(self.rpc_write_timeout_ms),
        }
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ClientConfig::from_toml("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.export_timeout_ms, 12_000);
        assert_eq!(config.cache().entry_ttl, Duration::from_secs(300));
        assert_eq!(config.cache().options_ttl, Duration::from_secs(600));
        assert_eq!(config.rpc_timeouts().write, Duration::from_secs(20));
        assert_eq!(config.export_timeouts().options, Duration::from_secs(10));
    }

    #[test]
    fn test_partial_file_overrides_fields() {
        let config = ClientConfig::from_toml(
            r#"
            cache_ttl_secs = 60
            settings_path = "/tmp/tutorsheet/settings.json"
            log_json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.cache_ttl_secs, 60);
        assert_eq!(config.options_ttl_secs, 600);
        assert!(config.log_json);
        assert_eq!(
            config.settings_path.as_deref(),
            Some(Path::new("/tmp/tutorsheet/settings.json"))
        );
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = ClientConfig::from_toml("cache_ttl = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let config = ClientConfig {
            rpc_write_timeout_ms: 0,
            ..ClientConfig::default()
        };
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "rpc_write_timeout_ms"),
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_export_base_must_be_http() {
        let config = ClientConfig {
            export_base_url: "ftp://docs".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "export_base_url",
                ..
            })
        ));
    }
}
