//! Error types for the client binary and service construction.

use crate::config::ConfigError;
use crate::persistence::PersistenceError;
use crate::telemetry::TelemetryError;
use tutorsheet_core::{SheetError, TransportError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Usage: {0}")]
    Usage(String),
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        Self::Sheet(err.into())
    }
}

impl From<ValidationError> for ClientError {
    fn from(err: ValidationError) -> Self {
        Self::Sheet(err.into())
    }
}
