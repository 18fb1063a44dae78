//! Error types for tutorsheet operations

use crate::DatasetKey;
use std::time::Duration;
use thiserror::Error;

/// Network-level failures talking to either the export host or the script endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request to {url} timed out after {elapsed:?}")]
    Timeout { url: String, elapsed: Duration },

    #[error("Connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
}

/// Responses that arrived but cannot be used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResponseError {
    #[error("Column mismatch in {dataset}: header has {header_len} columns, row {row} has {row_len}")]
    ColumnMismatch {
        dataset: DatasetKey,
        header_len: usize,
        row: usize,
        row_len: usize,
    },

    #[error("Malformed response: {reason}")]
    Malformed { reason: String },

    #[error("Server rejected request: {message}")]
    Rejected { message: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Script endpoint is not configured")]
    EndpointNotConfigured,

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Input rejected locally before any request is made.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid row position {row}: rows start at 2 (row 1 is the header)")]
    InvalidRowPosition { row: u32 },

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),
}

/// Master error type for all tutorsheet errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SheetError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("No usable rows for {0}")]
    NoUsableRows(DatasetKey),
}

impl SheetError {
    /// True for failures decided locally, before anything was sent.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Validation(_))
    }
}

/// Result type alias for tutorsheet operations.
pub type SheetResult<T> = Result<T, SheetError>;
