//! Error types for graphload-core

use graphload_tabular::{FieldType, TabularError};
use thiserror::Error;

/// Result type alias using [`LoadError`]
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors raised while loading one partition.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Endpoint or rank field has a type that cannot be used as a key
    #[error("Unsupported type {field_type} for field {field}")]
    UnsupportedFieldType { field: String, field_type: FieldType },

    /// Configured field is not in the row schema
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Endpoint key is null in this row
    #[error("Null key in field {field}")]
    NullKey { field: String },

    /// Latitude/longitude pair is outside the valid range
    #[error("Invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },

    /// Error budget exhausted
    #[error("Too many errors: error log reached its limit of {max} statements")]
    TooManyErrors { max: usize },

    /// A write failed for a source category that cannot tolerate loss
    #[error("Write to {name} aborted: {reason}")]
    WriteAborted { name: String, reason: String },

    /// Checkpoint backend failure
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Error log backend failure
    #[error("Error log error: {0}")]
    ErrorLog(String),

    /// Writer connection could not be prepared
    #[error("Writer error: {0}")]
    Writer(#[from] WriteError),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// A partition task panicked or was cancelled
    #[error("Partition task failed: {0}")]
    Join(String),

    #[error("Tabular error: {0}")]
    Tabular(#[from] TabularError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LoadError {
    pub fn config(msg: impl Into<String>) -> Self {
        LoadError::Config(msg.into())
    }

    pub fn checkpoint(msg: impl Into<String>) -> Self {
        LoadError::Checkpoint(msg.into())
    }

    pub fn error_log(msg: impl Into<String>) -> Self {
        LoadError::ErrorLog(msg.into())
    }

    /// Per-row problems: the row is skipped and the partition continues.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            LoadError::NullKey { .. } | LoadError::InvalidCoordinate { .. }
        )
    }

    /// Everything that is not skippable aborts the owning partition.
    pub fn is_fatal(&self) -> bool {
        !self.is_skippable()
    }
}

/// Failure of a single write attempt against the graph store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The store executed the statement and rejected it
    #[error("rejected: {0}")]
    Rejected(String),

    /// Transport or session failure
    #[error("connection: {0}")]
    Connection(String),

    #[error("timed out")]
    Timeout,
}
