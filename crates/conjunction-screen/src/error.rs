//! Error types for the screening engine

use thiserror::Error;

use crate::types::orbital::ObjectId;

/// Result type alias for screening operations
pub type Result<T> = std::result::Result<T, Error>;

/// Screening engine errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration or an operation disabled by configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown object id, missing current state, or unknown alert
    #[error("Not found: {0}")]
    NotFound(String),

    /// Propagation failed for a specific object
    #[error("Propagation failed for object {object_id}: {message}")]
    Propagation { object_id: ObjectId, message: String },

    /// Orbital elements could not be parsed or are degenerate
    #[error("Invalid orbital elements: {0}")]
    InvalidElements(String),

    /// Persistence layer error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration parse error
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a propagation error
    pub fn propagation(object_id: ObjectId, message: impl Into<String>) -> Self {
        Self::Propagation {
            object_id,
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a batch run may skip this error and continue with the next unit
    pub fn is_unit_local(&self) -> bool {
        matches!(
            self,
            Error::Propagation { .. } | Error::NotFound(_) | Error::InvalidElements(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
