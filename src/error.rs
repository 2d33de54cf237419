//! Unified error handling for the run-tracker library.
//!
//! Every failure the core can report is recoverable by the caller. Sample
//! ingestion never errors; malformed samples are filtered instead.

use thiserror::Error;

/// Unified error type for run-tracker operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    /// The user has not granted the location capability
    #[error("Location permission denied")]
    PermissionDenied,
    /// No location provider could produce a fix
    #[error("Location unavailable: no provider could produce a fix")]
    LocationUnavailable,
    /// Illegal session transition (e.g. pause while idle)
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
    /// A backend write failed; always retryable
    #[error("Persistence failure: {message}")]
    PersistenceFailure { message: String },
    /// Local key-value storage error
    #[error("Storage error: {message}")]
    Storage { message: String },
    /// HTTP/API error
    #[error("HTTP error{}: {message}", .status_code.map(|c| format!(" ({c})")).unwrap_or_default())]
    Http {
        message: String,
        status_code: Option<u16>,
    },
    /// Payload or queue (de)serialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl TrackerError {
    pub(crate) fn invalid_state(operation: &'static str, state: impl std::fmt::Display) -> Self {
        TrackerError::InvalidState {
            operation,
            state: state.to_string(),
        }
    }

    pub(crate) fn storage(message: impl Into<String>) -> Self {
        TrackerError::Storage {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        TrackerError::storage(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        TrackerError::Http {
            status_code: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Result type alias for run-tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
