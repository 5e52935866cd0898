//! Error types for the state store.

use crate::types::SubscriberId;
use thiserror::Error;

/// Boxed error returned by subscriber callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Index {index} out of bounds (len {len}) at '{path}'")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("Subscriber {id} at '{path}' failed: {source}")]
    Subscriber {
        id: SubscriberId,
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StateError {
    pub(crate) fn invalid_path(path: &str, reason: &'static str) -> Self {
        StateError::InvalidPath {
            path: path.to_string(),
            reason,
        }
    }
}

impl From<serde_json::Error> for StateError {
    fn from(e: serde_json::Error) -> Self {
        StateError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StateError>;
