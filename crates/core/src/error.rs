//! Error types for the messaging engine

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// A team/agent/task identifier failed validation
    #[error("invalid {field}: {reason} ({value:?})")]
    InvalidIdentifier {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// An envelope failed validation
    #[error("invalid message: {0}")]
    Validation(String),

    /// Failed to acquire a named lock
    #[error("failed to acquire lock '{name}' for team '{team}'")]
    LockFailed { team: String, name: &'static str },

    /// File I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse JSON
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Requested team does not exist
    #[error("team '{0}' not found")]
    TeamNotFound(String),

    /// Requested message id does not exist
    #[error("message '{0}' not found")]
    MessageNotFound(String),

    /// Requested task id does not exist
    #[error("task '{0}' not found")]
    TaskNotFound(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
