//! Error types for the analysis pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::AuthorizationStatus;

/// Errors that can occur while analyzing a library.
///
/// Most failures in the pipeline are soft: they are logged and the affected
/// asset or cache entry is skipped. These variants surface the ones a caller
/// may want to act on.
#[derive(Debug, Error)]
pub enum SweepError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    AccessDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted document could not be decoded.
    #[error("Corrupt state file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// The photo library refused access.
    #[error("Photo library access not granted ({status})")]
    PermissionDenied { status: AuthorizationStatus },

    /// The library provider failed.
    #[error("Library error: {message}")]
    Library { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl SweepError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a decode error for a persisted document.
    pub fn corrupt(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a library provider error.
    pub fn library(message: impl Into<String>) -> Self {
        Self::Library {
            message: message.into(),
        }
    }
}

/// Result alias used across the photosweep crates.
pub type SweepResult<T> = Result<T, SweepError>;
