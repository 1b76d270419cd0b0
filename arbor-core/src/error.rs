//! Error types for arbor

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type ArborResult<T> = Result<T, ArborError>;

/// Main error type
#[derive(Error, Debug)]
pub enum ArborError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Timed out after {timeout:?} waiting for lock on {path}")]
    LockTimeout { path: String, timeout: Duration },

    #[error("Lock invariant violated: {0}")]
    LockInvariant(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Backend not found: {0}")]
    BackendNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

impl ArborError {
    /// Map an I/O error raised while touching `path` onto the typed variants.
    pub fn from_io(err: io::Error, path: impl std::fmt::Display) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ArborError::NotFound(path.to_string()),
            io::ErrorKind::AlreadyExists => ArborError::AlreadyExists(path.to_string()),
            io::ErrorKind::PermissionDenied => ArborError::PermissionDenied(path.to_string()),
            _ => ArborError::Io(err),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ArborError::LockTimeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            ArborError::NotFound(_) => true,
            ArborError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
