//! Filesystem configuration
//!
//! Every field has a default, so an empty TOML document is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ArborError, ArborResult};

/// Lock acquisition budgets used by the composite operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Wait for a source file's lock during copies. The source is not
    /// mutated by the copy, so it should become available quickly.
    pub source_read_ms: u64,
    /// Wait for a freshly created destination file's lock. Nothing else
    /// should hold it, so this is kept tiny.
    pub destination_write_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            source_read_ms: 1000,
            destination_write_ms: 1,
        }
    }
}

impl LockConfig {
    pub fn source_read(&self) -> Duration {
        Duration::from_millis(self.source_read_ms)
    }

    pub fn destination_write(&self) -> Duration {
        Duration::from_millis(self.destination_write_ms)
    }
}

/// Configuration bound to a [`FileSystem`](crate::FileSystem).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Try the backend's atomic rename before falling back to copy+delete.
    pub prefer_rename: bool,
    pub locks: LockConfig,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            prefer_rename: true,
            locks: LockConfig::default(),
        }
    }
}

impl FsConfig {
    pub fn from_toml_str(input: &str) -> ArborResult<Self> {
        toml::from_str(input).map_err(|e| ArborError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> ArborResult<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| ArborError::from_io(e, path.display()))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> ArborResult<String> {
        toml::to_string(self).map_err(|e| ArborError::Config(e.to_string()))
    }
}
