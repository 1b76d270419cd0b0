//! Storage providers for arbor
//!
//! Two backends ship with the crate: the host filesystem and a volatile
//! in-memory tree. [`BackendRegistry`] maps backend ids to instances and
//! resolves `arbor://` URIs to nodes.

#[cfg(feature = "local")]
mod local;

#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "local")]
pub use local::LocalBackend;

#[cfg(feature = "memory")]
pub use memory::MemoryBackend;

use arbor_core::{ArborError, ArborResult, FileSystem, FsConfig, Node, StorageBackend, VirtualPath};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of storage backends
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn StorageBackend>>,
    config: FsConfig,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::with_config(FsConfig::default())
    }

    /// Registry whose filesystem handles all use `config`.
    pub fn with_config(config: FsConfig) -> Self {
        Self {
            backends: HashMap::new(),
            config,
        }
    }

    pub fn register(&mut self, backend: Arc<dyn StorageBackend>) {
        debug!(id = backend.id(), name = backend.display_name(), "registered backend");
        self.backends.insert(backend.id().to_string(), backend);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn StorageBackend>> {
        self.backends.get(id).cloned()
    }

    pub fn get_or_err(&self, id: &str) -> ArborResult<Arc<dyn StorageBackend>> {
        self.get(id).ok_or_else(|| ArborError::BackendNotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<&str> {
        self.backends.keys().map(|s| s.as_str()).collect()
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<dyn StorageBackend>> {
        self.backends.remove(id)
    }

    /// Filesystem handle over the backend registered as `id`.
    ///
    /// Handles obtained for the same id share the backend instance, so moves
    /// between them can use the backend rename.
    pub fn filesystem(&self, id: &str) -> ArborResult<FileSystem> {
        let backend = self.get_or_err(id)?;
        Ok(FileSystem::with_config(backend, self.config.clone()))
    }

    /// Look up the node an `arbor://backend/path` URI points at.
    pub fn resolve_uri(&self, uri: &str) -> ArborResult<Node> {
        let path = VirtualPath::parse_uri(uri)
            .ok_or_else(|| ArborError::InvalidPath(format!("not an arbor URI: {}", uri)))?;
        self.filesystem(&path.backend)?
            .node(&path)?
            .ok_or_else(|| ArborError::NotFound(path.to_string()))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
