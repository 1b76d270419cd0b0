//! Filesystem handle binding a backend to its configuration

use std::fmt;
use std::sync::Arc;

use crate::{
    backend::StorageBackend, config::FsConfig, entry::EntryKind, error::ArborResult, File,
    Folder, Node, VirtualPath,
};

struct Inner {
    backend: Arc<dyn StorageBackend>,
    config: FsConfig,
}

/// Entry point for node lookups on one backend. Cheap to clone.
#[derive(Clone)]
pub struct FileSystem {
    inner: Arc<Inner>,
}

impl FileSystem {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(backend, FsConfig::default())
    }

    pub fn with_config(backend: Arc<dyn StorageBackend>, config: FsConfig) -> Self {
        Self {
            inner: Arc::new(Inner { backend, config }),
        }
    }

    pub fn id(&self) -> &str {
        self.inner.backend.id()
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.inner.backend.as_ref()
    }

    pub fn config(&self) -> &FsConfig {
        &self.inner.config
    }

    pub fn root(&self) -> Folder {
        Folder::new(self.clone(), VirtualPath::root(self.id()))
    }

    /// Folder at a slash-separated path below the root. Existence is not checked.
    pub fn folder(&self, path: &str) -> Folder {
        Folder::new(self.clone(), VirtualPath::new(self.id(), path))
    }

    /// File at a slash-separated path below the root. Existence is not checked.
    pub fn file(&self, path: &str) -> File {
        File::new(self.clone(), VirtualPath::new(self.id(), path))
    }

    /// Typed node currently stored at `path`, or `None` if nothing is there.
    pub fn node(&self, path: &VirtualPath) -> ArborResult<Option<Node>> {
        let node = match self.backend().kind_of(path)? {
            Some(EntryKind::File) => Some(Node::File(File::new(self.clone(), path.clone()))),
            Some(EntryKind::Directory) => {
                Some(Node::Folder(Folder::new(self.clone(), path.clone())))
            }
            None => None,
        };
        Ok(node)
    }

    /// Whether both handles drive the very same backend instance.
    pub fn shares_backend_with(&self, other: &FileSystem) -> bool {
        Arc::as_ptr(&self.inner.backend) as *const () == Arc::as_ptr(&other.inner.backend) as *const ()
    }

    /// Whether a move from this filesystem to `other` may use the backend rename.
    pub(crate) fn can_rename_to(&self, other: &FileSystem) -> bool {
        self.config().prefer_rename
            && self.shares_backend_with(other)
            && self.backend().capabilities().rename
    }
}

impl fmt::Debug for FileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("backend", &self.id())
            .field("config", self.config())
            .finish()
    }
}
