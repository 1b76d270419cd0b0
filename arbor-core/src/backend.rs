//! Storage backend trait
//!
//! A backend provides only raw primitives. Everything composite (recursive
//! copy, move, parent creation, typed child views) lives in the node types
//! and is written once against this trait.

use std::io::{Read, Write};

use crate::{
    entry::{Entry, EntryKind},
    error::{ArborError, ArborResult},
    lock::LockManager,
    metadata::Metadata,
    VirtualPath,
};

/// Lazily produced directory listing; each item may fail on its own.
pub type EntryIter = Box<dyn Iterator<Item = ArborResult<Entry>> + Send>;

/// Byte source handed out by [`StorageBackend::open_read`].
pub type ByteReader = Box<dyn Read + Send>;

/// Byte sink handed out by [`StorageBackend::open_write`].
pub type ByteWriter = Box<dyn Write + Send>;

/// Storage backend capabilities
#[derive(Debug, Clone, Default)]
pub struct StorageCapabilities {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    /// Atomic rename of files and whole directory trees within the backend.
    pub rename: bool,
    pub list: bool,
}

impl StorageCapabilities {
    pub fn full() -> Self {
        Self {
            read: true,
            write: true,
            delete: true,
            rename: true,
            list: true,
        }
    }

    pub fn read_only() -> Self {
        Self {
            read: true,
            list: true,
            ..Default::default()
        }
    }

    pub fn local_filesystem() -> Self {
        Self::full()
    }

    pub fn in_memory() -> Self {
        Self::full()
    }
}

/// Storage backend trait
pub trait StorageBackend: Send + Sync {
    fn id(&self) -> &str;
    fn display_name(&self) -> &str;
    fn capabilities(&self) -> &StorageCapabilities;

    /// Lock manager shared by every handle opened on this backend.
    fn locks(&self) -> &dyn LockManager;

    /// `None` if nothing exists at `path`.
    fn kind_of(&self, path: &VirtualPath) -> ArborResult<Option<EntryKind>>;
    fn metadata(&self, path: &VirtualPath) -> ArborResult<Metadata>;

    /// Immediate children of the directory at `path`.
    fn list_directory(&self, path: &VirtualPath) -> ArborResult<EntryIter>;

    /// Create one directory. The parent must already exist (`NotFound` otherwise).
    fn create_directory(&self, path: &VirtualPath) -> ArborResult<()>;

    /// Remove the directory at `path` and everything beneath it.
    fn remove_directory(&self, path: &VirtualPath) -> ArborResult<()>;
    fn remove_file(&self, path: &VirtualPath) -> ArborResult<()>;

    fn open_read(&self, path: &VirtualPath) -> ArborResult<ByteReader>;

    /// Create or truncate the file at `path`. The parent must already exist.
    fn open_write(&self, path: &VirtualPath) -> ArborResult<ByteWriter>;

    /// Atomically move a file or directory tree. `dest` must not exist.
    fn rename(&self, source: &VirtualPath, _dest: &VirtualPath) -> ArborResult<()> {
        Err(ArborError::Unsupported(format!(
            "rename not supported by backend '{}' ({})",
            self.id(),
            source
        )))
    }
}
