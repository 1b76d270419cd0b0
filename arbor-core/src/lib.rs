//! arbor core
//!
//! Node, file and folder abstractions over pluggable storage backends.
//! Backends implement the small [`StorageBackend`] trait; recursive copy,
//! move, delete and child enumeration are provided on top of it.

pub mod backend;
pub mod config;
pub mod entry;
pub mod error;
pub mod file;
pub mod folder;
pub mod fs;
pub mod lock;
pub mod metadata;
pub mod node;
pub mod operations;
pub mod path;


pub use backend::{StorageBackend, StorageCapabilities};
pub use config::{FsConfig, LockConfig};
pub use entry::{Entry, EntryKind};
pub use error::{ArborError, ArborResult};
pub use file::{File, ReadableFile, WritableFile};
pub use folder::{Children, Folder};
pub use fs::FileSystem;
pub use lock::{FileLock, InProcessLockManager, LockManager};
pub use metadata::Metadata;
pub use node::{FsNode, Node};
pub use operations::FolderCreateMode;
pub use path::VirtualPath;
