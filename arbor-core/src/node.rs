//! Capabilities shared by every node, and the tagged [`Node`] type

use chrono::{DateTime, Utc};
use std::fmt;

use crate::{
    entry::{Entry, EntryKind},
    error::ArborResult,
    metadata::Metadata,
    File, FileSystem, Folder, VirtualPath,
};

/// Identity, existence and parent lookup.
pub trait FsNode {
    fn filesystem(&self) -> &FileSystem;
    fn path(&self) -> &VirtualPath;

    /// Whether an entry of this node's kind currently exists at its path.
    fn exists(&self) -> ArborResult<bool>;

    fn name(&self) -> Option<&str> {
        self.path().name()
    }

    /// The containing folder; `None` only for the root. The parent is rebuilt
    /// from the path, so no reference to it is kept.
    fn parent(&self) -> Option<Folder> {
        self.path()
            .parent()
            .map(|p| Folder::new(self.filesystem().clone(), p))
    }

    fn metadata(&self) -> ArborResult<Metadata> {
        self.filesystem().backend().metadata(self.path())
    }

    fn last_modified(&self) -> ArborResult<Option<DateTime<Utc>>> {
        Ok(self.metadata()?.modified)
    }
}

/// A child of a folder, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    File(File),
    Folder(Folder),
}

impl Node {
    pub(crate) fn from_entry(fs: &FileSystem, entry: Entry) -> Self {
        match entry.kind {
            EntryKind::File => Node::File(File::new(fs.clone(), entry.path)),
            EntryKind::Directory => Node::Folder(Folder::new(fs.clone(), entry.path)),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Node::File(_) => EntryKind::File,
            Node::Folder(_) => EntryKind::Directory,
        }
    }

    pub fn as_file(&self) -> Option<&File> {
        match self {
            Node::File(f) => Some(f),
            Node::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Node::Folder(f) => Some(f),
            Node::File(_) => None,
        }
    }

    pub fn into_file(self) -> Option<File> {
        match self {
            Node::File(f) => Some(f),
            Node::Folder(_) => None,
        }
    }

    pub fn into_folder(self) -> Option<Folder> {
        match self {
            Node::Folder(f) => Some(f),
            Node::File(_) => None,
        }
    }
}

impl FsNode for Node {
    fn filesystem(&self) -> &FileSystem {
        match self {
            Node::File(f) => f.filesystem(),
            Node::Folder(f) => f.filesystem(),
        }
    }

    fn path(&self) -> &VirtualPath {
        match self {
            Node::File(f) => f.path(),
            Node::Folder(f) => f.path(),
        }
    }

    fn exists(&self) -> ArborResult<bool> {
        match self {
            Node::File(f) => f.exists(),
            Node::Folder(f) => f.exists(),
        }
    }
}

impl From<File> for Node {
    fn from(file: File) -> Self {
        Node::File(file)
    }
}

impl From<Folder> for Node {
    fn from(folder: Folder) -> Self {
        Node::Folder(folder)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}
