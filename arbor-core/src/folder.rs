//! Folders: enumeration, creation and the recursive tree operations
//!
//! The recursive operations are written purely against the
//! [`StorageBackend`](crate::StorageBackend) primitives, so every backend gets
//! them without implementing anything beyond those primitives.
//!
//! Failure policy for [`Folder::copy_to`] and [`Folder::move_to`]: the first
//! error from any file or subfolder aborts the walk and is returned. Whatever
//! was copied before that point stays in place; nothing is rolled back.

use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::{debug, trace, warn};

use crate::{
    backend::EntryIter,
    config::LockConfig,
    entry::EntryKind,
    error::{ArborError, ArborResult},
    node::FsNode,
    operations::FolderCreateMode,
    File, FileSystem, Node, VirtualPath,
};

/// Locator for a folder. The folder does not have to exist.
#[derive(Clone)]
pub struct Folder {
    fs: FileSystem,
    path: VirtualPath,
}

impl Folder {
    pub(crate) fn new(fs: FileSystem, path: VirtualPath) -> Self {
        Self { fs, path }
    }

    /// Lazily enumerate the immediate children.
    ///
    /// Fails up front if the folder does not exist; errors met while listing
    /// come back as `Err` items.
    pub fn children(&self) -> ArborResult<Children> {
        let entries = self.fs.backend().list_directory(&self.path)?;
        Ok(Children {
            fs: self.fs.clone(),
            entries,
        })
    }

    pub fn files(&self) -> ArborResult<impl Iterator<Item = ArborResult<File>>> {
        Ok(self.children()?.filter_map(|child| match child {
            Ok(Node::File(file)) => Some(Ok(file)),
            Ok(Node::Folder(_)) => None,
            Err(e) => Some(Err(e)),
        }))
    }

    pub fn folders(&self) -> ArborResult<impl Iterator<Item = ArborResult<Folder>>> {
        Ok(self.children()?.filter_map(|child| match child {
            Ok(Node::Folder(folder)) => Some(Ok(folder)),
            Ok(Node::File(_)) => None,
            Err(e) => Some(Err(e)),
        }))
    }

    /// The child file called `name`. Neither existence nor type is checked.
    pub fn file(&self, name: &str) -> ArborResult<File> {
        Ok(File::new(self.fs.clone(), self.path.child(name)?))
    }

    /// The child folder called `name`. Neither existence nor type is checked.
    pub fn folder(&self, name: &str) -> ArborResult<Folder> {
        Ok(Folder::new(self.fs.clone(), self.path.child(name)?))
    }

    /// Create this folder. Does nothing if it already exists.
    pub fn create(&self, mode: FolderCreateMode) -> ArborResult<()> {
        let backend = self.fs.backend();
        match backend.kind_of(&self.path)? {
            Some(EntryKind::Directory) => return Ok(()),
            Some(EntryKind::File) => {
                return Err(ArborError::AlreadyExists(format!(
                    "{} exists and is a file",
                    self.path
                )))
            }
            None => {}
        }

        if let Some(parent) = self.parent() {
            if !parent.exists()? {
                if !mode.creates_parents() {
                    return Err(ArborError::NotFound(format!(
                        "parent of {} does not exist",
                        self.path
                    )));
                }
                parent.create(mode)?;
            }
        }

        if let Err(e) = backend.create_directory(&self.path) {
            // Lost a race with another creator; fine as long as it is a folder.
            let raced = matches!(e, ArborError::AlreadyExists(_)) && self.exists()?;
            if !raced {
                return Err(e);
            }
        }
        trace!(path = %self.path, "created folder");
        Ok(())
    }

    /// Remove this folder and everything beneath it. A missing folder is
    /// left alone.
    pub fn delete(&self) -> ArborResult<()> {
        if self.path.is_root() {
            return Err(ArborError::InvalidOperation(format!(
                "can not delete root folder {}",
                self.path
            )));
        }
        if !self.exists()? {
            return Ok(());
        }
        self.fs.backend().remove_directory(&self.path)?;
        debug!(path = %self.path, "deleted folder");
        Ok(())
    }

    /// Whether `node` lies strictly below this folder.
    pub fn is_ancestor_of<N: FsNode + ?Sized>(&self, node: &N) -> bool {
        let mut current = node.parent();
        while let Some(parent) = current {
            if parent == *self {
                return true;
            }
            current = parent.parent();
        }
        false
    }

    fn ensure_disjoint(&self, target: &Folder, op: &str) -> ArborResult<()> {
        if self == target || self.is_ancestor_of(target) {
            return Err(ArborError::InvalidOperation(format!(
                "can not {} parent to child directory (src: {}, dst: {})",
                op, self.path, target.path
            )));
        }
        if target.is_ancestor_of(self) {
            return Err(ArborError::InvalidOperation(format!(
                "can not {} directory into its own ancestor (src: {}, dst: {})",
                op, self.path, target.path
            )));
        }
        Ok(())
    }

    /// Recursively copy this folder to (not into) `target`.
    ///
    /// An existing `target` is deleted first, so the result mirrors this
    /// folder exactly. `target` must not be this folder, one of its
    /// descendants, or one of its ancestors.
    pub fn copy_to(&self, target: &Folder) -> ArborResult<()> {
        self.ensure_disjoint(target, "copy")?;
        if !self.exists()? {
            return Err(ArborError::NotFound(self.path.to_string()));
        }
        debug!(src = %self.path, dst = %target.path, "copying folder");
        self.copy_tree(target, &self.fs.config().locks)?;
        debug!(src = %self.path, dst = %target.path, "copied folder");
        Ok(())
    }

    /// Make room for a copy or move: delete `self`, or empty it if it is a root.
    fn clear_for_replace(&self) -> ArborResult<()> {
        if !self.path.is_root() {
            return self.delete();
        }
        if !self.exists()? {
            return Ok(());
        }
        let children = self.children()?.collect::<ArborResult<Vec<_>>>()?;
        for child in children {
            match child {
                Node::File(file) => file.delete()?,
                Node::Folder(folder) => folder.delete()?,
            }
        }
        Ok(())
    }

    fn copy_tree(&self, target: &Folder, locks: &LockConfig) -> ArborResult<()> {
        target.clear_for_replace()?;
        target.create(FolderCreateMode::IncludingParents)?;
        if !target.exists()? {
            return Err(ArborError::Other(format!(
                "target folder {} missing right after creation",
                target.path
            )));
        }

        // Files at this level first, subfolders afterwards.
        let mut subfolders = Vec::new();
        for child in self.children()? {
            match child? {
                Node::File(file) => {
                    copy_file_into(&file, target, locks)?;
                }
                Node::Folder(folder) => subfolders.push(folder),
            }
        }

        for folder in subfolders {
            let dst = target.folder(child_name(&folder)?)?;
            folder.copy_tree(&dst, locks)?;
        }
        Ok(())
    }

    /// Move this folder to `target`, replacing `target` if it exists.
    ///
    /// Uses the backend's atomic rename when source and target share a
    /// backend that supports it; otherwise copies and then deletes the source.
    pub fn move_to(&self, target: &Folder) -> ArborResult<()> {
        if self.path.is_root() {
            return Err(ArborError::InvalidOperation(format!(
                "can not move root folder {}",
                self.path
            )));
        }
        self.ensure_disjoint(target, "move")?;
        if !self.exists()? {
            return Err(ArborError::NotFound(self.path.to_string()));
        }
        target.clear_for_replace()?;

        if self.fs.can_rename_to(&target.fs) {
            if let Some(parent) = target.parent() {
                parent.create(FolderCreateMode::IncludingParents)?;
            }
            match self.fs.backend().rename(&self.path, &target.path) {
                Ok(()) => {
                    debug!(src = %self.path, dst = %target.path, "renamed folder");
                    return Ok(());
                }
                Err(e) => {
                    warn!(src = %self.path, dst = %target.path, error = %e, "rename failed, falling back to copy and delete");
                }
            }
        }

        self.copy_tree(target, &self.fs.config().locks)?;
        self.delete()?;
        debug!(src = %self.path, dst = %target.path, "moved folder by copy and delete");
        Ok(())
    }
}

fn child_name<N: FsNode>(node: &N) -> ArborResult<&str> {
    node.name()
        .ok_or_else(|| ArborError::InvalidPath(format!("{} has no name", node.path())))
}

fn copy_file_into(src: &File, target: &Folder, locks: &LockConfig) -> ArborResult<u64> {
    let mut reader = src.open_readable(locks.source_read()).map_err(|e| {
        if e.is_timeout() {
            warn!(path = %src.path(), "failed to lock source file in time");
        }
        e
    })?;

    let dst = target.file(child_name(src)?)?;
    let mut writer = dst
        .open_writable(locks.destination_write())
        .map_err(|e| match e {
            ArborError::LockTimeout { .. } => ArborError::LockInvariant(format!(
                "destination file {} must not exist yet, thus can't be locked",
                dst.path()
            )),
            other => other,
        })?;

    let copied = reader.copy_to(&mut writer)?;
    writer.finish()?;
    Ok(copied)
}

impl FsNode for Folder {
    fn filesystem(&self) -> &FileSystem {
        &self.fs
    }

    fn path(&self) -> &VirtualPath {
        &self.path
    }

    fn exists(&self) -> ArborResult<bool> {
        Ok(self.fs.backend().kind_of(&self.path)? == Some(EntryKind::Directory))
    }
}

/// Same location: same backend instance and same path.
impl PartialEq for Folder {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.fs.shares_backend_with(&other.fs)
    }
}

impl Eq for Folder {}

impl Hash for Folder {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Debug for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Folder").field(&self.path.to_uri()).finish()
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// Lazy iterator over a folder's children. Call
/// [`Folder::children`] again to restart.
pub struct Children {
    fs: FileSystem,
    entries: EntryIter,
}

impl Iterator for Children {
    type Item = ArborResult<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries
            .next()
            .map(|entry| entry.map(|entry| Node::from_entry(&self.fs, entry)))
    }
}

impl fmt::Debug for Children {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Children").field("fs", &self.fs.id()).finish()
    }
}
