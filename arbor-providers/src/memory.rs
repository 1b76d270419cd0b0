//! In-memory backend
//!
//! The whole tree lives in one ordered map keyed by path segments, so a
//! directory and all of its descendants form a contiguous key range.

use arbor_core::{
    backend::{ByteReader, ByteWriter, EntryIter, StorageBackend, StorageCapabilities},
    entry::{Entry, EntryKind},
    error::{ArborError, ArborResult},
    lock::{InProcessLockManager, LockManager},
    metadata::Metadata,
    VirtualPath,
};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Write};
use std::ops::Bound;
use std::sync::Arc;
use tracing::debug;

type Key = Vec<String>;

#[derive(Debug, Clone)]
enum Content {
    Directory,
    File(Bytes),
}

#[derive(Debug, Clone)]
struct MemEntry {
    content: Content,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl MemEntry {
    fn directory() -> Self {
        let now = Utc::now();
        Self {
            content: Content::Directory,
            created: now,
            modified: now,
        }
    }

    fn file(data: Bytes) -> Self {
        let now = Utc::now();
        Self {
            content: Content::File(data),
            created: now,
            modified: now,
        }
    }

    fn kind(&self) -> EntryKind {
        match self.content {
            Content::Directory => EntryKind::Directory,
            Content::File(_) => EntryKind::File,
        }
    }
}

type Tree = BTreeMap<Key, MemEntry>;

/// Keys strictly below `prefix`, in order.
fn descendants<'a>(tree: &'a Tree, prefix: &'a Key) -> impl Iterator<Item = (&'a Key, &'a MemEntry)> {
    tree.range::<Key, _>((Bound::Excluded(prefix), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(prefix))
}

/// Immediate children of `dir`, each found with one range lookup.
///
/// Every ancestor of a stored key is itself stored, so the first key past a
/// child's subtree is the next child (or leaves `dir` altogether).
fn immediate_children(tree: &Tree, dir: &Key) -> Vec<(Key, EntryKind)> {
    let depth = dir.len() + 1;
    let mut children = Vec::new();
    let mut cursor = Bound::Excluded(dir.clone());
    loop {
        let next = tree
            .range::<Key, _>((cursor.as_ref(), Bound::Unbounded))
            .next()
            .map(|(k, _)| k);
        let Some(key) = next else { break };
        if !key.starts_with(dir) {
            break;
        }
        let mut child = key[..depth].to_vec();
        if let Some(entry) = tree.get(&child) {
            children.push((child.clone(), entry.kind()));
        }
        // Smallest key sorting after everything below `child`.
        if let Some(last) = child.last_mut() {
            last.push('\0');
        }
        cursor = Bound::Included(child);
    }
    children
}

/// Volatile backend keeping every file in process memory.
pub struct MemoryBackend {
    id: String,
    tree: Arc<RwLock<Tree>>,
    capabilities: StorageCapabilities,
    locks: InProcessLockManager,
}

impl MemoryBackend {
    pub fn new(id: impl Into<String>) -> Self {
        let mut tree = Tree::new();
        tree.insert(Vec::new(), MemEntry::directory());
        Self {
            id: id.into(),
            tree: Arc::new(RwLock::new(tree)),
            capabilities: StorageCapabilities::in_memory(),
            locks: InProcessLockManager::new(),
        }
    }

    /// Number of files and directories stored, the root included.
    pub fn len(&self) -> usize {
        self.tree.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    fn key<'a>(&self, path: &'a VirtualPath) -> ArborResult<&'a Key> {
        if path.backend != self.id {
            return Err(ArborError::InvalidPath(format!(
                "{} does not belong to backend '{}'",
                path, self.id
            )));
        }
        Ok(&path.segments)
    }

    fn require_parent_dir(tree: &Tree, path: &VirtualPath) -> ArborResult<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        match tree.get(&parent.segments).map(MemEntry::kind) {
            Some(EntryKind::Directory) => Ok(()),
            Some(EntryKind::File) => Err(ArborError::NotADirectory(parent.to_string())),
            None => Err(ArborError::NotFound(parent.to_string())),
        }
    }

    fn touch_parent(tree: &mut Tree, key: &Key) {
        if let Some((_, parent)) = key.split_last() {
            if let Some(entry) = tree.get_mut(parent) {
                entry.modified = Utc::now();
            }
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl StorageBackend for MemoryBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        "In-Memory"
    }

    fn capabilities(&self) -> &StorageCapabilities {
        &self.capabilities
    }

    fn locks(&self) -> &dyn LockManager {
        &self.locks
    }

    fn kind_of(&self, path: &VirtualPath) -> ArborResult<Option<EntryKind>> {
        let key = self.key(path)?;
        Ok(self.tree.read().get(key).map(MemEntry::kind))
    }

    fn metadata(&self, path: &VirtualPath) -> ArborResult<Metadata> {
        let key = self.key(path)?;
        let tree = self.tree.read();
        let entry = tree
            .get(key)
            .ok_or_else(|| ArborError::NotFound(path.to_string()))?;

        let mut metadata = Metadata::new(entry.kind())
            .with_created(entry.created)
            .with_modified(entry.modified);
        if let Content::File(data) = &entry.content {
            metadata = metadata.with_size(data.len() as u64);
        }
        Ok(metadata)
    }

    fn list_directory(&self, path: &VirtualPath) -> ArborResult<EntryIter> {
        let key = self.key(path)?;
        let tree = self.tree.read();
        match tree.get(key).map(MemEntry::kind) {
            Some(EntryKind::Directory) => {}
            Some(EntryKind::File) => return Err(ArborError::NotADirectory(path.to_string())),
            None => return Err(ArborError::NotFound(path.to_string())),
        }

        let entries: Vec<ArborResult<Entry>> = immediate_children(&tree, key)
            .into_iter()
            .map(|(child, kind)| {
                let path = VirtualPath {
                    backend: self.id.clone(),
                    segments: child,
                };
                Ok(Entry { path, kind })
            })
            .collect();
        Ok(Box::new(entries.into_iter()))
    }

    fn create_directory(&self, path: &VirtualPath) -> ArborResult<()> {
        let key = self.key(path)?;
        let mut tree = self.tree.write();
        if tree.contains_key(key) {
            return Err(ArborError::AlreadyExists(path.to_string()));
        }
        Self::require_parent_dir(&tree, path)?;
        tree.insert(key.clone(), MemEntry::directory());
        Self::touch_parent(&mut tree, key);
        Ok(())
    }

    fn remove_directory(&self, path: &VirtualPath) -> ArborResult<()> {
        let key = self.key(path)?;
        let mut tree = self.tree.write();
        match tree.get(key).map(MemEntry::kind) {
            Some(EntryKind::Directory) => {}
            Some(EntryKind::File) => return Err(ArborError::NotADirectory(path.to_string())),
            None => return Err(ArborError::NotFound(path.to_string())),
        }

        let doomed: Vec<Key> = descendants(&tree, key).map(|(k, _)| k.clone()).collect();
        for k in &doomed {
            tree.remove(k);
        }
        // The root itself always stays.
        if !key.is_empty() {
            tree.remove(key);
            Self::touch_parent(&mut tree, key);
        }
        debug!(path = %path, removed = doomed.len(), "removed directory tree");
        Ok(())
    }

    fn remove_file(&self, path: &VirtualPath) -> ArborResult<()> {
        let key = self.key(path)?;
        let mut tree = self.tree.write();
        match tree.get(key).map(MemEntry::kind) {
            Some(EntryKind::File) => {}
            Some(EntryKind::Directory) => return Err(ArborError::NotAFile(path.to_string())),
            None => return Err(ArborError::NotFound(path.to_string())),
        }
        tree.remove(key);
        Self::touch_parent(&mut tree, key);
        Ok(())
    }

    fn open_read(&self, path: &VirtualPath) -> ArborResult<ByteReader> {
        let key = self.key(path)?;
        let tree = self.tree.read();
        match tree.get(key).map(|e| &e.content) {
            Some(Content::File(data)) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(Content::Directory) => Err(ArborError::NotAFile(path.to_string())),
            None => Err(ArborError::NotFound(path.to_string())),
        }
    }

    fn open_write(&self, path: &VirtualPath) -> ArborResult<ByteWriter> {
        let key = self.key(path)?;
        let mut tree = self.tree.write();
        Self::require_parent_dir(&tree, path)?;
        match tree.get_mut(key) {
            Some(MemEntry {
                content: Content::Directory,
                ..
            }) => return Err(ArborError::NotAFile(path.to_string())),
            Some(entry) => {
                entry.content = Content::File(Bytes::new());
                entry.modified = Utc::now();
            }
            None => {
                tree.insert(key.clone(), MemEntry::file(Bytes::new()));
                Self::touch_parent(&mut tree, key);
            }
        }
        Ok(Box::new(MemoryWriter {
            tree: Arc::clone(&self.tree),
            key: key.clone(),
            buf: BytesMut::new(),
            dirty: false,
        }))
    }

    fn rename(&self, source: &VirtualPath, dest: &VirtualPath) -> ArborResult<()> {
        let src_key = self.key(source)?;
        let dst_key = self.key(dest)?;
        let mut tree = self.tree.write();

        if !tree.contains_key(src_key) {
            return Err(ArborError::NotFound(source.to_string()));
        }
        if tree.contains_key(dst_key) {
            return Err(ArborError::AlreadyExists(dest.to_string()));
        }
        if src_key.is_empty() || dst_key.starts_with(src_key) {
            return Err(ArborError::InvalidOperation(format!(
                "can not rename {} into itself ({})",
                source, dest
            )));
        }
        Self::require_parent_dir(&tree, dest)?;

        let mut moved: Vec<Key> = vec![src_key.clone()];
        moved.extend(descendants(&tree, src_key).map(|(k, _)| k.clone()));
        for old in moved {
            let Some(entry) = tree.remove(&old) else {
                continue;
            };
            let old_path = VirtualPath {
                backend: self.id.clone(),
                segments: old,
            };
            if let Some(new_path) = old_path.rebase(source, dest) {
                tree.insert(new_path.segments, entry);
            }
        }
        Self::touch_parent(&mut tree, src_key);
        Self::touch_parent(&mut tree, dst_key);
        debug!(src = %source, dst = %dest, "renamed");
        Ok(())
    }
}

/// Buffers writes and publishes the whole content on flush and on drop.
struct MemoryWriter {
    tree: Arc<RwLock<Tree>>,
    key: Key,
    buf: BytesMut,
    dirty: bool,
}

impl MemoryWriter {
    fn publish(&mut self) {
        if !self.dirty {
            return;
        }
        let mut tree = self.tree.write();
        // A file deleted while still open is not brought back.
        if let Some(entry) = tree.get_mut(&self.key) {
            if let Content::File(_) = entry.content {
                entry.content = Content::File(Bytes::copy_from_slice(&self.buf));
                entry.modified = Utc::now();
            }
        }
        self.dirty = false;
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        self.dirty = true;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.publish();
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn vp(p: &str) -> VirtualPath {
        VirtualPath::new("mem", p)
    }

    fn write(backend: &MemoryBackend, p: &str, data: &[u8]) {
        let mut w = backend.open_write(&vp(p)).unwrap();
        w.write_all(data).unwrap();
    }

    fn read(backend: &MemoryBackend, p: &str) -> String {
        let mut s = String::new();
        backend.open_read(&vp(p)).unwrap().read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn test_starts_with_root_only() {
        let backend = MemoryBackend::new("mem");
        assert!(backend.is_empty());
        assert_eq!(backend.kind_of(&VirtualPath::root("mem")).unwrap(), Some(EntryKind::Directory));
        assert_eq!(backend.list_directory(&VirtualPath::root("mem")).unwrap().count(), 0);
    }

    #[test]
    fn test_create_directory_rules() {
        let backend = MemoryBackend::new("mem");
        assert!(backend.create_directory(&vp("/a/b")).unwrap_err().is_not_found());
        backend.create_directory(&vp("/a")).unwrap();
        backend.create_directory(&vp("/a/b")).unwrap();
        assert!(matches!(
            backend.create_directory(&vp("/a")),
            Err(ArborError::AlreadyExists(_))
        ));

        write(&backend, "/f", b"x");
        assert!(matches!(
            backend.create_directory(&vp("/f/g")),
            Err(ArborError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_list_only_immediate_children() {
        let backend = MemoryBackend::new("mem");
        backend.create_directory(&vp("/a")).unwrap();
        backend.create_directory(&vp("/a/b")).unwrap();
        write(&backend, "/a/b/deep.txt", b"d");
        write(&backend, "/a/top.txt", b"t");
        // Sibling whose name shares a prefix must not leak in.
        backend.create_directory(&vp("/ab")).unwrap();

        let entries: Vec<_> = backend
            .list_directory(&vp("/a"))
            .unwrap()
            .collect::<ArborResult<_>>()
            .unwrap();
        assert_eq!(
            entries,
            vec![Entry::directory(vp("/a/b")), Entry::file(vp("/a/top.txt"))]
        );
    }

    #[test]
    fn test_list_skips_over_deep_subtrees() {
        let backend = MemoryBackend::new("mem");
        for dir in ["/a", "/a/x", "/a/x/y", "/a/x/y/z", "/a/x!", "/a/x0"] {
            backend.create_directory(&vp(dir)).unwrap();
        }
        write(&backend, "/a/x/y/z/leaf", b"l");
        write(&backend, "/a/x/y/z/leaf2", b"l");
        write(&backend, "/a/w.txt", b"w");

        let names: Vec<_> = backend
            .list_directory(&vp("/a"))
            .unwrap()
            .map(|e| e.unwrap().path.name().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["w.txt", "x", "x!", "x0"]);
    }

    #[test]
    fn test_write_publishes_on_drop_and_truncates() {
        let backend = MemoryBackend::new("mem");
        write(&backend, "/f.txt", b"hello");
        assert_eq!(read(&backend, "/f.txt"), "hello");
        write(&backend, "/f.txt", b"hi");
        assert_eq!(read(&backend, "/f.txt"), "hi");
        assert_eq!(backend.metadata(&vp("/f.txt")).unwrap().size, Some(2));
    }

    #[test]
    fn test_write_visible_after_flush() {
        let backend = MemoryBackend::new("mem");
        let mut w = backend.open_write(&vp("/f")).unwrap();
        w.write_all(b"abc").unwrap();
        assert_eq!(read(&backend, "/f"), "");
        w.flush().unwrap();
        assert_eq!(read(&backend, "/f"), "abc");
    }

    #[test]
    fn test_open_write_needs_parent() {
        let backend = MemoryBackend::new("mem");
        assert!(backend.open_write(&vp("/no/f")).err().unwrap().is_not_found());
        backend.create_directory(&vp("/d")).unwrap();
        assert!(matches!(
            backend.open_write(&vp("/d")).err().unwrap(),
            ArborError::NotAFile(_)
        ));
    }

    #[test]
    fn test_remove_directory_takes_subtree() {
        let backend = MemoryBackend::new("mem");
        backend.create_directory(&vp("/a")).unwrap();
        backend.create_directory(&vp("/a/b")).unwrap();
        write(&backend, "/a/b/f", b"x");
        write(&backend, "/keep", b"k");

        backend.remove_directory(&vp("/a")).unwrap();
        assert_eq!(backend.kind_of(&vp("/a/b/f")).unwrap(), None);
        assert_eq!(backend.kind_of(&vp("/a")).unwrap(), None);
        assert_eq!(read(&backend, "/keep"), "k");
    }

    #[test]
    fn test_remove_root_keeps_root() {
        let backend = MemoryBackend::new("mem");
        write(&backend, "/f", b"x");
        backend.remove_directory(&VirtualPath::root("mem")).unwrap();
        assert!(backend.is_empty());
    }

    #[test]
    fn test_remove_file_checks_kind() {
        let backend = MemoryBackend::new("mem");
        backend.create_directory(&vp("/d")).unwrap();
        assert!(matches!(backend.remove_file(&vp("/d")), Err(ArborError::NotAFile(_))));
        assert!(backend.remove_file(&vp("/none")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_rename_moves_subtree() {
        let backend = MemoryBackend::new("mem");
        backend.create_directory(&vp("/src")).unwrap();
        backend.create_directory(&vp("/src/sub")).unwrap();
        write(&backend, "/src/a.txt", b"hi");
        write(&backend, "/src/sub/b.txt", b"yo");
        backend.create_directory(&vp("/out")).unwrap();

        backend.rename(&vp("/src"), &vp("/out/dst")).unwrap();
        assert_eq!(backend.kind_of(&vp("/src")).unwrap(), None);
        assert_eq!(read(&backend, "/out/dst/a.txt"), "hi");
        assert_eq!(read(&backend, "/out/dst/sub/b.txt"), "yo");
    }

    #[test]
    fn test_rename_rejections() {
        let backend = MemoryBackend::new("mem");
        backend.create_directory(&vp("/a")).unwrap();
        backend.create_directory(&vp("/b")).unwrap();
        assert!(matches!(
            backend.rename(&vp("/a"), &vp("/b")),
            Err(ArborError::AlreadyExists(_))
        ));
        assert!(matches!(
            backend.rename(&vp("/a"), &vp("/a/inner")),
            Err(ArborError::InvalidOperation(_))
        ));
        assert!(backend.rename(&vp("/zz"), &vp("/c")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_deleted_file_not_resurrected_by_writer() {
        let backend = MemoryBackend::new("mem");
        let mut w = backend.open_write(&vp("/f")).unwrap();
        w.write_all(b"late").unwrap();
        backend.remove_file(&vp("/f")).unwrap();
        drop(w);
        assert_eq!(backend.kind_of(&vp("/f")).unwrap(), None);
    }
}
