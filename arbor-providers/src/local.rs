//! Local filesystem backend

use arbor_core::{
    backend::{ByteReader, ByteWriter, EntryIter, StorageBackend, StorageCapabilities},
    entry::{Entry, EntryKind},
    error::{ArborError, ArborResult},
    lock::{InProcessLockManager, LockManager},
    metadata::Metadata,
    VirtualPath,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Local filesystem backend rooted at a host directory.
pub struct LocalBackend {
    id: String,
    root: PathBuf,
    capabilities: StorageCapabilities,
    locks: InProcessLockManager,
}

impl LocalBackend {
    pub fn new(id: impl Into<String>, root: impl AsRef<Path>) -> Self {
        Self {
            id: id.into(),
            root: root.as_ref().to_path_buf(),
            capabilities: StorageCapabilities::local_filesystem(),
            locks: InProcessLockManager::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn to_real_path(&self, path: &VirtualPath) -> ArborResult<PathBuf> {
        if path.backend != self.id {
            return Err(ArborError::InvalidPath(format!(
                "{} does not belong to backend '{}'",
                path, self.id
            )));
        }
        let mut real = self.root.clone();
        for seg in &path.segments {
            real.push(seg);
        }
        Ok(real)
    }
}

fn kind_from_metadata(meta: &fs::Metadata) -> Option<EntryKind> {
    if meta.is_dir() {
        Some(EntryKind::Directory)
    } else if meta.is_file() {
        Some(EntryKind::File)
    } else {
        None
    }
}

/// Kind of the entry at `real`, following symlinks. Dangling links and
/// special files report `None`.
fn kind_at(real: &Path) -> io::Result<Option<EntryKind>> {
    match fs::metadata(real) {
        Ok(meta) => Ok(kind_from_metadata(&meta)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl StorageBackend for LocalBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        "Local Filesystem"
    }

    fn capabilities(&self) -> &StorageCapabilities {
        &self.capabilities
    }

    fn locks(&self) -> &dyn LockManager {
        &self.locks
    }

    fn kind_of(&self, path: &VirtualPath) -> ArborResult<Option<EntryKind>> {
        let real = self.to_real_path(path)?;
        kind_at(&real).map_err(|e| ArborError::from_io(e, path))
    }

    fn metadata(&self, path: &VirtualPath) -> ArborResult<Metadata> {
        let real = self.to_real_path(path)?;
        let meta = fs::metadata(&real).map_err(|e| ArborError::from_io(e, path))?;
        let kind = kind_from_metadata(&meta)
            .ok_or_else(|| ArborError::Unsupported(format!("{} is not a file or directory", path)))?;

        let mut metadata = Metadata::new(kind);
        if kind == EntryKind::File {
            metadata.size = Some(meta.len());
        }
        if let Ok(modified) = meta.modified() {
            metadata.modified = Some(modified.into());
        }
        if let Ok(created) = meta.created() {
            metadata.created = Some(created.into());
        }
        Ok(metadata)
    }

    fn list_directory(&self, path: &VirtualPath) -> ArborResult<EntryIter> {
        let real = self.to_real_path(path)?;
        match kind_at(&real).map_err(|e| ArborError::from_io(e, path))? {
            Some(EntryKind::Directory) => {}
            Some(EntryKind::File) => return Err(ArborError::NotADirectory(path.to_string())),
            None => return Err(ArborError::NotFound(path.to_string())),
        }

        let read_dir = fs::read_dir(&real).map_err(|e| ArborError::from_io(e, path))?;
        let parent = path.clone();
        let entries = read_dir.filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(ArborError::from_io(e, &parent))),
            };
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    return Some(Err(ArborError::InvalidPath(format!(
                        "{} contains a name that is not valid UTF-8: {:?}",
                        parent, raw
                    ))))
                }
            };
            let child = match parent.child(&name) {
                Ok(child) => child,
                Err(e) => return Some(Err(e)),
            };
            match kind_at(&entry.path()) {
                Ok(Some(EntryKind::File)) => Some(Ok(Entry::file(child))),
                Ok(Some(EntryKind::Directory)) => Some(Ok(Entry::directory(child))),
                Ok(None) => {
                    trace!(path = %child, "skipping entry that is neither file nor directory");
                    None
                }
                Err(e) => Some(Err(ArborError::from_io(e, &child))),
            }
        });
        Ok(Box::new(entries))
    }

    fn create_directory(&self, path: &VirtualPath) -> ArborResult<()> {
        let real = self.to_real_path(path)?;
        fs::create_dir(&real).map_err(|e| ArborError::from_io(e, path))
    }

    fn remove_directory(&self, path: &VirtualPath) -> ArborResult<()> {
        let real = self.to_real_path(path)?;
        fs::remove_dir_all(&real).map_err(|e| ArborError::from_io(e, path))?;
        debug!(path = %real.display(), "removed directory tree");
        Ok(())
    }

    fn remove_file(&self, path: &VirtualPath) -> ArborResult<()> {
        let real = self.to_real_path(path)?;
        fs::remove_file(&real).map_err(|e| ArborError::from_io(e, path))
    }

    fn open_read(&self, path: &VirtualPath) -> ArborResult<ByteReader> {
        let real = self.to_real_path(path)?;
        if real.is_dir() {
            return Err(ArborError::NotAFile(path.to_string()));
        }
        let file = fs::File::open(&real).map_err(|e| ArborError::from_io(e, path))?;
        Ok(Box::new(io::BufReader::new(file)))
    }

    fn open_write(&self, path: &VirtualPath) -> ArborResult<ByteWriter> {
        let real = self.to_real_path(path)?;
        if real.is_dir() {
            return Err(ArborError::NotAFile(path.to_string()));
        }
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&real)
            .map_err(|e| ArborError::from_io(e, path))?;
        Ok(Box::new(file))
    }

    fn rename(&self, source: &VirtualPath, dest: &VirtualPath) -> ArborResult<()> {
        let src_real = self.to_real_path(source)?;
        let dst_real = self.to_real_path(dest)?;

        if !src_real.exists() {
            return Err(ArborError::NotFound(source.to_string()));
        }
        if dst_real.exists() {
            return Err(ArborError::AlreadyExists(dest.to_string()));
        }

        fs::rename(&src_real, &dst_real).map_err(|e| ArborError::from_io(e, dest))?;
        debug!(src = %src_real.display(), dst = %dst_real.display(), "renamed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("local", dir.path());
        (dir, backend)
    }

    fn vp(p: &str) -> VirtualPath {
        VirtualPath::new("local", p)
    }

    #[test]
    fn test_kind_of() {
        let (dir, backend) = backend();
        fs::create_dir(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("f.txt"), b"x").unwrap();

        assert_eq!(backend.kind_of(&vp("/d")).unwrap(), Some(EntryKind::Directory));
        assert_eq!(backend.kind_of(&vp("/f.txt")).unwrap(), Some(EntryKind::File));
        assert_eq!(backend.kind_of(&vp("/missing")).unwrap(), None);
        assert_eq!(backend.kind_of(&VirtualPath::root("local")).unwrap(), Some(EntryKind::Directory));
    }

    #[test]
    fn test_rejects_foreign_backend_paths() {
        let (_dir, backend) = backend();
        let err = backend.kind_of(&VirtualPath::new("mem", "/a")).unwrap_err();
        assert!(matches!(err, ArborError::InvalidPath(_)));
    }

    #[test]
    fn test_list_directory() {
        let (dir, backend) = backend();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let mut entries: Vec<_> = backend
            .list_directory(&VirtualPath::root("local"))
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        entries.sort_by(|a, b| a.path.segments.cmp(&b.path.segments));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], Entry::file(vp("/a.txt")));
        assert_eq!(entries[1], Entry::directory(vp("/sub")));
    }

    #[test]
    fn test_list_missing_and_file() {
        let (dir, backend) = backend();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        assert!(backend.list_directory(&vp("/nope")).err().unwrap().is_not_found());
        assert!(matches!(
            backend.list_directory(&vp("/a.txt")),
            Err(ArborError::NotADirectory(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_list_skips_dangling_symlinks() {
        let (dir, backend) = backend();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("link")).unwrap();
        fs::write(dir.path().join("real.txt"), b"r").unwrap();

        let entries: Vec<_> = backend
            .list_directory(&VirtualPath::root("local"))
            .unwrap()
            .collect::<ArborResult<_>>()
            .unwrap();
        assert_eq!(entries, vec![Entry::file(vp("/real.txt"))]);
    }

    #[cfg(unix)]
    #[test]
    fn test_list_fails_on_non_utf8_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let (dir, backend) = backend();
        let raw = OsStr::from_bytes(b"bad\xff.txt");
        if fs::write(dir.path().join(raw), b"x").is_err() {
            // Some filesystems refuse non-UTF-8 names outright.
            return;
        }

        let items: Vec<_> = backend
            .list_directory(&VirtualPath::root("local"))
            .unwrap()
            .collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ArborError::InvalidPath(_))));
    }

    #[test]
    fn test_create_directory_needs_parent() {
        let (dir, backend) = backend();
        let err = backend.create_directory(&vp("/a/b")).unwrap_err();
        assert!(err.is_not_found());
        backend.create_directory(&vp("/a")).unwrap();
        backend.create_directory(&vp("/a/b")).unwrap();
        assert!(dir.path().join("a/b").is_dir());

        let err = backend.create_directory(&vp("/a")).unwrap_err();
        assert!(matches!(err, ArborError::AlreadyExists(_)));
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, backend) = backend();
        let path = vp("/data.bin");
        {
            let mut w = backend.open_write(&path).unwrap();
            w.write_all(b"hello").unwrap();
        }
        // Reopening truncates.
        {
            let mut w = backend.open_write(&path).unwrap();
            w.write_all(b"hi").unwrap();
        }
        let mut buf = String::new();
        backend.open_read(&path).unwrap().read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hi");

        let meta = backend.metadata(&path).unwrap();
        assert_eq!(meta.kind, EntryKind::File);
        assert_eq!(meta.size, Some(2));
        assert!(meta.modified.is_some());
    }

    #[test]
    fn test_open_read_missing() {
        let (_dir, backend) = backend();
        let err = backend.open_read(&vp("/none")).err().unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_remove_directory_recursive() {
        let (dir, backend) = backend();
        fs::create_dir_all(dir.path().join("t/u/v")).unwrap();
        fs::write(dir.path().join("t/u/v/f"), b"x").unwrap();

        backend.remove_directory(&vp("/t")).unwrap();
        assert!(!dir.path().join("t").exists());
    }

    #[test]
    fn test_rename_tree() {
        let (dir, backend) = backend();
        fs::create_dir_all(dir.path().join("src/sub")).unwrap();
        fs::write(dir.path().join("src/sub/b.txt"), b"yo").unwrap();

        backend.rename(&vp("/src"), &vp("/dst")).unwrap();
        assert!(!dir.path().join("src").exists());
        assert_eq!(fs::read(dir.path().join("dst/sub/b.txt")).unwrap(), b"yo");

        fs::create_dir(dir.path().join("other")).unwrap();
        let err = backend.rename(&vp("/dst"), &vp("/other")).unwrap_err();
        assert!(matches!(err, ArborError::AlreadyExists(_)));
    }
}
