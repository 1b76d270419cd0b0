//! Files and their scoped read/write handles

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{trace, warn};

use crate::{
    backend::{ByteReader, ByteWriter},
    entry::EntryKind,
    error::{ArborError, ArborResult},
    lock::FileLock,
    node::FsNode,
    FileSystem, VirtualPath,
};

/// Locator for a file. The file does not have to exist.
#[derive(Clone)]
pub struct File {
    fs: FileSystem,
    path: VirtualPath,
}

impl File {
    pub(crate) fn new(fs: FileSystem, path: VirtualPath) -> Self {
        Self { fs, path }
    }

    fn lock(&self, timeout: Duration) -> ArborResult<FileLock> {
        self.fs.backend().locks().acquire(&self.path, timeout)
    }

    /// Lock the file and open it for reading.
    ///
    /// Waits at most `timeout` for the lock. Fails with `NotFound` if the file
    /// does not exist.
    pub fn open_readable(&self, timeout: Duration) -> ArborResult<ReadableFile> {
        let lock = self.lock(timeout)?;
        let reader = self.fs.backend().open_read(&self.path)?;
        trace!(path = %self.path, "opened for read");
        Ok(ReadableFile {
            reader,
            path: self.path.clone(),
            _lock: lock,
        })
    }

    /// Lock the file and open it for writing, creating or truncating it.
    ///
    /// Waits at most `timeout` for the lock. Fails with `NotFound` if the
    /// parent folder does not exist.
    pub fn open_writable(&self, timeout: Duration) -> ArborResult<WritableFile> {
        if !self.fs.backend().capabilities().write {
            return Err(ArborError::Unsupported(format!(
                "backend '{}' is read-only",
                self.fs.id()
            )));
        }
        let lock = self.lock(timeout)?;
        let writer = self.fs.backend().open_write(&self.path)?;
        trace!(path = %self.path, "opened for write");
        Ok(WritableFile {
            writer,
            path: self.path.clone(),
            _lock: lock,
        })
    }

    pub fn read_to_vec(&self) -> ArborResult<Vec<u8>> {
        let mut src = self.open_readable(self.fs.config().locks.source_read())?;
        let mut buf = Vec::new();
        src.read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn write_bytes(&self, data: &[u8]) -> ArborResult<()> {
        let mut dst = self.open_writable(self.fs.config().locks.source_read())?;
        dst.write_all(data)?;
        dst.finish()
    }

    /// Replace the content of `target` with this file's content.
    pub fn copy_to(&self, target: &File) -> ArborResult<u64> {
        if self == target {
            return Err(ArborError::InvalidOperation(format!(
                "can not copy file onto itself ({})",
                self.path
            )));
        }
        let timeout = self.fs.config().locks.source_read();
        let mut src = self.open_readable(timeout)?;
        let mut dst = target.open_writable(timeout)?;
        let copied = src.copy_to(&mut dst)?;
        dst.finish()?;
        Ok(copied)
    }

    /// Move this file to `target`, replacing it if present.
    pub fn move_to(&self, target: &File) -> ArborResult<()> {
        if self == target {
            return Err(ArborError::InvalidOperation(format!(
                "can not move file onto itself ({})",
                self.path
            )));
        }
        if self.fs.can_rename_to(&target.fs) {
            match self.rename_to(target) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_timeout() || e.is_not_found() => return Err(e),
                Err(e) => {
                    warn!(src = %self.path, dst = %target.path, error = %e, "rename failed, falling back to copy");
                }
            }
        }
        self.copy_to(target)?;
        self.delete()
    }

    fn rename_to(&self, target: &File) -> ArborResult<()> {
        let timeout = self.fs.config().locks.source_read();
        let _src = self.lock(timeout)?;
        let _dst = target.lock(timeout)?;
        if !self.exists()? {
            return Err(ArborError::NotFound(self.path.to_string()));
        }
        let backend = self.fs.backend();
        if target.exists()? {
            backend.remove_file(&target.path)?;
        }
        backend.rename(&self.path, &target.path)
    }

    /// Remove the file once no handle holds its lock. Missing files are ignored.
    pub fn delete(&self) -> ArborResult<()> {
        let _lock = self.lock(self.fs.config().locks.source_read())?;
        if !self.exists()? {
            return Ok(());
        }
        self.fs.backend().remove_file(&self.path)?;
        trace!(path = %self.path, "deleted file");
        Ok(())
    }
}

impl FsNode for File {
    fn filesystem(&self) -> &FileSystem {
        &self.fs
    }

    fn path(&self) -> &VirtualPath {
        &self.path
    }

    fn exists(&self) -> ArborResult<bool> {
        Ok(self.fs.backend().kind_of(&self.path)? == Some(EntryKind::File))
    }
}

/// Same location: same backend instance and same path.
impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.fs.shares_backend_with(&other.fs)
    }
}

impl Eq for File {}

impl Hash for File {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("File").field(&self.path.to_uri()).finish()
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// Read handle holding the file's lock until dropped.
pub struct ReadableFile {
    // Declared before the lock so the stream closes before the lock is released.
    reader: ByteReader,
    path: VirtualPath,
    _lock: FileLock,
}

impl ReadableFile {
    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    /// Stream the rest of this file into `dst`, returning the byte count.
    pub fn copy_to(&mut self, dst: &mut WritableFile) -> ArborResult<u64> {
        let copied = io::copy(&mut self.reader, &mut dst.writer)?;
        trace!(src = %self.path, dst = %dst.path, bytes = copied, "copied file content");
        Ok(copied)
    }
}

impl fmt::Debug for ReadableFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadableFile").field("path", &self.path).finish()
    }
}

impl Read for ReadableFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Write handle holding the file's lock until dropped.
pub struct WritableFile {
    writer: ByteWriter,
    path: VirtualPath,
    _lock: FileLock,
}

impl WritableFile {
    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    /// Flush and release the lock, reporting flush errors that a plain drop
    /// would lose.
    pub fn finish(mut self) -> ArborResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl fmt::Debug for WritableFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WritableFile").field("path", &self.path).finish()
    }
}

impl Write for WritableFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
