//! Per-file exclusive locks with bounded waits.
//!
//! A [`FileLock`] is released when it is dropped, so every exit path of the
//! scope that acquired it gives the lock back.

use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

use crate::error::{ArborError, ArborResult};
use crate::VirtualPath;

/// Exclusive, timeout-bounded locking of file locators.
pub trait LockManager: Send + Sync {
    /// Block for at most `timeout` trying to take the lock on `path`.
    ///
    /// Fails with [`ArborError::LockTimeout`] if the lock is still held by
    /// someone else when the budget runs out.
    fn acquire(&self, path: &VirtualPath, timeout: Duration) -> ArborResult<FileLock>;
}

/// RAII guard for a held lock.
pub struct FileLock {
    path: VirtualPath,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl FileLock {
    /// Wrap a held lock; `release` runs exactly once, on drop.
    pub fn new(path: VirtualPath, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            path,
            release: Some(Box::new(release)),
        }
    }

    pub fn path(&self) -> &VirtualPath {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            trace!(path = %self.path, "lock released");
        }
    }
}

impl fmt::Debug for FileLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLock").field("path", &self.path).finish()
    }
}

#[derive(Default)]
struct LockTable {
    held: Mutex<HashSet<VirtualPath>>,
    released: Condvar,
}

impl LockTable {
    fn release(&self, path: &VirtualPath) {
        self.held.lock().remove(path);
        self.released.notify_all();
    }
}

/// Lock manager for callers sharing one process.
///
/// Only locators that are currently locked are kept in the table.
#[derive(Clone, Default)]
pub struct InProcessLockManager {
    table: Arc<LockTable>,
}

impl InProcessLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, path: &VirtualPath) -> bool {
        self.table.held.lock().contains(path)
    }
}

impl LockManager for InProcessLockManager {
    fn acquire(&self, path: &VirtualPath, timeout: Duration) -> ArborResult<FileLock> {
        let start = Instant::now();
        let deadline = start.checked_add(timeout);
        let mut held = self.table.held.lock();

        while held.contains(path) {
            match deadline {
                Some(deadline) => {
                    if self.table.released.wait_until(&mut held, deadline).timed_out()
                        && held.contains(path)
                    {
                        trace!(path = %path, ?timeout, "lock timed out");
                        return Err(ArborError::LockTimeout {
                            path: path.to_string(),
                            timeout,
                        });
                    }
                }
                None => self.table.released.wait(&mut held),
            }
        }
        held.insert(path.clone());
        drop(held);

        let waited = start.elapsed();
        if waited.is_zero() {
            trace!(path = %path, "lock acquired immediately");
        } else {
            trace!(path = %path, ?waited, "lock acquired after wait");
        }

        let table = Arc::clone(&self.table);
        let key = path.clone();
        Ok(FileLock::new(path.clone(), move || table.release(&key)))
    }
}
