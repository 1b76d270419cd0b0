//! File system entries

use crate::VirtualPath;
use serde::{Deserialize, Serialize};

/// Entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// One item of a directory listing, as reported by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: VirtualPath,
    pub kind: EntryKind,
}

impl Entry {
    pub fn file(path: VirtualPath) -> Self {
        Self { path, kind: EntryKind::File }
    }

    pub fn directory(path: VirtualPath) -> Self {
        Self { path, kind: EntryKind::Directory }
    }
}
