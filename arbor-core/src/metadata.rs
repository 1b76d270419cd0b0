//! File and directory metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::EntryKind;

/// File/directory metadata. Backends leave fields they cannot report as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl Metadata {
    pub fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            size: None,
            created: None,
            modified: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }
}
