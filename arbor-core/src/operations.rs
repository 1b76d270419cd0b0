//! Operation options

use serde::{Deserialize, Serialize};

/// What [`Folder::create`](crate::Folder::create) does about a missing parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderCreateMode {
    /// Fail with `NotFound` if the immediate parent does not exist.
    FailIfParentIsMissing,
    /// Create every missing ancestor first.
    IncludingParents,
}

impl FolderCreateMode {
    pub fn creates_parents(self) -> bool {
        self == FolderCreateMode::IncludingParents
    }
}
