//! Virtual path abstraction

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ArborError, ArborResult};

const URI_SCHEME: &str = "arbor://";

/// Locator for a node inside one backend.
///
/// Two paths are equal when both the backend id and the segments match; this
/// is what makes nodes built from the same location compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualPath {
    /// Backend identifier (e.g., "local", "mem")
    pub backend: String,
    /// Path segments
    pub segments: Vec<String>,
}

impl VirtualPath {
    pub fn new(backend: impl Into<String>, path: impl AsRef<str>) -> Self {
        Self::root(backend).join(path)
    }

    pub fn root(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            segments: Vec::new(),
        }
    }

    pub fn join(&self, name: impl AsRef<str>) -> Self {
        let mut segments = self.segments.clone();
        for part in name.as_ref().split('/').filter(|s| !s.is_empty()) {
            if part == ".." {
                segments.pop();
            } else if part != "." {
                segments.push(part.to_string());
            }
        }
        Self {
            backend: self.backend.clone(),
            segments,
        }
    }

    /// Append exactly one segment, rejecting anything that would not name a
    /// direct child.
    pub fn child(&self, name: &str) -> ArborResult<Self> {
        validate_segment(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self {
            backend: self.backend.clone(),
            segments,
        })
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            let mut segments = self.segments.clone();
            segments.pop();
            Some(Self {
                backend: self.backend.clone(),
                segments,
            })
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    pub fn extension(&self) -> Option<&str> {
        self.name().and_then(|n| n.rsplit_once('.')).map(|(_, ext)| ext)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Re-root this path under another backend/prefix, keeping the part below `from`.
    pub fn rebase(&self, from: &VirtualPath, onto: &VirtualPath) -> Option<Self> {
        if self.backend != from.backend || !self.segments.starts_with(&from.segments) {
            return None;
        }
        let mut segments = onto.segments.clone();
        segments.extend_from_slice(&self.segments[from.segments.len()..]);
        Some(Self {
            backend: onto.backend.clone(),
            segments,
        })
    }

    pub fn to_path_string(&self) -> String {
        if self.segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.segments.join("/"))
        }
    }

    pub fn to_uri(&self) -> String {
        format!("{}{}{}", URI_SCHEME, self.backend, self.to_path_string())
    }

    pub fn parse_uri(uri: &str) -> Option<Self> {
        let uri = uri.strip_prefix(URI_SCHEME)?;
        let (backend, path) = uri.split_once('/').unwrap_or((uri, ""));
        if backend.is_empty() {
            return None;
        }
        Some(Self::new(backend, path))
    }
}

fn validate_segment(name: &str) -> ArborResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0')
    {
        return Err(ArborError::InvalidPath(format!(
            "'{}' is not a valid child name",
            name
        )));
    }
    Ok(())
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}
