//! Install-root relative paths
//!
//! Game files are looked up case-insensitively and with either separator, so two spellings of the
//! same file have to land on the same cache entry. [`CanonicalPath`] compares and hashes by a
//! normalized key and keeps the first spelling for file system access.

use derive_more::derive::Display;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Display)]
#[display("{display}")]
pub struct CanonicalPath {
    key: String,
    display: String,
}

impl CanonicalPath {
    /// Normalize a relative path. `.` segments are dropped and `..` segments are resolved, a path
    /// climbing above the root is rejected.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        let drive = raw
            .split(['/', '\\'])
            .next()
            .is_some_and(|first| first.ends_with(':'));
        if drive || raw.starts_with(['/', '\\']) {
            return Err(Error::PathEscapesRoot(raw.to_string()));
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(Error::PathEscapesRoot(raw.to_string()));
                    }
                }
                segment => segments.push(segment),
            }
        }
        if segments.is_empty() {
            return Err(Error::InvalidPath(raw.to_string()));
        }

        let display = segments.join("/");
        Ok(Self {
            key: display.to_lowercase(),
            display,
        })
    }

    /// Normalize a relative [`Path`]. Paths that are not valid UTF-8 are rejected.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = path
            .to_str()
            .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;
        Self::new(raw)
    }

    /// Path with `/` separators, as first spelled
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Lowercase comparison key
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn file_name(&self) -> &str {
        self.display
            .rsplit_once('/')
            .map_or(self.display.as_str(), |(_, name)| name)
    }

    /// Split off the first segment
    pub fn split_first(&self) -> (&str, Option<&str>) {
        match self.display.split_once('/') {
            Some((first, rest)) => (first, Some(rest)),
            None => (self.display.as_str(), None),
        }
    }

    /// Location below `root`
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(self.display.split('/'));
        path
    }
}

impl PartialEq for CanonicalPath {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for CanonicalPath {}

impl Hash for CanonicalPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
