//! Record of what an install added
//!
//! The uninstaller only needs the manifest and the install root to undo an install. How the
//! manifest is stored is up to the caller.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A table entry written by an install
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstalledEntry {
    pub path: String,
    pub index: String,

    /// The record this entry replaced, encoded as a one record table of the same format.
    /// `None` when the index was new.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub prior: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstallManifest {
    /// Files that did not exist before the install
    pub created_files: Vec<String>,

    /// Entries merged into existing or new tables
    pub table_entries: Vec<InstalledEntry>,

    /// Cue ids allocated for new music tracks
    pub cue_ids: Vec<u32>,
}

impl InstallManifest {
    pub fn is_empty(&self) -> bool {
        self.created_files.is_empty() && self.table_entries.is_empty() && self.cue_ids.is_empty()
    }

    pub(crate) fn record_file(&mut self, path: &str) {
        if !self.created_files.iter().any(|p| p.eq_ignore_ascii_case(path)) {
            self.created_files.push(path.to_string());
        }
    }

    /// Whether `index` of the table at `path` was already written by this install
    pub fn has_entry(&self, path: &str, index: &str) -> bool {
        self.table_entries
            .iter()
            .any(|e| e.path.eq_ignore_ascii_case(path) && e.index == index)
    }

    /// Keeps the first record of an index, its prior is the state before the install.
    pub(crate) fn record_entry(&mut self, entry: InstalledEntry) {
        if !self.has_entry(&entry.path, &entry.index) {
            self.table_entries.push(entry);
        }
    }
}
