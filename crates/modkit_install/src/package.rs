//! Mod packages
//!
//! A package is a tree of files whose top level directory says what to do with them:
//!
//! | Location            | Action                                                           |
//! |---------------------|------------------------------------------------------------------|
//! | `files/<path>`      | copied to `<path>` below the install root                        |
//! | `tables/<path>`     | merged by index into the table at `<path>`, format from the file |
//! | `bgm/<title>.hca`   | installed as a new music track named `<title>`                   |
//!
//! Anything else is ignored.

use std::fs;
use std::path::PathBuf;
use tracing::trace;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::path::CanonicalPath;

/// One file of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub path: CanonicalPath,
    pub data: Vec<u8>,
}

/// What a package entry installs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRole {
    File(CanonicalPath),
    Table(CanonicalPath),
    Music { title: String },
    Unknown,
}

impl PackageEntry {
    pub fn new(path: impl AsRef<str>, data: impl Into<Vec<u8>>) -> Result<Self> {
        Ok(Self {
            path: CanonicalPath::new(path)?,
            data: data.into(),
        })
    }

    pub fn role(&self) -> Result<EntryRole> {
        let (first, Some(rest)) = self.path.split_first() else {
            return Ok(EntryRole::Unknown);
        };

        Ok(match first.to_ascii_lowercase().as_str() {
            "files" => EntryRole::File(CanonicalPath::new(rest)?),
            "tables" => EntryRole::Table(CanonicalPath::new(rest)?),
            "bgm" => match rest.rsplit_once('.') {
                Some((title, extension))
                    if extension.eq_ignore_ascii_case("hca")
                        && !title.is_empty()
                        && !title.contains('/') =>
                {
                    EntryRole::Music {
                        title: title.to_string(),
                    }
                }
                _ => EntryRole::Unknown,
            },
            _ => EntryRole::Unknown,
        })
    }
}

/// Where package entries come from
pub trait PackageSource {
    fn entries(&self) -> Result<Vec<PackageEntry>>;
}

impl PackageSource for Vec<PackageEntry> {
    fn entries(&self) -> Result<Vec<PackageEntry>> {
        Ok(self.clone())
    }
}

/// Package unpacked into a directory
#[derive(Debug, Clone)]
pub struct DirectoryPackage {
    root: PathBuf,
}

impl DirectoryPackage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PackageSource for DirectoryPackage {
    /// Every file below the root, sorted by path
    fn entries(&self) -> Result<Vec<PackageEntry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|_| Error::InvalidPath(entry.path().display().to_string()))?;
            let data = fs::read(entry.path()).map_err(|source| Error::Io {
                action: "reading",
                path: entry.path().to_path_buf(),
                source,
            })?;

            trace!(path = %relative.display(), len = data.len(), "package entry");
            entries.push(PackageEntry {
                path: CanonicalPath::from_path(relative)?,
                data,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use std::fs;

    use super::{DirectoryPackage, EntryRole, PackageEntry, PackageSource};
    use crate::error::Result;
    use crate::path::CanonicalPath;

    #[test]
    fn roles() -> Result<()> {
        let role = |path: &str| PackageEntry::new(path, Vec::<u8>::new())?.role();

        assert_eq!(
            role("files/data/ui/title.dds")?,
            EntryRole::File(CanonicalPath::new("data/ui/title.dds")?)
        );
        assert_eq!(
            role("Tables\\data\\cue.bin")?,
            EntryRole::Table(CanonicalPath::new("data/cue.bin")?)
        );
        assert_eq!(
            role("bgm/Solid State Scouter.HCA")?,
            EntryRole::Music {
                title: "Solid State Scouter".into()
            }
        );
        assert_eq!(role("bgm/nested/x.hca")?, EntryRole::Unknown);
        assert_eq!(role("readme.txt")?, EntryRole::Unknown);
        Ok(())
    }

    #[test]
    fn directory_walk() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("files/b")).unwrap();
        fs::write(dir.path().join("files/b/2.bin"), [2u8]).unwrap();
        fs::write(dir.path().join("files/a.bin"), [1u8]).unwrap();

        let entries = DirectoryPackage::new(dir.path()).entries()?;
        let paths = entries
            .iter()
            .map(|e| e.path.as_str().to_string())
            .collect::<Vec<_>>();
        assert_eq!(paths, vec!["files/a.bin", "files/b/2.bin"]);
        assert_eq!(entries[0].data, vec![1]);
        Ok(())
    }
}
