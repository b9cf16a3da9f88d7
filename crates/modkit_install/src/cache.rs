//! Per-run cache of the files an install touches
//!
//! Every path passes through these states, a path that was never touched is not in the cache:
//!
//! ```text
//! Cached(model, backup) -> Committed -> RolledBack
//!                       -> Removed   -> RolledBack
//! ```
//!
//! The backup of a path is taken the first time it is touched, before anything is written. Files
//! up to the backup ceiling are copied whole. Bigger tables only keep the prior state of the
//! records the run touches, bigger raw files cannot be restored.

use derive_more::derive::Display;
use indexmap::IndexMap;
use modkit_formats::{AnyTable, TableKind, TableVariant};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, RestoreError, Result};
use crate::path::CanonicalPath;

/// What a cached path holds
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    #[display("table")]
    Model,

    #[display("raw file")]
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    /// Loaded, possibly modified in memory
    Cached,

    /// Written to disk
    Committed,

    /// Deleted from disk
    Removed,

    /// Put back to its prior state
    RolledBack,
}

/// Prior state of a path
#[derive(Debug, Clone, PartialEq)]
pub enum Backup {
    /// The file did not exist
    Absent,

    /// Complete prior content
    Bytes(Vec<u8>),

    /// Prior state of the touched records only. Indices missing from `prior` did not exist.
    Records {
        prior: AnyTable,
        touched: Vec<String>,
    },

    /// Nothing could be captured
    Unavailable(RestoreError),
}

#[derive(Debug)]
enum Content {
    Model(AnyTable),

    /// `None` deletes the file on commit
    Stream(Option<Vec<u8>>),
}

impl Content {
    fn kind(&self) -> CacheKind {
        match self {
            Content::Model(_) => CacheKind::Model,
            Content::Stream(_) => CacheKind::Stream,
        }
    }
}

#[derive(Debug)]
struct CachedFile {
    content: Content,
    backup: Backup,
    state: PathState,
    dirty: bool,
}

/// Outcome of a rollback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<String>,
    pub removed: Vec<String>,
    pub skipped: Vec<(String, RestoreError)>,
}

impl RestoreReport {
    /// Whether every path was handled
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl fmt::Display for RestoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} restored, {} removed, {} skipped",
            self.restored.len(),
            self.removed.len(),
            self.skipped.len()
        )
    }
}

fn io_error<'a>(
    action: &'static str,
    path: &'a Path,
) -> impl FnOnce(std::io::Error) -> Error + 'a {
    move |source| Error::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error("creating", parent))?;
    }
    fs::write(path, data).map_err(io_error("writing", path))
}

fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(io_error("removing", path)(err)),
        _ => Ok(()),
    }
}

/// Files of one run, in the order they were first touched
#[derive(Debug)]
pub struct FileCache {
    root: PathBuf,
    backup_ceiling: u64,
    files: IndexMap<CanonicalPath, CachedFile>,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>, backup_ceiling: u64) -> Self {
        Self {
            root: root.into(),
            backup_ceiling,
            files: IndexMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the file exists, as this run will leave it
    pub fn exists(&self, path: &CanonicalPath) -> bool {
        match self.files.get(path) {
            Some(CachedFile {
                content: Content::Stream(None),
                ..
            }) => false,
            Some(CachedFile { dirty: true, .. }) => true,
            _ => path.to_path(&self.root).is_file(),
        }
    }

    pub fn state(&self, path: &CanonicalPath) -> Option<PathState> {
        self.files.get(path).map(|f| f.state)
    }

    pub fn backup(&self, path: &CanonicalPath) -> Option<&Backup> {
        self.files.get(path).map(|f| &f.backup)
    }

    fn conflict(path: &CanonicalPath, cached: CacheKind, requested: CacheKind) -> Error {
        Error::CacheTypeConflict {
            path: path.to_string(),
            cached,
            requested,
        }
    }

    /// Decode the table at `path` into the cache. A missing file starts out as an empty table of
    /// `kind`.
    pub fn load(&mut self, path: &CanonicalPath, kind: TableKind) -> Result<()> {
        self.load_as(path, Some(kind)).map(|_| ())
    }

    /// Decode the existing table at `path` into the cache, whatever its format.
    pub fn load_existing(&mut self, path: &CanonicalPath) -> Result<TableKind> {
        self.load_as(path, None)
    }

    #[instrument(skip_all, fields(path = %path, ?expected), err)]
    fn load_as(&mut self, path: &CanonicalPath, expected: Option<TableKind>) -> Result<TableKind> {
        let mismatch = |expected: TableKind, found: TableKind| Error::TableKindMismatch {
            path: path.to_string(),
            expected,
            found,
        };

        if let Some(file) = self.files.get(path) {
            return match (&file.content, expected) {
                (Content::Model(table), Some(kind)) if table.kind() != kind => {
                    Err(mismatch(kind, table.kind()))
                }
                (Content::Model(table), _) => Ok(table.kind()),
                (Content::Stream(_), _) => {
                    Err(Self::conflict(path, CacheKind::Stream, CacheKind::Model))
                }
            };
        }

        let full = path.to_path(&self.root);
        let (table, backup) = match (fs::read(&full), expected) {
            (Err(err), Some(kind)) if err.kind() == ErrorKind::NotFound => {
                (AnyTable::empty(kind), Backup::Absent)
            }
            (Err(err), _) => return Err(io_error("reading", &full)(err)),
            (Ok(bytes), _) => {
                let table = AnyTable::decode(&bytes)?;
                let kind = table.kind();
                if let Some(expected) = expected.filter(|expected| *expected != kind) {
                    return Err(mismatch(expected, kind));
                }

                let backup = if bytes.len() as u64 <= self.backup_ceiling {
                    Backup::Bytes(bytes)
                } else {
                    debug!(size = bytes.len(), "keeping record level backup");
                    Backup::Records {
                        prior: AnyTable::empty(kind),
                        touched: Vec::new(),
                    }
                };
                (table, backup)
            }
        };

        let kind = table.kind();
        debug!(%kind, entries = table.len(), "cached table");
        self.files.insert(
            path.clone(),
            CachedFile {
                content: Content::Model(table),
                backup,
                state: PathState::Cached,
                dirty: false,
            },
        );
        Ok(kind)
    }

    /// Cached table for reading, if loaded
    pub fn table(&self, path: &CanonicalPath) -> Option<&AnyTable> {
        match self.files.get(path) {
            Some(CachedFile {
                content: Content::Model(table),
                ..
            }) => Some(table),
            _ => None,
        }
    }

    /// Load the table at `path` for writing.
    pub fn table_mut(&mut self, path: &CanonicalPath, kind: TableKind) -> Result<&mut AnyTable> {
        self.load(path, kind)?;
        match self.files.get_mut(path) {
            Some(CachedFile {
                content: Content::Model(table),
                dirty,
                ..
            }) => {
                *dirty = true;
                Ok(table)
            }
            _ => Err(Error::NotCached(path.to_string())),
        }
    }

    /// Typed table for reading, if loaded as `T`
    pub fn model_ref<T: TableVariant>(&self, path: &CanonicalPath) -> Option<&T> {
        self.table(path).and_then(AnyTable::downcast_ref)
    }

    /// Load the table at `path` as `T` for writing.
    pub fn model<T: TableVariant>(&mut self, path: &CanonicalPath) -> Result<&mut T> {
        let table = self.table_mut(path, T::KIND)?;
        let found = table.kind();
        table.downcast_mut().ok_or_else(|| Error::TableKindMismatch {
            path: path.to_string(),
            expected: T::KIND,
            found,
        })
    }

    /// Capture the prior state of `indices` before they are modified. Only tables above the backup
    /// ceiling need this, for all others it does nothing.
    pub fn touch_records(&mut self, path: &CanonicalPath, indices: &[String]) -> Result<()> {
        let file = self
            .files
            .get_mut(path)
            .ok_or_else(|| Error::NotCached(path.to_string()))?;

        let CachedFile {
            content, backup, ..
        } = file;
        if let (Content::Model(table), Backup::Records { prior, touched }) = (content, backup) {
            let fresh = indices
                .iter()
                .filter(|index| !touched.contains(index))
                .cloned()
                .collect::<Vec<_>>();
            prior.merge(&table.select(&fresh))?;
            touched.extend(fresh);
        }
        Ok(())
    }

    fn stream_backup(&self, path: &CanonicalPath) -> Result<Backup> {
        let full = path.to_path(&self.root);
        let size = match fs::metadata(&full) {
            Ok(metadata) => metadata.len(),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Backup::Absent),
            Err(err) => return Err(io_error("inspecting", &full)(err)),
        };

        if size > self.backup_ceiling {
            return Ok(Backup::Unavailable(RestoreError::TooLarge {
                size,
                ceiling: self.backup_ceiling,
            }));
        }
        Ok(match fs::read(&full) {
            Ok(bytes) => Backup::Bytes(bytes),
            Err(err) => Backup::Unavailable(RestoreError::Unreadable(err.to_string())),
        })
    }

    fn set_stream(&mut self, path: &CanonicalPath, data: Option<Vec<u8>>) -> Result<()> {
        if let Some(file) = self.files.get_mut(path) {
            return match &mut file.content {
                Content::Stream(slot) => {
                    *slot = data;
                    file.dirty = true;
                    Ok(())
                }
                content => Err(Self::conflict(path, content.kind(), CacheKind::Stream)),
            };
        }

        let backup = self.stream_backup(path)?;
        self.files.insert(
            path.clone(),
            CachedFile {
                content: Content::Stream(data),
                backup,
                state: PathState::Cached,
                dirty: true,
            },
        );
        Ok(())
    }

    /// Replace the file at `path` with `data` on commit.
    pub fn write_stream(&mut self, path: &CanonicalPath, data: Vec<u8>) -> Result<()> {
        self.set_stream(path, Some(data))
    }

    /// Delete the file at `path` on commit.
    pub fn remove_stream(&mut self, path: &CanonicalPath) -> Result<()> {
        self.set_stream(path, None)
    }

    /// Write every modified path. All tables are encoded before the first write, so encoding
    /// errors leave the disk untouched.
    #[instrument(skip_all, err)]
    pub fn commit(&mut self) -> Result<Vec<(CanonicalPath, PathState)>> {
        let planned = self
            .files
            .iter()
            .filter(|(_, file)| file.dirty && file.state == PathState::Cached)
            .map(|(path, file)| -> Result<(CanonicalPath, Option<Vec<u8>>)> {
                let bytes = match &file.content {
                    Content::Model(table) => Some(table.encode()?),
                    Content::Stream(data) => data.clone(),
                };
                Ok((path.clone(), bytes))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut done = Vec::with_capacity(planned.len());
        for (path, bytes) in planned {
            let full = path.to_path(&self.root);
            let state = match bytes {
                Some(_) => PathState::Committed,
                None => PathState::Removed,
            };

            // a failed write may have left the path half written, rollback has to visit it
            let Some(file) = self.files.get_mut(&path) else {
                continue;
            };
            file.state = state;

            match bytes {
                Some(bytes) => {
                    write_file(&full, &bytes)?;
                    info!(path = %path, len = bytes.len(), "wrote file");
                }
                None => {
                    remove_file(&full)?;
                    info!(path = %path, "removed file");
                }
            }
            file.dirty = false;
            done.push((path, state));
        }
        Ok(done)
    }

    /// Put every written path back to its prior state, newest first. Paths that cannot be restored
    /// are left as they are and listed in the report.
    #[instrument(skip_all)]
    pub fn rollback(&mut self) -> RestoreReport {
        let mut report = RestoreReport::default();
        let root = &self.root;

        for (path, file) in self.files.iter_mut().rev() {
            if !matches!(file.state, PathState::Committed | PathState::Removed) {
                continue;
            }
            let full = path.to_path(root);

            let outcome = match (&mut file.backup, &mut file.content) {
                (Backup::Absent, _) => remove_file(&full)
                    .map(|_| true)
                    .map_err(|e| RestoreError::Failed(e.to_string())),
                (Backup::Bytes(bytes), _) => write_file(&full, bytes)
                    .map(|_| false)
                    .map_err(|e| RestoreError::Failed(e.to_string())),
                (Backup::Records { prior, touched }, Content::Model(table)) => table
                    .restore(prior, touched)
                    .map_err(Error::from)
                    .and_then(|_| Ok(table.encode()?))
                    .and_then(|bytes| write_file(&full, &bytes))
                    .map(|_| false)
                    .map_err(|e| RestoreError::Failed(e.to_string())),
                (Backup::Records { .. }, Content::Stream(_)) => Err(RestoreError::Failed(
                    "record backup of a raw file".to_string(),
                )),
                (Backup::Unavailable(reason), _) => Err(reason.clone()),
            };

            match outcome {
                Ok(true) => {
                    info!(path = %path, "removed file");
                    report.removed.push(path.to_string());
                }
                Ok(false) => {
                    info!(path = %path, "restored file");
                    report.restored.push(path.to_string());
                }
                Err(reason) => {
                    warn!(path = %path, %reason, "unable to restore");
                    report.skipped.push((path.to_string(), reason));
                }
            }
            file.state = PathState::RolledBack;
        }

        report
    }
}
