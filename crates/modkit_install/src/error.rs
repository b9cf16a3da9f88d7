//! Error types that can be emitted from this library
//!

use miette::Diagnostic;
use modkit_formats::TableKind;
use std::path::PathBuf;
use thiserror::Error;

use crate::cache::{CacheKind, RestoreReport};

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// File system access with the path it was made on
    #[error("{action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transparent wrapper for format and constraint errors of the codecs
    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] modkit_bin::error::Error),

    /// Transparent wrapper for [`walkdir::Error`]
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),

    /// A path was requested as a decoded table and as a raw file in the same run
    #[error("{path} used as both {cached} and {requested}")]
    #[diagnostic(help("a path is either a table or a raw file for the whole run"))]
    CacheTypeConflict {
        path: String,
        cached: CacheKind,
        requested: CacheKind,
    },

    /// A table file holds another format than the one requested
    #[error("{path} is a {found} table, expected {expected}")]
    TableKindMismatch {
        path: String,
        expected: TableKind,
        found: TableKind,
    },

    /// A cached path was accessed before it was loaded
    #[error("{0} is not cached")]
    NotCached(String),

    /// Every id between floor and ceiling is in use
    #[error("no free id between {floor} and {ceiling}")]
    IdSpaceExhausted { floor: u32, ceiling: u32 },

    #[error("{0} points outside of the install root")]
    PathEscapesRoot(String),

    #[error("{0:?} is not a usable relative path")]
    InvalidPath(String),

    /// A package file would replace an existing file
    #[error("{0} already exists")]
    #[diagnostic(help("enable overwriting to replace existing files"))]
    FileExists(String),

    /// The run failed and its changes were undone as far as possible
    #[error("run failed and was rolled back ({report})")]
    RolledBack {
        #[source]
        source: Box<Error>,
        report: RestoreReport,
    },
}

/// Why a path could not be put back to its prior state
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum RestoreError {
    #[error("prior content of {size} bytes exceeds the backup ceiling of {ceiling} bytes")]
    TooLarge { size: u64, ceiling: u64 },

    #[error("prior content could not be read: {0}")]
    Unreadable(String),

    #[error("restoring failed: {0}")]
    Failed(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
