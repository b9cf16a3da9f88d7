//! Error types that can be emitted from this library
//!

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Transparent warpper for [`std::string::FromUtf8Error`]
    #[error(transparent)]
    UTF8Error(#[from] std::string::FromUtf8Error),

    /// Transparent warpper for [`widestring::error::Utf16Error`]
    #[error(transparent)]
    UTF16Error(#[from] widestring::error::Utf16Error),

    /// The input does not follow the layout of the format being decoded
    #[error(transparent)]
    #[diagnostic(transparent)]
    Format(#[from] FormatError),

    /// The model cannot be encoded without corrupting the output
    #[error(transparent)]
    #[diagnostic(transparent)]
    Constraint(#[from] DataConstraintError),

    /// A read ran past the end of the available data
    #[error("unexpected end of data at {offset:#x}: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Raised while decoding, before anything has been mutated
#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// signature mismatch
    #[error("invalid signature: expected {expected:?}, found {found:?}")]
    #[diagnostic(help("the file is either a different format or not a table file at all"))]
    InvalidSignature { expected: String, found: String },

    /// unsupported byte order marker
    #[error("unsupported endianness marker {0:#06x}")]
    InvalidEndianMarker(u16),

    /// header size differs from the one this codec understands
    #[error("unsupported header size {found:#x}, expected {expected:#x}")]
    UnsupportedHeaderSize { expected: usize, found: usize },

    /// version not understood
    #[error("unsupported version {0}")]
    UnsupportedVersion(u32),

    /// an offset points outside of the data
    #[error("offset {offset:#x} is outside of the data (size {size:#x})")]
    OffsetOutOfBounds { offset: usize, size: usize },

    /// a pooled string ran into the end of the data
    #[error("string at {offset:#x} is missing its terminator")]
    MissingTerminator { offset: usize },

    /// a sub entry link does not match the header totals
    #[error("sub entry range {start}..{end} exceeds the {total} sub entries declared in the header")]
    SubEntryRange { start: usize, end: usize, total: usize },

    /// the file declares sub entries for a format without any
    #[error("format does not carry sub entries")]
    UnexpectedSubEntries,

    /// a chunk tag that the decoder does not know how to size
    #[error("unknown chunk {tag:?} at {offset:#x}")]
    UnknownChunk { tag: String, offset: usize },

    /// a container payload that matches none of the nested formats
    #[error("unknown payload with signature {found:?}")]
    #[diagnostic(help("expected one of: {expected}"))]
    UnknownPayload { found: String, expected: String },

    /// a decompressed or declared length disagrees with the data
    #[error("declared length {declared} does not match actual length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// text is not valid for the declared encoding
    #[error("string at {offset:#x} is not valid {encoding}")]
    InvalidText {
        offset: usize,
        encoding: &'static str,
    },
}

/// Raised while encoding, before any bytes leave memory
#[derive(Error, Diagnostic, Debug, PartialEq, Eq)]
pub enum DataConstraintError {
    /// fixed width string field overflow
    #[error("{field}: {value:?} does not fit in {width} bytes")]
    StringTooLong {
        field: &'static str,
        value: String,
        width: usize,
    },

    /// text cannot be represented in the declared encoding
    #[error("{field}: {value:?} cannot be encoded as {encoding}")]
    Unencodable {
        field: &'static str,
        value: String,
        encoding: &'static str,
    },

    /// array field with the wrong number of elements
    #[error("{field}: expected {expected} elements, found {actual}")]
    ArrayLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// a record did not occupy its declared size
    #[error("{record} record wrote {actual} bytes, layout declares {expected}")]
    RecordSize {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    /// total output length does not match the layout arithmetic
    #[error("encoded {actual} bytes, layout requires {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    /// the writer was finished with placeholders still pending
    #[error("{0} reserved placeholders were never resolved")]
    UnresolvedPatches(usize),

    /// the placeholder lies outside of the buffer
    #[error("placeholder at {0:#x} is outside of the buffer")]
    PatchOutOfBounds(usize),

    /// a value does not fit in its field
    #[error("{field}: value {value} does not fit")]
    ValueOutOfRange { field: &'static str, value: u64 },

    /// a pointer would have to point backwards
    #[error("target {target:#x} lies before reference base {base:#x}")]
    NegativeOffset { target: usize, base: usize },

    /// two entries share an index
    #[error("duplicate index {0:?}")]
    DuplicateIndex(String),

    /// an entry's sub entry list changed between the two passes
    #[error("entry {index:?} declared {declared} sub entries but carries {actual}")]
    SubEntryCount {
        index: String,
        declared: usize,
        actual: usize,
    },

    /// the entry never wrote its sub entry link
    #[error("entry {0:?} carries sub entries but never wrote a link for them")]
    MissingSubLink(String),

    /// a sub entry tried to nest another level
    #[error("sub entries cannot link further sub entries")]
    NestedSubLink,
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
