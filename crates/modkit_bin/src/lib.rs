//! Building blocks for the binary table formats handled by **modkit**.
//!
//! The game's table formats all share one structural idiom: a fixed header, fixed-size entry
//! records with count/offset fields, an optional second level of sub entries and a trailing pool
//! of strings referenced by pointer fields. This crate provides the primitives for that idiom and a
//! generic codec engine ([`table::Table`]) that concrete formats only describe.
//!
//! ## Table File Structure
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Signature              | 4 bytes: format specific, e.g. `#AUR`                      |
//! | 0x0004         | Endianness Marker      | 2 bytes: `0xFFFE` read little-endian                       |
//! | 0x0006         | Header Size            | 2 bytes: always `0x20`                                     |
//! | 0x0008         | Version                | 4 bytes: format specific                                   |
//! | 0x000C         | Entry Count            | 4 bytes: number of entry records                           |
//! | 0x0010         | Table Offset           | 4 bytes: file offset of the first entry record             |
//! | 0x0014         | Sub Entry Count        | 4 bytes: number of sub entries across all entries          |
//! | 0x0018         | Sub Entry Offset       | 4 bytes: file offset of the sub entry section, or `0`      |
//! | 0x001C         | Reserved               | 4 bytes: `0`                                               |
//!
//! The header is followed by `Entry Count` records of the format's entry size. When any sub
//! entries exist, the sub entry section starts on the next 16 byte boundary and holds every
//! entry's sub entries back to back, in entry order. All pooled strings follow, each terminated by
//! one NUL unit.
//!
//! ### Pointers
//!
//! String pointers and sub entry offsets are relative to one of three bases, fixed per format:
//!
//! - **File**: the start of the file
//! - **Section**: the start of the section holding the record (entry table or sub entry section)
//! - **Entry**: the start of the record holding the pointer
//!
//! A pointer of `0` means "no string". Sub entries are either linked by `count, offset` or by
//! `count, first index` into the sub entry section.
//!
//! ## Additional Information
//!
//! - **Endianness**: Little-endian for all engine tables. [`cursor::ByteReader`] and
//!   [`writer::ByteWriter`] are generic over the byte order for the big-endian audio header.
//! - **Encoding**: entries are re-sorted by their sort id on every encode, so decoding and
//!   re-encoding a file reproduces an equivalent, not necessarily identical, file.
//!

pub mod align;
pub mod checksum;
pub mod cursor;
pub mod encoding;
pub mod error;
pub mod installable;
pub mod pool;
pub mod table;
pub mod writer;
pub mod xor;

pub use cursor::ByteReader;
pub use encoding::StringEncoding;
pub use installable::Installable;
pub use table::{EntryReader, EntrySchema, EntryWriter, SubEntrySchema, Table, TableLayout};
pub use writer::{ByteWriter, PatchToken};
