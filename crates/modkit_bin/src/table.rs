//! Generic two-pass codec for header + table + sub table + string pool layouts
//!
//! Every table format declares an [`EntrySchema`]: a [`TableLayout`] constant describing record
//! sizes and offset semantics, plus a hand written field mapping for one record. [`Table`] does the
//! rest: header validation, pointer resolution, canonical ordering, deferred patching and the final
//! size check.

use binrw::{BinRead, BinWrite};
use byteorder::LittleEndian;
use std::io::Cursor;
use tracing::{debug, instrument, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::align::align_up;
use crate::cursor::ByteReader;
use crate::encoding::StringEncoding;
use crate::error::{DataConstraintError, Error, FormatError, Result};
use crate::installable::{ensure_unique_indices, sort_entries, Installable};
use crate::pool::StringPool;
use crate::writer::{ByteWriter, PatchToken};

/// Byte order marker of every engine table, as read little-endian
pub const ENDIAN_MARKER: u16 = 0xFFFE;

/// Size of the common table header
pub const TABLE_HEADER_SIZE: usize = 0x20;

/// Boundary the sub entry section starts on
pub const SECTION_ALIGNMENT: usize = 16;

/// Common header of every engine table
///
/// All fields are little-endian. Offsets are file-absolute.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct TableHeader {
    /// Format signature, e.g. `#AUR`
    pub signature: [u8; 4],

    /// Always [`ENDIAN_MARKER`]
    pub endian_marker: u16,

    /// Always [`TABLE_HEADER_SIZE`]
    pub header_size: u16,

    pub version: u32,

    pub entry_count: u32,

    /// Start of the entry records
    pub table_offset: u32,

    /// Sub entries across all parents
    pub sub_entry_count: u32,

    /// Start of the sub entry section, `0` when there are no sub entries
    pub sub_entry_offset: u32,

    pub reserved: u32,
}

impl TableHeader {
    /// Read the header and check the parts every engine format shares.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < TABLE_HEADER_SIZE {
            return Err(Error::UnexpectedEof {
                offset: 0,
                needed: TABLE_HEADER_SIZE,
                available: data.len(),
            });
        }

        let header = TableHeader::read(&mut Cursor::new(data))?;
        if header.endian_marker != ENDIAN_MARKER {
            return Err(FormatError::InvalidEndianMarker(header.endian_marker).into());
        }
        if header.header_size as usize != TABLE_HEADER_SIZE {
            return Err(FormatError::UnsupportedHeaderSize {
                expected: TABLE_HEADER_SIZE,
                found: header.header_size as usize,
            }
            .into());
        }
        Ok(header)
    }

    /// Signature as text, for display
    pub fn signature_str(&self) -> String {
        String::from_utf8_lossy(&self.signature).into_owned()
    }
}

/// What pointer fields are relative to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OffsetBase {
    /// Start of the file
    File,

    /// Start of the section holding the record, the entry table or the sub entry section
    Section,

    /// Start of the record holding the pointer
    Entry,
}

/// How an entry points at its sub entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SubLink {
    /// The format has no sub entries
    None,

    /// `count, offset` with the offset relative to the layout's [`OffsetBase`]
    Offset,

    /// `count, first index` into the sub entry section
    Index,
}

/// Static description of an engine format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    pub signature: [u8; 4],
    pub version: u32,
    pub entry_size: usize,
    pub sub_entry_size: usize,
    pub sub_link: SubLink,
    pub offset_base: OffsetBase,

    /// Encoding of pooled and fixed-width strings unless a field asks for another one
    pub encoding: StringEncoding,
}

/// One record of a table format
pub trait EntrySchema: Installable + Clone {
    const LAYOUT: TableLayout;

    /// Sub entry type, [`NoSubEntries`] for single level formats
    type Sub: SubEntrySchema;

    fn decode(reader: &mut EntryReader<'_>) -> Result<Self>;

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()>;

    fn sub_entries(&self) -> &[Self::Sub] {
        &[]
    }

    /// Format specific fix-up applied after sorting, such as dense index padding.
    fn canonical_fill(_entries: &mut Vec<Self>) -> Result<()> {
        Ok(())
    }

    /// Whether this entry only exists to fill a gap left by [`EntrySchema::canonical_fill`].
    /// Merges skip such entries so they never replace real records.
    fn is_placeholder(&self) -> bool {
        false
    }
}

/// One record of a sub entry section
pub trait SubEntrySchema: Sized {
    fn decode(reader: &mut EntryReader<'_>) -> Result<Self>;

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()>;
}

/// Sub entry type of formats without a second level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoSubEntries {}

impl SubEntrySchema for NoSubEntries {
    fn decode(_reader: &mut EntryReader<'_>) -> Result<Self> {
        Err(FormatError::UnexpectedSubEntries.into())
    }

    fn encode(&self, _writer: &mut EntryWriter<'_>) -> Result<()> {
        match *self {}
    }
}

#[derive(Debug, Clone, Copy)]
struct Sections {
    table_offset: usize,
    sub_offset: usize,
    sub_total: usize,
}

fn reference_base(base: OffsetBase, section_start: usize, record_start: usize) -> usize {
    match base {
        OffsetBase::File => 0,
        OffsetBase::Section => section_start,
        OffsetBase::Entry => record_start,
    }
}

/// Field reader for a single record
///
/// Reads are bounded to the record itself while pointers may resolve anywhere in the file.
pub struct EntryReader<'a> {
    record: ByteReader<'a, LittleEndian>,
    data: &'a [u8],
    record_start: usize,
    base: usize,
    layout: TableLayout,
    sections: Sections,
    nested: bool,
}

impl<'a> EntryReader<'a> {
    fn new(
        data: &'a [u8],
        record_start: usize,
        size: usize,
        section_start: usize,
        layout: TableLayout,
        sections: Sections,
        nested: bool,
    ) -> Result<Self> {
        let record = data
            .get(record_start..record_start + size)
            .ok_or(FormatError::OffsetOutOfBounds {
                offset: record_start + size,
                size: data.len(),
            })?;

        Ok(Self {
            record: ByteReader::new(record),
            data,
            record_start,
            base: reference_base(layout.offset_base, section_start, record_start),
            layout,
            sections,
            nested,
        })
    }

    /// File position of the record
    pub fn record_start(&self) -> usize {
        self.record_start
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.record.skip(count)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.record.read_u8()
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.record.read_u16()
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.record.read_i16()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.record.read_u32()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.record.read_i32()
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.record.read_f32()
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.record.read_array()
    }

    /// Zero padded string stored inside the record
    pub fn read_fixed_str(&mut self, width: usize) -> Result<String> {
        self.record.read_fixed_str(width, self.layout.encoding)
    }

    /// Pooled string in the layout's encoding, `None` for a null pointer
    pub fn read_string(&mut self) -> Result<Option<String>> {
        self.read_string_as(self.layout.encoding)
    }

    /// Pooled string in an explicit encoding, `None` for a null pointer
    pub fn read_string_as(&mut self, encoding: StringEncoding) -> Result<Option<String>> {
        let pointer = self.record.read_offset()?;
        if pointer == 0 {
            return Ok(None);
        }

        let offset = self.base + pointer;
        trace!(offset, "resolving string");
        encoding
            .decode_terminated::<LittleEndian>(self.data, offset)
            .map(Some)
    }

    /// Read the `count, link` pair and decode the sub entries it points at.
    pub fn read_sub_entries<S: SubEntrySchema>(&mut self) -> Result<Vec<S>> {
        if self.nested {
            return Err(DataConstraintError::NestedSubLink.into());
        }

        let count = self.record.read_offset()?;
        let link = self.record.read_offset()?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let sub_size = self.layout.sub_entry_size;
        let start = match self.layout.sub_link {
            SubLink::None => return Err(FormatError::UnexpectedSubEntries.into()),
            SubLink::Offset => self.base + link,
            SubLink::Index => {
                let end = link + count;
                if end > self.sections.sub_total {
                    return Err(FormatError::SubEntryRange {
                        start: link,
                        end,
                        total: self.sections.sub_total,
                    }
                    .into());
                }
                self.sections.sub_offset + link * sub_size
            }
        };

        let end = count
            .checked_mul(sub_size)
            .and_then(|len| len.checked_add(start))
            .filter(|end| *end <= self.data.len())
            .ok_or(FormatError::OffsetOutOfBounds {
                offset: start,
                size: self.data.len(),
            })?;
        trace!(count, start, end, "reading sub entries");

        (0..count)
            .map(|i| {
                let mut reader = EntryReader::new(
                    self.data,
                    start + i * sub_size,
                    sub_size,
                    self.sections.sub_offset,
                    self.layout,
                    self.sections,
                    true,
                )?;
                S::decode(&mut reader)
            })
            .collect()
    }
}

#[derive(Debug)]
struct WrittenLink {
    count: usize,
    token: Option<(PatchToken, usize)>,
}

enum LinkState<'w> {
    Nested,
    Open {
        running_index: &'w mut usize,
        written: Option<WrittenLink>,
    },
}

/// Field writer for a single record
pub struct EntryWriter<'w> {
    writer: &'w mut ByteWriter<LittleEndian>,
    pool: &'w mut StringPool,
    record_start: usize,
    base: usize,
    layout: TableLayout,
    link: LinkState<'w>,
}

impl<'w> EntryWriter<'w> {
    /// Bytes written for this record so far
    pub fn written(&self) -> usize {
        self.writer.position() - self.record_start
    }

    pub fn write_zeros(&mut self, count: usize) {
        self.writer.write_zeros(count);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.writer.write_bytes(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.writer.write_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.writer.write_u16(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.writer.write_i16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.writer.write_u32(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.writer.write_i32(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.writer.write_f32(value);
    }

    /// Zero padded string stored inside the record
    pub fn write_fixed_str(&mut self, field: &'static str, value: &str, width: usize) -> Result<()> {
        self.writer
            .write_fixed_str(field, value, width, self.layout.encoding)
    }

    /// Pooled string in the layout's encoding
    pub fn write_string(&mut self, field: &'static str, text: Option<&str>) -> Result<()> {
        self.write_string_as(field, text, self.layout.encoding)
    }

    /// Pooled string in an explicit encoding
    pub fn write_string_as(
        &mut self,
        field: &'static str,
        text: Option<&str>,
        encoding: StringEncoding,
    ) -> Result<()> {
        self.pool
            .write_pointer(&mut *self.writer, self.base, field, text, encoding)
    }

    /// Write the `count, link` pair for `count` sub entries.
    ///
    /// With [`SubLink::Offset`] the offset is a placeholder resolved once the sub entries have been
    /// appended, with [`SubLink::Index`] it is the running index of the first sub entry.
    pub fn write_sub_link(&mut self, count: usize) -> Result<()> {
        let sub_link = self.layout.sub_link;
        let LinkState::Open {
            running_index,
            written,
        } = &mut self.link
        else {
            return Err(DataConstraintError::NestedSubLink.into());
        };

        if sub_link == SubLink::None {
            return Err(FormatError::UnexpectedSubEntries.into());
        }

        self.writer.write_len_u32("sub entry count", count)?;
        let token = match sub_link {
            SubLink::None => None,
            SubLink::Offset if count == 0 => {
                self.writer.write_u32(0);
                None
            }
            SubLink::Offset => Some((self.writer.reserve_u32(), self.base)),
            SubLink::Index => {
                self.writer.write_len_u32("sub entry index", **running_index)?;
                **running_index += count;
                None
            }
        };

        *written = Some(WrittenLink { count, token });
        Ok(())
    }
}

/// Decoded table of `E` records
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Table<E> {
    pub entries: Vec<E>,
}

impl<E> Default for Table<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<E: EntrySchema> Table<E> {
    pub fn new(entries: Vec<E>) -> Self {
        Self { entries }
    }

    /// Version written to the header
    pub fn version(&self) -> u32 {
        E::LAYOUT.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: &str) -> Option<&E> {
        self.entries.iter().find(|e| e.index() == index)
    }

    pub fn contains_sort_id(&self, sort_id: u32) -> bool {
        self.entries.iter().any(|e| e.sort_id() == sort_id)
    }

    /// Insert `entry`, replacing the entry with the same index. Returns the replaced entry.
    pub fn upsert(&mut self, entry: E) -> Option<E> {
        let index = entry.index();
        match self.entries.iter().position(|e| e.index() == index) {
            Some(position) => Some(std::mem::replace(&mut self.entries[position], entry)),
            None => {
                self.entries.push(entry);
                None
            }
        }
    }

    /// Remove the entry with `index`.
    pub fn remove(&mut self, index: &str) -> Option<E> {
        let position = self.entries.iter().position(|e| e.index() == index)?;
        Some(self.entries.remove(position))
    }

    /// Sort, apply the format's fill policy and check index uniqueness.
    pub fn canonicalize(&mut self) -> Result<()> {
        sort_entries(&mut self.entries);
        E::canonical_fill(&mut self.entries)?;
        ensure_unique_indices(&self.entries)
    }

    /// Canonical form of this table, the model any decode of [`Table::encode`] produces
    pub fn canonicalized(&self) -> Result<Self> {
        let mut table = self.clone();
        table.canonicalize()?;
        Ok(table)
    }

    /// Decode a table, validating the header against the layout.
    #[instrument(skip_all, err)]
    pub fn decode(data: &[u8]) -> Result<Self> {
        let layout = E::LAYOUT;
        let header = TableHeader::parse(data)?;
        if header.signature != layout.signature {
            return Err(FormatError::InvalidSignature {
                expected: String::from_utf8_lossy(&layout.signature).into_owned(),
                found: header.signature_str(),
            }
            .into());
        }
        if header.version != layout.version {
            return Err(FormatError::UnsupportedVersion(header.version).into());
        }
        if layout.sub_link == SubLink::None && header.sub_entry_count != 0 {
            return Err(FormatError::UnexpectedSubEntries.into());
        }

        let count = header.entry_count as usize;
        let sections = Sections {
            table_offset: header.table_offset as usize,
            sub_offset: header.sub_entry_offset as usize,
            sub_total: header.sub_entry_count as usize,
        };
        count
            .checked_mul(layout.entry_size)
            .and_then(|len| len.checked_add(sections.table_offset))
            .filter(|end| *end <= data.len())
            .ok_or(FormatError::OffsetOutOfBounds {
                offset: sections.table_offset,
                size: data.len(),
            })?;

        debug!(
            signature = %header.signature_str(),
            count,
            sub_entries = sections.sub_total,
            "decoding table"
        );

        let entries = (0..count)
            .map(|i| {
                let mut reader = EntryReader::new(
                    data,
                    sections.table_offset + i * layout.entry_size,
                    layout.entry_size,
                    sections.table_offset,
                    layout,
                    sections,
                    false,
                )?;
                E::decode(&mut reader)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries })
    }

    /// Encode the canonical form of this table.
    #[instrument(skip_all, err)]
    pub fn encode(&self) -> Result<Vec<u8>> {
        let canonical = self.canonicalized()?;
        encode_canonical(&canonical.entries)
    }
}

fn record_size_check(record: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(DataConstraintError::RecordSize {
            record,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

fn encode_canonical<E: EntrySchema>(entries: &[E]) -> Result<Vec<u8>> {
    let layout = E::LAYOUT;
    let table_offset = TABLE_HEADER_SIZE;
    let table_end = table_offset + entries.len() * layout.entry_size;
    let sub_total: usize = entries.iter().map(|e| e.sub_entries().len()).sum();
    let sub_offset = if sub_total > 0 {
        align_up(table_end, SECTION_ALIGNMENT)
    } else {
        0
    };

    let header = TableHeader {
        signature: layout.signature,
        endian_marker: ENDIAN_MARKER,
        header_size: TABLE_HEADER_SIZE as u16,
        version: layout.version,
        entry_count: u32::try_from(entries.len()).map_err(|_| {
            DataConstraintError::ValueOutOfRange {
                field: "entry count",
                value: entries.len() as u64,
            }
        })?,
        table_offset: table_offset as u32,
        sub_entry_count: u32::try_from(sub_total).map_err(|_| {
            DataConstraintError::ValueOutOfRange {
                field: "sub entry count",
                value: sub_total as u64,
            }
        })?,
        sub_entry_offset: u32::try_from(sub_offset).map_err(|_| {
            DataConstraintError::ValueOutOfRange {
                field: "sub entry offset",
                value: sub_offset as u64,
            }
        })?,
        reserved: 0,
    };

    let mut header_bytes = Cursor::new(Vec::with_capacity(TABLE_HEADER_SIZE));
    header.write(&mut header_bytes)?;

    let mut writer = ByteWriter::<LittleEndian>::with_capacity(
        sub_offset.max(table_end) + sub_total * layout.sub_entry_size,
    );
    writer.write_bytes(header_bytes.get_ref());
    let mut pool = StringPool::new();

    // pass 1: fixed size records with placeholders
    let mut running_index = 0usize;
    let mut links = Vec::with_capacity(entries.len());
    for entry in entries {
        let record_start = writer.position();
        let mut record = EntryWriter {
            writer: &mut writer,
            pool: &mut pool,
            record_start,
            base: reference_base(layout.offset_base, table_offset, record_start),
            layout,
            link: LinkState::Open {
                running_index: &mut running_index,
                written: None,
            },
        };
        entry.encode(&mut record)?;

        let written = record.written();
        let link = match record.link {
            LinkState::Open { written, .. } => written,
            LinkState::Nested => None,
        };
        record_size_check("entry", layout.entry_size, written)?;

        let actual = entry.sub_entries().len();
        match &link {
            Some(link) if link.count != actual => {
                return Err(DataConstraintError::SubEntryCount {
                    index: entry.index(),
                    declared: link.count,
                    actual,
                }
                .into())
            }
            None if actual > 0 => {
                return Err(DataConstraintError::MissingSubLink(entry.index()).into())
            }
            _ => {}
        }
        links.push(link);
    }

    // pass 2: sub entries in entry order, patching each parent's link
    if sub_total > 0 {
        writer.pad_to(SECTION_ALIGNMENT);
    }
    for (entry, link) in entries.iter().zip(links) {
        let block_start = writer.position();
        for sub in entry.sub_entries() {
            let record_start = writer.position();
            let mut record = EntryWriter {
                writer: &mut writer,
                pool: &mut pool,
                record_start,
                base: reference_base(layout.offset_base, sub_offset, record_start),
                layout,
                link: LinkState::Nested,
            };
            sub.encode(&mut record)?;
            let written = record.written();
            record_size_check("sub entry", layout.sub_entry_size, written)?;
        }
        trace!(index = %entry.index(), sub_entries = entry.sub_entries().len(), "wrote sub entries");

        if let Some(WrittenLink {
            token: Some((token, base)),
            ..
        }) = link
        {
            writer.resolve_offset(token, block_start, base)?;
        }
    }

    let expected = if sub_total > 0 {
        sub_offset + sub_total * layout.sub_entry_size
    } else {
        table_end
    };
    if writer.position() != expected {
        return Err(DataConstraintError::SizeMismatch {
            expected,
            actual: writer.position(),
        }
        .into());
    }

    let pooled = pool.flush(&mut writer)?;
    if writer.position() != expected + pooled {
        return Err(DataConstraintError::SizeMismatch {
            expected: expected + pooled,
            actual: writer.position(),
        }
        .into());
    }

    debug!(
        entries = entries.len(),
        sub_entries = sub_total,
        size = writer.position(),
        "encoded table"
    );
    writer.finish()
}

#[cfg(test)]
mod test {
    use pretty_assertions::{assert_eq, assert_str_eq};
    use tracing_test::traced_test;

    use super::{
        EntryReader, EntrySchema, EntryWriter, NoSubEntries, OffsetBase, SubEntrySchema, SubLink,
        Table, TableHeader, TableLayout, TABLE_HEADER_SIZE,
    };
    use crate::encoding::StringEncoding;
    use crate::error::{DataConstraintError, Error, FormatError, Result};
    use crate::installable::Installable;

    #[derive(Debug, Clone, PartialEq)]
    struct Label {
        id: u32,
        text: Option<String>,
    }

    impl Installable for Label {
        fn sort_id(&self) -> u32 {
            self.id
        }

        fn index(&self) -> String {
            self.id.to_string()
        }
    }

    impl EntrySchema for Label {
        const LAYOUT: TableLayout = TableLayout {
            signature: *b"#LBL",
            version: 1,
            entry_size: 8,
            sub_entry_size: 0,
            sub_link: SubLink::None,
            offset_base: OffsetBase::Entry,
            encoding: StringEncoding::Ascii,
        };
        type Sub = NoSubEntries;

        fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
            Ok(Self {
                id: reader.read_u32()?,
                text: reader.read_string()?,
            })
        }

        fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
            writer.write_u32(self.id);
            writer.write_string("text", self.text.as_deref())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Group {
        id: u32,
        items: Vec<Item>,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        value: u16,
        name: Option<String>,
    }

    impl Installable for Group {
        fn sort_id(&self) -> u32 {
            self.id
        }

        fn index(&self) -> String {
            format!("group_{}", self.id)
        }
    }

    impl EntrySchema for Group {
        const LAYOUT: TableLayout = TableLayout {
            signature: *b"#GRP",
            version: 2,
            entry_size: 12,
            sub_entry_size: 8,
            sub_link: SubLink::Offset,
            offset_base: OffsetBase::File,
            encoding: StringEncoding::Utf8,
        };
        type Sub = Item;

        fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
            Ok(Self {
                id: reader.read_u32()?,
                items: reader.read_sub_entries()?,
            })
        }

        fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
            writer.write_u32(self.id);
            writer.write_sub_link(self.items.len())
        }

        fn sub_entries(&self) -> &[Item] {
            &self.items
        }
    }

    impl SubEntrySchema for Item {
        fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
            let value = reader.read_u16()?;
            reader.skip(2)?;
            Ok(Self {
                value,
                name: reader.read_string()?,
            })
        }

        fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
            writer.write_u16(self.value);
            writer.write_zeros(2);
            writer.write_string("name", self.name.as_deref())
        }
    }

    #[traced_test]
    #[test]
    fn empty_table_is_only_a_header() -> Result<()> {
        let out = Table::<Group>::default().encode()?;

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            b'#', b'G', b'R', b'P', 0xFE, 0xFF, 0x20, 0x00,
            0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(out.len(), TABLE_HEADER_SIZE);
        assert_eq!(out, expected);

        let header = TableHeader::parse(&out)?;
        assert_eq!(header.entry_count, 0);
        assert_eq!(header.sub_entry_count, 0);
        assert_eq!(header.sub_entry_offset, 0);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn entry_relative_strings() -> Result<()> {
        let table = Table::new(vec![
            Label {
                id: 7,
                text: Some("b".into()),
            },
            Label { id: 3, text: None },
        ]);
        let out = table.encode()?;

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            b'#', b'L', b'B', b'L', 0xFE, 0xFF, 0x20, 0x00,
            0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // sorted: id 3 first, null pointer
            0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // id 7, pointer relative to its own record at 0x28
            0x07, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00,
            b'b', 0x00,
        ];
        assert_str_eq!(format!("{:02X?}", out), format!("{:02X?}", expected));

        let decoded = Table::<Label>::decode(&out)?;
        assert_eq!(decoded, table.canonicalized()?);
        assert_eq!(decoded.encode()?, out);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn offset_linked_sub_entries() -> Result<()> {
        let table = Table::new(vec![
            Group {
                id: 1,
                items: vec![
                    Item {
                        value: 0xAA,
                        name: Some("x".into()),
                    },
                    Item {
                        value: 0xBB,
                        name: None,
                    },
                ],
            },
            Group {
                id: 2,
                items: vec![],
            },
        ]);
        let out = table.encode()?;

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            b'#', b'G', b'R', b'P', 0xFE, 0xFF, 0x20, 0x00,
            0x02, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
            0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // table at 0x20, 2 x 12 bytes
            0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // padding to 0x40
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // sub entries
            0xAA, 0x00, 0x00, 0x00, 0x50, 0x00, 0x00, 0x00,
            0xBB, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // pool
            b'x', 0x00,
        ];
        assert_str_eq!(format!("{:02X?}", out), format!("{:02X?}", expected));

        let decoded = Table::<Group>::decode(&out)?;
        assert_eq!(decoded, table);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn canonical_encode_is_stable() -> Result<()> {
        let table = Table::new(vec![
            Label {
                id: 9,
                text: Some("nine".into()),
            },
            Label {
                id: 1,
                text: Some("one".into()),
            },
        ]);
        let first = table.encode()?;
        let second = Table::<Label>::decode(&first)?.encode()?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn byte_swapped_marker_is_rejected() -> Result<()> {
        let mut out = Table::<Label>::default().encode()?;
        out.swap(4, 5);
        let err = Table::<Label>::decode(&out).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::InvalidEndianMarker(0xFEFF))
        ));
        Ok(())
    }

    #[test]
    fn wrong_signature() -> Result<()> {
        let out = Table::<Label>::default().encode()?;
        let err = Table::<Group>::decode(&out).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::InvalidSignature { .. })
        ));
        Ok(())
    }

    #[test]
    fn truncated_table() -> Result<()> {
        let table = Table::new(vec![Label { id: 1, text: None }]);
        let mut out = table.encode()?;
        out.truncate(out.len() - 1);
        let err = Table::<Label>::decode(&out).unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::OffsetOutOfBounds { .. })
        ));
        Ok(())
    }

    #[test]
    fn duplicate_index_blocks_encode() {
        let table = Table::new(vec![
            Label { id: 1, text: None },
            Label { id: 1, text: None },
        ]);
        assert!(matches!(
            table.encode().unwrap_err(),
            Error::Constraint(DataConstraintError::DuplicateIndex(_))
        ));
    }

    #[derive(Debug, Clone)]
    struct Short(u32);

    impl Installable for Short {
        fn sort_id(&self) -> u32 {
            self.0
        }

        fn index(&self) -> String {
            self.0.to_string()
        }
    }

    impl EntrySchema for Short {
        const LAYOUT: TableLayout = TableLayout {
            signature: *b"#SHT",
            version: 0,
            entry_size: 8,
            sub_entry_size: 0,
            sub_link: SubLink::None,
            offset_base: OffsetBase::File,
            encoding: StringEncoding::Ascii,
        };
        type Sub = NoSubEntries;

        fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
            Ok(Self(reader.read_u32()?))
        }

        fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
            writer.write_u32(self.0);
            Ok(())
        }
    }

    #[test]
    fn record_size_is_checked() {
        let table = Table::new(vec![Short(1)]);
        assert!(matches!(
            table.encode().unwrap_err(),
            Error::Constraint(DataConstraintError::RecordSize {
                expected: 8,
                actual: 4,
                ..
            })
        ));
    }

    #[test]
    fn upsert_and_remove_by_index() {
        let mut table = Table::new(vec![Label { id: 1, text: None }]);
        let replaced = table.upsert(Label {
            id: 1,
            text: Some("new".into()),
        });
        assert_eq!(replaced, Some(Label { id: 1, text: None }));
        assert_eq!(table.len(), 1);
        assert!(table.upsert(Label { id: 2, text: None }).is_none());
        assert_eq!(table.remove("1").map(|l| l.id), Some(1));
        assert!(table.get("1").is_none());
        assert!(table.contains_sort_id(2));
    }
}
