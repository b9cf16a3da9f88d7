//! Resource bundle (`#EMB`)
//!
//! | Offset | Field             | Description                                       |
//! |--------|-------------------|---------------------------------------------------|
//! | 0x00   | Signature         | 4 bytes: `#EMB`                                   |
//! | 0x04   | Endianness Marker | 2 bytes: `0xFFFE`                                 |
//! | 0x06   | Header Size       | 2 bytes: `0x20`                                   |
//! | 0x08   | Version           | 4 bytes                                           |
//! | 0x0C   | File Count        | 4 bytes                                           |
//! | 0x10   | File Table Offset | 4 bytes: file offset                              |
//! | 0x14   | Name Table Offset | 4 bytes: file offset, `0` for an empty bundle     |
//! | 0x18   | Reserved          | 8 bytes                                           |
//!
//! ### File Table
//!
//! One 8 byte record per file: the data offset, relative to the record itself, and the data size.
//!
//! ### Name Table
//!
//! One 4 byte pointer per file, file-absolute, to an ASCII name in the trailing string pool. A
//! pointer of `0` marks an unnamed file.
//!
//! Each file's data starts on a 16 byte boundary.

use binrw::{BinRead, BinWrite};
use byteorder::LittleEndian;
use modkit_bin::pool::StringPool;
use modkit_bin::table::ENDIAN_MARKER;
use modkit_bin::{ByteReader, ByteWriter, StringEncoding};
use std::io::Cursor;
use tracing::{debug, instrument};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{DataConstraintError, Error, FormatError, Result};

pub const SIGNATURE: [u8; 4] = *b"#EMB";

pub const HEADER_SIZE: usize = 0x20;

/// Boundary every file's data starts on
pub const DATA_ALIGNMENT: usize = 16;

const FILE_RECORD_SIZE: usize = 8;

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq)]
#[brw(little, magic = b"#EMB")]
struct BundleHeader {
    endian_marker: u16,
    header_size: u16,
    version: u32,
    file_count: u32,
    file_table_offset: u32,
    name_table_offset: u32,
    reserved: [u32; 2],
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BundleFile {
    pub name: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bundle {
    pub version: u32,
    pub files: Vec<BundleFile>,
}

fn to_u32(field: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        DataConstraintError::ValueOutOfRange {
            field,
            value: value as u64,
        }
        .into()
    })
}

impl Bundle {
    pub fn get(&self, name: &str) -> Option<&BundleFile> {
        self.files.iter().find(|f| f.name.as_deref() == Some(name))
    }

    #[instrument(skip_all, err)]
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::<LittleEndian>::new(data);
        reader.expect_signature(&SIGNATURE)?;
        if data.len() < HEADER_SIZE {
            return Err(Error::UnexpectedEof {
                offset: 0,
                needed: HEADER_SIZE,
                available: data.len(),
            });
        }

        let header = BundleHeader::read(&mut Cursor::new(data))?;
        if header.endian_marker != ENDIAN_MARKER {
            return Err(FormatError::InvalidEndianMarker(header.endian_marker).into());
        }
        if header.header_size as usize != HEADER_SIZE {
            return Err(FormatError::UnsupportedHeaderSize {
                expected: HEADER_SIZE,
                found: header.header_size as usize,
            }
            .into());
        }

        let count = header.file_count as usize;
        let file_table = header.file_table_offset as usize;
        let name_table = header.name_table_offset as usize;
        let mut files = Vec::with_capacity(count);
        for i in 0..count {
            let record = file_table + i * FILE_RECORD_SIZE;
            reader.seek(record)?;
            let start = record + reader.read_offset()?;
            let size = reader.read_offset()?;
            let end = start
                .checked_add(size)
                .filter(|end| *end <= data.len())
                .ok_or(FormatError::OffsetOutOfBounds {
                    offset: start,
                    size: data.len(),
                })?;

            reader.seek(name_table + i * 4)?;
            let name = match reader.read_offset()? {
                0 => None,
                pointer => Some(reader.string_at(pointer, StringEncoding::Ascii)?),
            };

            files.push(BundleFile {
                name,
                data: data[start..end].to_vec(),
            });
        }

        debug!(version = header.version, count, "decoded bundle");
        Ok(Self {
            version: header.version,
            files,
        })
    }

    #[instrument(skip_all, err)]
    pub fn encode(&self) -> Result<Vec<u8>> {
        let count = self.files.len();
        let file_table = HEADER_SIZE;
        let name_table = file_table + count * FILE_RECORD_SIZE;

        let header = BundleHeader {
            endian_marker: ENDIAN_MARKER,
            header_size: HEADER_SIZE as u16,
            version: self.version,
            file_count: to_u32("file count", count)?,
            file_table_offset: to_u32("file table offset", file_table)?,
            name_table_offset: if count == 0 {
                0
            } else {
                to_u32("name table offset", name_table)?
            },
            reserved: [0; 2],
        };
        let mut header_bytes = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        header.write(&mut header_bytes)?;

        let mut writer = ByteWriter::<LittleEndian>::new();
        writer.write_bytes(header_bytes.get_ref());

        let mut records = Vec::with_capacity(count);
        for file in &self.files {
            let record = writer.position();
            let token = writer.reserve_u32();
            writer.write_len_u32("file size", file.data.len())?;
            records.push((record, token));
        }

        let mut pool = StringPool::new();
        for file in &self.files {
            pool.write_pointer(
                &mut writer,
                0,
                "file name",
                file.name.as_deref(),
                StringEncoding::Ascii,
            )?;
        }

        for (file, (record, token)) in self.files.iter().zip(records) {
            writer.pad_to(DATA_ALIGNMENT);
            let start = writer.position();
            writer.write_bytes(&file.data);
            writer.resolve_offset(token, start, record)?;
        }

        pool.flush(&mut writer)?;
        writer.finish()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::{assert_eq, assert_str_eq};
    use tracing_test::traced_test;

    use super::{Bundle, BundleFile};
    use crate::error::Result;

    #[traced_test]
    #[test]
    fn single_file_layout() -> Result<()> {
        let bundle = Bundle {
            version: 1,
            files: vec![BundleFile {
                name: Some("a.dds".into()),
                data: vec![0x01, 0x02, 0x03],
            }],
        };
        let out = bundle.encode()?;

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            b'#', b'E', b'M', b'B', 0xFE, 0xFF, 0x20, 0x00,
            0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // data at 0x30, relative to the record at 0x20
            0x10, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00,
            // name pointer
            0x33, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01, 0x02, 0x03, b'a', b'.', b'd', b'd', b's',
            0x00,
        ];
        assert_str_eq!(format!("{:02X?}", out), format!("{:02X?}", expected));

        assert_eq!(Bundle::decode(&out)?, bundle);
        Ok(())
    }

    #[test]
    fn blobs_are_aligned() -> Result<()> {
        let bundle = Bundle {
            version: 3,
            files: vec![
                BundleFile {
                    name: None,
                    data: vec![0xAA; 5],
                },
                BundleFile {
                    name: Some("b.emm".into()),
                    data: vec![0xBB; 20],
                },
            ],
        };
        let out = bundle.encode()?;

        let second = 0x28 + u32::from_le_bytes([out[0x28], out[0x29], out[0x2A], out[0x2B]]) as usize;
        assert_eq!(second % 16, 0);
        assert_eq!(out[second], 0xBB);

        let decoded = Bundle::decode(&out)?;
        assert_eq!(decoded, bundle);
        assert_eq!(decoded.get("b.emm").map(|f| f.data.len()), Some(20));
        Ok(())
    }

    #[test]
    fn empty_bundle() -> Result<()> {
        let out = Bundle::default().encode()?;
        assert_eq!(out.len(), 0x20);
        assert_eq!(Bundle::decode(&out)?, Bundle::default());
        Ok(())
    }
}
