//! Obfuscated name list (`#ONL`)
//!
//! | Offset | Field             | Description                                  |
//! |--------|-------------------|----------------------------------------------|
//! | 0x00   | Signature         | 4 bytes: `#ONL`                              |
//! | 0x04   | Endianness Marker | 2 bytes: `0xFFFE`                            |
//! | 0x06   | Header Size       | 2 bytes: `0x10`                              |
//! | 0x08   | Name Count        | 4 bytes                                      |
//! | 0x0C   | Reserved          | 4 bytes                                      |
//!
//! Followed by `Name Count` variable length records:
//!
//! | Offset | Field   | Description                                              |
//! |--------|---------|----------------------------------------------------------|
//! | 0x00   | ID      | 4 bytes                                                  |
//! | 0x04   | Length  | 2 bytes: size of the obfuscated region                   |
//! | 0x06   | Name    | `Length` bytes: UTF-8 name and a NUL, XORed with the key |
//!
//! One key stream runs over all names of a file, see [`modkit_bin::xor`].

use binrw::{BinRead, BinWrite};
use byteorder::LittleEndian;
use modkit_bin::table::ENDIAN_MARKER;
use modkit_bin::xor::CyclicXor;
use modkit_bin::{ByteReader, ByteWriter};
use std::io::Cursor;
use tracing::{debug, instrument, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{DataConstraintError, FormatError, Result};

pub const SIGNATURE: [u8; 4] = *b"#ONL";

pub const HEADER_SIZE: usize = 0x10;

/// Key table shared by every name list
pub const NAME_KEY: [u8; 16] = [
    0x6D, 0x6F, 0x64, 0x4E, 0x61, 0x6D, 0x65, 0x73, 0xA5, 0x3C, 0x96, 0x0F, 0x5A, 0xC3, 0x69, 0xF0,
];

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq)]
#[brw(little, magic = b"#ONL")]
struct NameListHeader {
    endian_marker: u16,
    header_size: u16,
    count: u32,
    reserved: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NameEntry {
    pub id: u32,
    pub name: String,
}

/// Names in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NameList {
    pub names: Vec<NameEntry>,
}

impl NameList {
    pub fn get(&self, id: u32) -> Option<&str> {
        self.names
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.name.as_str())
    }

    #[instrument(skip_all, err)]
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::<LittleEndian>::new(data);
        reader.expect_signature(&SIGNATURE)?;
        if data.len() < HEADER_SIZE {
            return Err(FormatError::OffsetOutOfBounds {
                offset: HEADER_SIZE,
                size: data.len(),
            }
            .into());
        }

        let header = NameListHeader::read(&mut Cursor::new(data))?;
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

        reader.seek(HEADER_SIZE)?;
        let mut xor = CyclicXor::new(NAME_KEY);
        let mut names = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            let id = reader.read_u32()?;
            let len = reader.read_u16()? as usize;
            let offset = reader.position();
            let region = reader.read_bytes(len)?;
            let name = String::from_utf8(xor.decode_region(region)).map_err(|_| {
                FormatError::InvalidText {
                    offset,
                    encoding: "UTF-8",
                }
            })?;
            trace!(id, len, "decoded name");
            names.push(NameEntry { id, name });
        }

        debug!(count = names.len(), "decoded name list");
        Ok(Self { names })
    }

    #[instrument(skip_all, err)]
    pub fn encode(&self) -> Result<Vec<u8>> {
        let header = NameListHeader {
            endian_marker: ENDIAN_MARKER,
            header_size: HEADER_SIZE as u16,
            count: u32::try_from(self.names.len()).map_err(|_| {
                DataConstraintError::ValueOutOfRange {
                    field: "name count",
                    value: self.names.len() as u64,
                }
            })?,
            reserved: 0,
        };
        let mut header_bytes = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        header.write(&mut header_bytes)?;

        let mut writer = ByteWriter::<LittleEndian>::new();
        writer.write_bytes(header_bytes.get_ref());

        let mut xor = CyclicXor::new(NAME_KEY);
        for entry in &self.names {
            let mut region = entry.name.as_bytes().to_vec();
            region.push(0);
            let len = u16::try_from(region.len()).map_err(|_| DataConstraintError::StringTooLong {
                field: "name",
                value: entry.name.clone(),
                width: u16::MAX as usize,
            })?;

            writer.write_u32(entry.id);
            writer.write_u16(len);
            writer.write_bytes(&xor.apply(&region));
        }

        writer.finish()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{NameEntry, NameList, NAME_KEY};
    use crate::error::{Error, FormatError, Result};

    fn sample() -> NameList {
        NameList {
            names: vec![
                NameEntry {
                    id: 7,
                    name: "Goku".into(),
                },
                NameEntry {
                    id: 2,
                    name: "Piccolo (Awakened)".into(),
                },
            ],
        }
    }

    #[traced_test]
    #[test]
    fn key_stream_spans_names() -> Result<()> {
        let out = sample().encode()?;

        assert_eq!(&out[0x10..0x16], &[0x07, 0x00, 0x00, 0x00, 0x05, 0x00]);
        assert_eq!(out[0x16], b'G' ^ NAME_KEY[0]);
        // "Goku\0" used key bytes 0..5, the next name continues at 5
        let second = 0x16 + 5 + 6;
        assert_eq!(out[second], b'P' ^ NAME_KEY[5]);
        // the 19 byte region wraps around the 16 byte key
        assert_eq!(out[out.len() - 1], NAME_KEY[(5 + 18) % 16]);

        let decoded = NameList::decode(&out)?;
        assert_eq!(decoded, sample());
        assert_eq!(decoded.get(2), Some("Piccolo (Awakened)"));
        Ok(())
    }

    #[test]
    fn truncated_region() -> Result<()> {
        let mut out = sample().encode()?;
        out.truncate(out.len() - 3);
        assert!(matches!(
            NameList::decode(&out).unwrap_err(),
            Error::UnexpectedEof { .. }
        ));
        Ok(())
    }

    #[test]
    fn wrong_signature() {
        assert!(matches!(
            NameList::decode(b"#MSG\xFE\xFF\x10\x00\0\0\0\0\0\0\0\0").unwrap_err(),
            Error::Format(FormatError::InvalidSignature { .. })
        ));
    }
}
