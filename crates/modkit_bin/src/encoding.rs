//! Text encodings used by pooled and fixed-width string fields
//!

use byteorder::ByteOrder;
use widestring::Utf16String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{DataConstraintError, FormatError, Result};

/// Encoding of a string field, decides the width of the terminator as well
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StringEncoding {
    /// 7-bit ASCII, one byte per character
    #[default]
    Ascii,

    /// UTF-8, single byte terminator
    Utf8,

    /// UTF-16 in the byte order of the surrounding file, two byte terminator
    Utf16,
}

impl StringEncoding {
    /// Human readable name, used in error messages
    pub const fn name(self) -> &'static str {
        match self {
            StringEncoding::Ascii => "ASCII",
            StringEncoding::Utf8 => "UTF-8",
            StringEncoding::Utf16 => "UTF-16",
        }
    }

    /// Size of one code unit, which is also the size of the terminator
    pub const fn unit_size(self) -> usize {
        match self {
            StringEncoding::Ascii | StringEncoding::Utf8 => 1,
            StringEncoding::Utf16 => 2,
        }
    }

    /// Encode `text` without a terminator.
    pub fn encode<E: ByteOrder>(self, field: &'static str, text: &str) -> Result<Vec<u8>> {
        match self {
            StringEncoding::Ascii => {
                if !text.is_ascii() {
                    return Err(DataConstraintError::Unencodable {
                        field,
                        value: text.to_string(),
                        encoding: self.name(),
                    }
                    .into());
                }
                Ok(text.as_bytes().to_vec())
            }
            StringEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            StringEncoding::Utf16 => {
                let units = Utf16String::from_str(text).into_vec();
                let mut out = vec![0u8; units.len() * 2];
                E::write_u16_into(&units, &mut out);
                Ok(out)
            }
        }
    }

    /// Decode a terminated string that starts at `offset` within `data`.
    pub fn decode_terminated<E: ByteOrder>(self, data: &[u8], offset: usize) -> Result<String> {
        if offset > data.len() {
            return Err(FormatError::OffsetOutOfBounds {
                offset,
                size: data.len(),
            }
            .into());
        }

        let tail = &data[offset..];
        let unit = self.unit_size();
        let end = tail
            .chunks_exact(unit)
            .position(|chunk| chunk.iter().all(|b| *b == 0))
            .ok_or(FormatError::MissingTerminator { offset })?;

        self.decode::<E>(&tail[..end * unit], offset)
    }

    /// Decode exactly `bytes`, which must not contain the terminator.
    pub fn decode<E: ByteOrder>(self, bytes: &[u8], offset: usize) -> Result<String> {
        match self {
            StringEncoding::Ascii => {
                if !bytes.is_ascii() {
                    return Err(FormatError::InvalidText {
                        offset,
                        encoding: self.name(),
                    }
                    .into());
                }
                Ok(String::from_utf8(bytes.to_vec())?)
            }
            StringEncoding::Utf8 => Ok(String::from_utf8(bytes.to_vec())?),
            StringEncoding::Utf16 => {
                if bytes.len() % 2 != 0 {
                    return Err(FormatError::InvalidText {
                        offset,
                        encoding: self.name(),
                    }
                    .into());
                }
                let mut units = vec![0u16; bytes.len() / 2];
                E::read_u16_into(bytes, &mut units);
                Ok(Utf16String::from_vec(units)?.to_string())
            }
        }
    }
}
