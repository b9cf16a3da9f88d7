//! Bounds checked random access reader over an in-memory buffer
//!

use byteorder::ByteOrder;
use std::marker::PhantomData;

use crate::encoding::StringEncoding;
use crate::error::{Error, FormatError, Result};

/// Reader over a byte slice in the byte order `E`
///
/// Every read is bounds checked and reports the offending offset, so corrupt pointers surface as
/// [`Error::UnexpectedEof`] or [`FormatError::OffsetOutOfBounds`] instead of panics.
#[derive(Debug, Clone)]
pub struct ByteReader<'a, E: ByteOrder> {
    data: &'a [u8],
    position: usize,
    _order: PhantomData<E>,
}

impl<'a, E: ByteOrder> ByteReader<'a, E> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            _order: PhantomData,
        }
    }

    /// Create a reader that starts at `position`.
    pub fn at(data: &'a [u8], position: usize) -> Result<Self> {
        let mut reader = Self::new(data);
        reader.seek(position)?;
        Ok(reader)
    }

    /// The complete underlying buffer, independent of the position
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Move to an absolute position. Seeking to the very end is allowed.
    pub fn seek(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(FormatError::OffsetOutOfBounds {
                offset: position,
                size: self.data.len(),
            }
            .into());
        }
        self.position = position;
        Ok(())
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or(Error::UnexpectedEof {
                offset: self.position,
                needed: count,
                available: self.remaining(),
            })?;

        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(E::read_u16(self.read_bytes(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(E::read_i16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(E::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(E::read_i32(self.read_bytes(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(E::read_u64(self.read_bytes(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(E::read_f32(self.read_bytes(4)?))
    }

    /// Read a 32-bit field that is used as a position or a length.
    pub fn read_offset(&mut self) -> Result<usize> {
        Ok(self.read_u32()? as usize)
    }

    /// Read `expected.len()` bytes and compare them with `expected`.
    pub fn expect_signature(&mut self, expected: &[u8]) -> Result<()> {
        let found = self.read_bytes(expected.len())?;
        if found != expected {
            return Err(FormatError::InvalidSignature {
                expected: String::from_utf8_lossy(expected).into_owned(),
                found: String::from_utf8_lossy(found).into_owned(),
            }
            .into());
        }
        Ok(())
    }

    /// Read a zero padded field of `width` bytes. The text ends at the first NUL.
    pub fn read_fixed_str(&mut self, width: usize, encoding: StringEncoding) -> Result<String> {
        let offset = self.position;
        let field = self.read_bytes(width)?;
        let unit = encoding.unit_size();
        let end = field
            .chunks_exact(unit)
            .position(|chunk| chunk.iter().all(|b| *b == 0))
            .map_or(field.len() - field.len() % unit, |units| units * unit);
        encoding.decode::<E>(&field[..end], offset)
    }

    /// Decode a terminated string at an absolute offset without moving the reader.
    pub fn string_at(&self, offset: usize, encoding: StringEncoding) -> Result<String> {
        encoding.decode_terminated::<E>(self.data, offset)
    }
}

#[cfg(test)]
mod test {
    use byteorder::{BigEndian, LittleEndian};
    use pretty_assertions::assert_eq;

    use super::ByteReader;
    use crate::encoding::StringEncoding;
    use crate::error::{Error, FormatError, Result};

    #[test]
    fn mixed_width_reads() -> Result<()> {
        #[rustfmt::skip]
        let data = [
            0x01,
            0x02, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x80, 0x3F,
        ];
        let mut reader = ByteReader::<LittleEndian>::new(&data);
        assert_eq!(reader.read_u8()?, 1);
        assert_eq!(reader.read_u16()?, 2);
        assert_eq!(reader.read_u32()?, 3);
        assert_eq!(reader.read_f32()?, 1.0);
        assert_eq!(reader.remaining(), 0);
        Ok(())
    }

    #[test]
    fn big_endian_reads() -> Result<()> {
        let data = [0x48, 0x43, 0x00, 0x60];
        let mut reader = ByteReader::<BigEndian>::new(&data);
        assert_eq!(reader.read_u16()?, 0x4843);
        assert_eq!(reader.read_u16()?, 0x60);
        Ok(())
    }

    #[test]
    fn eof_reports_position() {
        let data = [0u8; 3];
        let mut reader = ByteReader::<LittleEndian>::new(&data);
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedEof {
                offset: 0,
                needed: 4,
                available: 3
            }
        ));
    }

    #[test]
    fn seek_past_end_is_rejected() {
        let data = [0u8; 4];
        let mut reader = ByteReader::<LittleEndian>::new(&data);
        assert!(reader.seek(4).is_ok());
        assert!(matches!(
            reader.seek(5).unwrap_err(),
            Error::Format(FormatError::OffsetOutOfBounds { offset: 5, size: 4 })
        ));
    }

    #[test]
    fn fixed_string_stops_at_nul() -> Result<()> {
        let data = *b"GKU\0";
        let mut reader = ByteReader::<LittleEndian>::new(&data);
        assert_eq!(reader.read_fixed_str(4, StringEncoding::Ascii)?, "GKU");
        assert_eq!(reader.position(), 4);
        Ok(())
    }

    #[test]
    fn signature_mismatch() {
        let data = *b"#AUR";
        let mut reader = ByteReader::<LittleEndian>::new(&data);
        let err = reader.expect_signature(b"#CMS").unwrap_err();
        assert!(matches!(
            err,
            Error::Format(FormatError::InvalidSignature { .. })
        ));
    }
}
