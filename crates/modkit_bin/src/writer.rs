//! Growable writer with deferred "patch after append" fields
//!

use byteorder::ByteOrder;
use std::marker::PhantomData;
use tracing::trace;

use crate::align::padding_for;
use crate::encoding::StringEncoding;
use crate::error::{DataConstraintError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatchWidth {
    U16,
    U32,
}

/// A reserved field whose value is only known after later data has been appended
///
/// Tokens can't be cloned and are consumed by [`ByteWriter::resolve`], so each placeholder is
/// patched exactly once. [`ByteWriter::finish`] refuses to hand out the buffer while any token is
/// still outstanding.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reserved field has to be resolved before the writer can finish"]
pub struct PatchToken {
    offset: usize,
    width: PatchWidth,
}

impl PatchToken {
    /// Position of the placeholder in the buffer
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Byte buffer writer in the byte order `E`
#[derive(Debug, Clone)]
pub struct ByteWriter<E: ByteOrder> {
    buffer: Vec<u8>,
    pending: usize,
    _order: PhantomData<E>,
}

impl<E: ByteOrder> Default for ByteWriter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ByteOrder> ByteWriter<E> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            pending: 0,
            _order: PhantomData,
        }
    }

    /// Current write position, always the end of the buffer
    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of reserved fields that have not been resolved yet
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut bytes = [0u8; 2];
        E::write_u16(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_i16(&mut self, value: i16) {
        let mut bytes = [0u8; 2];
        E::write_i16(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut bytes = [0u8; 4];
        E::write_u32(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut bytes = [0u8; 4];
        E::write_i32(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_u64(&mut self, value: u64) {
        let mut bytes = [0u8; 8];
        E::write_u64(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_f32(&mut self, value: f32) {
        let mut bytes = [0u8; 4];
        E::write_f32(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_zeros(&mut self, count: usize) {
        self.buffer.resize(self.buffer.len() + count, 0);
    }

    /// Zero pad up to the next multiple of `boundary`, returns the number of bytes written.
    pub fn pad_to(&mut self, boundary: usize) -> usize {
        let padding = padding_for(self.buffer.len(), boundary);
        self.write_zeros(padding);
        padding
    }

    /// Write a count or length into a 32-bit field.
    pub fn write_len_u32(&mut self, field: &'static str, value: usize) -> Result<()> {
        let value = u32::try_from(value).map_err(|_| DataConstraintError::ValueOutOfRange {
            field,
            value: value as u64,
        })?;
        self.write_u32(value);
        Ok(())
    }

    /// Write `value` zero padded into a field of `width` bytes.
    ///
    /// The text plus one terminator unit has to fit into the field. Nothing is written when it
    /// doesn't.
    pub fn write_fixed_str(
        &mut self,
        field: &'static str,
        value: &str,
        width: usize,
        encoding: StringEncoding,
    ) -> Result<()> {
        let encoded = encoding.encode::<E>(field, value)?;
        if encoded.len() + encoding.unit_size() > width {
            return Err(DataConstraintError::StringTooLong {
                field,
                value: value.to_string(),
                width,
            }
            .into());
        }

        self.write_bytes(&encoded);
        self.write_zeros(width - encoded.len());
        Ok(())
    }

    /// Reserve a zeroed 32-bit field.
    pub fn reserve_u32(&mut self) -> PatchToken {
        self.reserve(PatchWidth::U32)
    }

    /// Reserve a zeroed 16-bit field.
    pub fn reserve_u16(&mut self) -> PatchToken {
        self.reserve(PatchWidth::U16)
    }

    fn reserve(&mut self, width: PatchWidth) -> PatchToken {
        let offset = self.position();
        match width {
            PatchWidth::U16 => self.write_u16(0),
            PatchWidth::U32 => self.write_u32(0),
        }
        self.pending += 1;
        PatchToken { offset, width }
    }

    /// Overwrite a reserved field with its final value.
    pub fn resolve(&mut self, token: PatchToken, value: usize) -> Result<()> {
        let PatchToken { offset, width } = token;
        let size = match width {
            PatchWidth::U16 => 2,
            PatchWidth::U32 => 4,
        };
        let slot = self
            .buffer
            .get_mut(offset..offset + size)
            .ok_or(DataConstraintError::PatchOutOfBounds(offset))?;

        let out_of_range = || DataConstraintError::ValueOutOfRange {
            field: "patched field",
            value: value as u64,
        };
        match width {
            PatchWidth::U16 => E::write_u16(slot, u16::try_from(value).map_err(|_| out_of_range())?),
            PatchWidth::U32 => E::write_u32(slot, u32::try_from(value).map_err(|_| out_of_range())?),
        }

        trace!(offset, value, "resolved placeholder");
        self.pending -= 1;
        Ok(())
    }

    /// Resolve a pointer field with `target - base`.
    pub fn resolve_offset(&mut self, token: PatchToken, target: usize, base: usize) -> Result<()> {
        let delta = target
            .checked_sub(base)
            .ok_or(DataConstraintError::NegativeOffset { target, base })?;
        self.resolve(token, delta)
    }

    /// Hand out the finished buffer.
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.pending != 0 {
            return Err(DataConstraintError::UnresolvedPatches(self.pending).into());
        }
        Ok(self.buffer)
    }
}

#[cfg(test)]
mod test {
    use byteorder::{BigEndian, LittleEndian};
    use pretty_assertions::assert_eq;

    use super::ByteWriter;
    use crate::encoding::StringEncoding;
    use crate::error::{DataConstraintError, Error, Result};

    #[test]
    fn patch_after_append() -> Result<()> {
        let mut writer = ByteWriter::<LittleEndian>::new();
        writer.write_u32(7);
        let token = writer.reserve_u32();
        writer.write_bytes(b"payload");
        let target = writer.position();
        writer.write_u8(0xAA);
        writer.resolve_offset(token, target, 4)?;

        #[rustfmt::skip]
        let expected = vec![
            0x07, 0x00, 0x00, 0x00,
            0x0B, 0x00, 0x00, 0x00,
            b'p', b'a', b'y', b'l', b'o', b'a', b'd',
            0xAA,
        ];
        assert_eq!(writer.finish()?, expected);
        Ok(())
    }

    #[test]
    fn big_endian_u16_patch() -> Result<()> {
        let mut writer = ByteWriter::<BigEndian>::new();
        let token = writer.reserve_u16();
        writer.resolve(token, 0x0160)?;
        assert_eq!(writer.finish()?, vec![0x01, 0x60]);
        Ok(())
    }

    #[test]
    fn finish_with_outstanding_token() {
        let mut writer = ByteWriter::<LittleEndian>::new();
        let _token = writer.reserve_u32();
        let err = writer.finish().unwrap_err();
        assert!(matches!(
            err,
            Error::Constraint(DataConstraintError::UnresolvedPatches(1))
        ));
    }

    #[test]
    fn negative_offset() {
        let mut writer = ByteWriter::<LittleEndian>::new();
        writer.write_zeros(8);
        let token = writer.reserve_u32();
        let err = writer.resolve_offset(token, 4, 8).unwrap_err();
        assert!(matches!(
            err,
            Error::Constraint(DataConstraintError::NegativeOffset { target: 4, base: 8 })
        ));
    }

    #[test]
    fn u16_patch_out_of_range() {
        let mut writer = ByteWriter::<LittleEndian>::new();
        let token = writer.reserve_u16();
        assert!(writer.resolve(token, 0x1_0000).is_err());
    }

    #[test]
    fn fixed_string_is_zero_padded() -> Result<()> {
        let mut writer = ByteWriter::<LittleEndian>::new();
        writer.write_fixed_str("short_name", "GK", 4, StringEncoding::Ascii)?;
        assert_eq!(writer.finish()?, vec![b'G', b'K', 0, 0]);
        Ok(())
    }

    #[test]
    fn fixed_string_too_long_writes_nothing() {
        let mut writer = ByteWriter::<LittleEndian>::new();
        let err = writer
            .write_fixed_str("short_name", "GOKU", 4, StringEncoding::Ascii)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Constraint(DataConstraintError::StringTooLong { width: 4, .. })
        ));
        assert!(writer.is_empty());
    }

    #[test]
    fn pad_to_boundary() {
        let mut writer = ByteWriter::<LittleEndian>::new();
        writer.write_zeros(0x24);
        assert_eq!(writer.pad_to(16), 12);
        assert_eq!(writer.position(), 0x30);
        assert_eq!(writer.pad_to(16), 0);
    }
}
