//! Deferred placement of pointed-to strings
//!
//! Entry records only carry a pointer to their strings. While the fixed region is written, every
//! string field reserves a zeroed pointer and queues its text. Once the fixed region is complete
//! the pool is flushed: the strings are appended in the order they were queued, each followed by a
//! single terminator unit, and every pointer is patched with `string position - reference base`.

use byteorder::ByteOrder;
use tracing::debug;

use crate::encoding::StringEncoding;
use crate::error::Result;
use crate::writer::{ByteWriter, PatchToken};

/// Reserved pointer field of a pooled string
#[derive(Debug)]
#[must_use = "a reserved string slot has to be queued in the pool"]
pub struct StringSlot {
    token: PatchToken,
    base: usize,
}

impl StringSlot {
    /// Position the resolved pointer will be relative to
    pub fn base(&self) -> usize {
        self.base
    }
}

#[derive(Debug)]
struct PooledString {
    slot: StringSlot,
    bytes: Vec<u8>,
    terminator: usize,
}

/// Queue of strings waiting to be appended after the fixed region
#[derive(Debug, Default)]
pub struct StringPool {
    queued: Vec<PooledString>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Reserve a 32-bit pointer at the current writer position.
    pub fn reserve<E: ByteOrder>(
        &self,
        writer: &mut ByteWriter<E>,
        reference_base: usize,
    ) -> StringSlot {
        StringSlot {
            token: writer.reserve_u32(),
            base: reference_base,
        }
    }

    /// Queue the text for a reserved slot. The text is validated against the encoding right away.
    pub fn enqueue<E: ByteOrder>(
        &mut self,
        slot: StringSlot,
        field: &'static str,
        text: &str,
        encoding: StringEncoding,
    ) -> Result<()> {
        let bytes = encoding.encode::<E>(field, text)?;
        self.queued.push(PooledString {
            slot,
            bytes,
            terminator: encoding.unit_size(),
        });
        Ok(())
    }

    /// Write a pointer field for an optional string. `None` leaves a null pointer.
    pub fn write_pointer<E: ByteOrder>(
        &mut self,
        writer: &mut ByteWriter<E>,
        reference_base: usize,
        field: &'static str,
        text: Option<&str>,
        encoding: StringEncoding,
    ) -> Result<()> {
        match text {
            Some(text) => {
                // validate before reserving so a rejected string leaves the writer untouched
                let bytes = encoding.encode::<E>(field, text)?;
                let slot = self.reserve(writer, reference_base);
                self.queued.push(PooledString {
                    slot,
                    bytes,
                    terminator: encoding.unit_size(),
                });
            }
            None => writer.write_u32(0),
        }
        Ok(())
    }

    /// Append every queued string and patch its pointer. Returns the number of bytes appended.
    pub fn flush<E: ByteOrder>(self, writer: &mut ByteWriter<E>) -> Result<usize> {
        let start = writer.position();
        let count = self.queued.len();

        for pooled in self.queued {
            let position = writer.position();
            writer.write_bytes(&pooled.bytes);
            writer.write_zeros(pooled.terminator);
            writer.resolve_offset(pooled.slot.token, position, pooled.slot.base)?;
        }

        let appended = writer.position() - start;
        debug!(count, appended, "flushed string pool");
        Ok(appended)
    }
}

#[cfg(test)]
mod test {
    use byteorder::LittleEndian;
    use pretty_assertions::assert_eq;

    use super::StringPool;
    use crate::encoding::StringEncoding;
    use crate::error::Result;
    use crate::writer::ByteWriter;

    #[test]
    fn single_string_pointer_and_terminator() -> Result<()> {
        let mut writer = ByteWriter::<LittleEndian>::new();
        let mut pool = StringPool::new();

        writer.write_zeros(8);
        let base = writer.position();
        let slot = pool.reserve(&mut writer, base);
        writer.write_u32(0xDEADBEEF);
        pool.enqueue::<LittleEndian>(slot, "name", "abc", StringEncoding::Ascii)?;

        let string_position = writer.position();
        assert_eq!(pool.flush(&mut writer)?, 4);

        let out = writer.finish()?;
        let pointer = u32::from_le_bytes([out[8], out[9], out[10], out[11]]) as usize;
        assert_eq!(pointer, string_position - base);
        assert_eq!(&out[string_position..], b"abc\0");
        Ok(())
    }

    #[test]
    fn strings_follow_enqueue_order() -> Result<()> {
        let mut writer = ByteWriter::<LittleEndian>::new();
        let mut pool = StringPool::new();

        let first = pool.reserve(&mut writer, 0);
        let second = pool.reserve(&mut writer, 0);
        pool.enqueue::<LittleEndian>(second, "b", "second", StringEncoding::Utf8)?;
        pool.enqueue::<LittleEndian>(first, "a", "1", StringEncoding::Utf16)?;
        pool.flush(&mut writer)?;

        #[rustfmt::skip]
        let expected = vec![
            0x0F, 0x00, 0x00, 0x00,
            0x08, 0x00, 0x00, 0x00,
            b's', b'e', b'c', b'o', b'n', b'd', 0x00,
            b'1', 0x00, 0x00, 0x00,
        ];
        assert_eq!(writer.finish()?, expected);
        Ok(())
    }

    #[test]
    fn missing_string_is_null_pointer() -> Result<()> {
        let mut writer = ByteWriter::<LittleEndian>::new();
        let mut pool = StringPool::new();
        pool.write_pointer(&mut writer, 0, "name", None, StringEncoding::Ascii)?;
        assert!(pool.is_empty());
        assert_eq!(pool.flush(&mut writer)?, 0);
        assert_eq!(writer.finish()?, vec![0, 0, 0, 0]);
        Ok(())
    }

    #[test]
    fn rejected_string_leaves_writer_untouched() {
        let mut writer = ByteWriter::<LittleEndian>::new();
        let mut pool = StringPool::new();
        let result = pool.write_pointer(&mut writer, 0, "name", Some("ü"), StringEncoding::Ascii);
        assert!(result.is_err());
        assert!(writer.is_empty());
        assert_eq!(writer.pending(), 0);
    }
}
