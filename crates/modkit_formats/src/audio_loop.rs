//! Loop metadata in the header of `HCA` audio streams
//!
//! The header is big-endian and made of tagged chunks. The audio frames after the header are never
//! touched, only the header is rewritten.
//!
//! | Offset | Field        | Description                                                  |
//! |--------|--------------|--------------------------------------------------------------|
//! | 0x00   | Signature    | 4 bytes: `HCA\0`                                             |
//! | 0x04   | Version      | 2 bytes                                                      |
//! | 0x06   | Header Size  | 2 bytes: offset of the first audio frame                     |
//! | 0x08   | Chunks       | tagged chunks up to `Header Size - 2`                        |
//! | -0x02  | Checksum     | 2 bytes: CRC-16 of everything before it                      |
//!
//! | Tag    | Size     |
//! |--------|----------|
//! | `fmt`  | 16       |
//! | `comp` | 16       |
//! | `dec`  | 12       |
//! | `vbr`  | 8        |
//! | `ath`  | 6        |
//! | `loop` | 16       |
//! | `ciph` | 6        |
//! | `rva`  | 8        |
//! | `comm` | 5 + terminated comment |
//! | `pad`  | the rest of the header |
//!
//! Tags may have the high bit of each byte set, it is ignored when reading them.
//!
//! ### Loop Chunk
//!
//! | Offset | Field         | Description                |
//! |--------|---------------|----------------------------|
//! | 0x00   | Tag           | 4 bytes: `loop`            |
//! | 0x04   | Start Frame   | 4 bytes                    |
//! | 0x08   | End Frame     | 4 bytes                    |
//! | 0x0C   | Pre Samples   | 2 bytes                    |
//! | 0x0E   | Post Samples  | 2 bytes                    |
//!
//! A loop chunk is inserted right after the last of `fmt`, `comp`, `dec`, `vbr` and `ath`.

use byteorder::{BigEndian, ByteOrder};
use modkit_bin::{checksum, ByteReader, ByteWriter};
use tracing::{debug, instrument};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{DataConstraintError, FormatError, Result};

pub const SIGNATURE: [u8; 4] = *b"HCA\0";

/// Size of the loop chunk, including its tag
pub const LOOP_CHUNK_SIZE: usize = 16;

const HEADER_SIZE_OFFSET: usize = 6;
const FIRST_CHUNK: usize = 8;
const LOOP_TAG: [u8; 4] = *b"loop";
const LOOP_ANCHORS: [[u8; 4]; 5] = [*b"fmt\0", *b"comp", *b"dec\0", *b"vbr\0", *b"ath\0"];

fn unmask(tag: [u8; 4]) -> [u8; 4] {
    tag.map(|b| b & 0x7F)
}

/// Loop points of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoopInfo {
    pub start_frame: u32,
    pub end_frame: u32,
    pub pre_samples: u16,
    pub post_samples: u16,
}

/// Position of one chunk in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Tag with the high bits cleared
    pub tag: [u8; 4],
    pub offset: usize,
    pub len: usize,
}

impl Chunk {
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag)
            .trim_end_matches('\0')
            .to_string()
    }
}

/// An audio stream with a parsed header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    data: Vec<u8>,
    version: u16,
    header_size: usize,
    chunks: Vec<Chunk>,
}

impl AudioFile {
    /// Parse the header of `data`. The data is kept as is.
    #[instrument(skip_all, err)]
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let (version, header_size, chunks) = walk(&data)?;
        debug!(version, header_size, chunks = chunks.len(), "parsed audio header");
        Ok(Self {
            data,
            version,
            header_size,
            chunks,
        })
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn header(&self) -> &[u8] {
        &self.data[..self.header_size]
    }

    /// Audio frames after the header
    pub fn payload(&self) -> &[u8] {
        &self.data[self.header_size..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Whether the stored header checksum is correct
    pub fn checksum_valid(&self) -> Result<bool> {
        checksum::verify(self.header())
    }

    fn find(&self, tag: [u8; 4]) -> Option<Chunk> {
        self.chunks.iter().find(|c| c.tag == tag).copied()
    }

    pub fn loop_info(&self) -> Result<Option<LoopInfo>> {
        let Some(chunk) = self.find(LOOP_TAG) else {
            return Ok(None);
        };

        let mut reader = ByteReader::<BigEndian>::at(&self.data, chunk.offset + 4)?;
        Ok(Some(LoopInfo {
            start_frame: reader.read_u32()?,
            end_frame: reader.read_u32()?,
            pre_samples: reader.read_u16()?,
            post_samples: reader.read_u16()?,
        }))
    }

    /// Set the loop points, inserting a loop chunk when there is none.
    #[instrument(skip(self), err)]
    pub fn set_loop(&mut self, info: LoopInfo) -> Result<()> {
        let mut writer = ByteWriter::<BigEndian>::with_capacity(LOOP_CHUNK_SIZE);
        writer.write_bytes(&LOOP_TAG);
        writer.write_u32(info.start_frame);
        writer.write_u32(info.end_frame);
        writer.write_u16(info.pre_samples);
        writer.write_u16(info.post_samples);
        let chunk = writer.finish()?;

        match self.find(LOOP_TAG) {
            Some(existing) => {
                // keep the stored tag, it may carry masking bits
                self.data[existing.offset + 4..existing.offset + LOOP_CHUNK_SIZE]
                    .copy_from_slice(&chunk[4..]);
            }
            None => {
                let at = self
                    .chunks
                    .iter()
                    .filter(|c| LOOP_ANCHORS.contains(&c.tag))
                    .map(|c| c.offset + c.len)
                    .max()
                    .unwrap_or(FIRST_CHUNK);
                self.resize_header(self.header_size + LOOP_CHUNK_SIZE)?;
                self.data.splice(at..at, chunk);
                debug!(at, header_size = self.header_size, "inserted loop chunk");
            }
        }

        self.reseal()
    }

    /// Remove the loop chunk, returns whether there was one.
    #[instrument(skip(self), err)]
    pub fn clear_loop(&mut self) -> Result<bool> {
        let Some(existing) = self.find(LOOP_TAG) else {
            return Ok(false);
        };

        self.resize_header(self.header_size - LOOP_CHUNK_SIZE)?;
        self.data
            .drain(existing.offset..existing.offset + LOOP_CHUNK_SIZE);
        debug!(header_size = self.header_size, "removed loop chunk");

        self.reseal()?;
        Ok(true)
    }

    fn resize_header(&mut self, header_size: usize) -> Result<()> {
        let field = u16::try_from(header_size).map_err(|_| DataConstraintError::ValueOutOfRange {
            field: "header size",
            value: header_size as u64,
        })?;
        BigEndian::write_u16(
            &mut self.data[HEADER_SIZE_OFFSET..HEADER_SIZE_OFFSET + 2],
            field,
        );
        self.header_size = header_size;
        Ok(())
    }

    fn reseal(&mut self) -> Result<()> {
        checksum::seal(&mut self.data[..self.header_size])?;
        let (_, _, chunks) = walk(&self.data)?;
        self.chunks = chunks;
        Ok(())
    }
}

fn walk(data: &[u8]) -> Result<(u16, usize, Vec<Chunk>)> {
    let mut reader = ByteReader::<BigEndian>::new(data);
    let signature = reader.read_array::<4>()?;
    if unmask(signature) != SIGNATURE {
        return Err(FormatError::InvalidSignature {
            expected: "HCA".to_string(),
            found: String::from_utf8_lossy(&signature).into_owned(),
        }
        .into());
    }

    let version = reader.read_u16()?;
    let header_size = reader.read_u16()? as usize;
    if header_size < FIRST_CHUNK + 2 {
        return Err(FormatError::UnsupportedHeaderSize {
            expected: FIRST_CHUNK + 2,
            found: header_size,
        }
        .into());
    }
    if header_size > data.len() {
        return Err(FormatError::OffsetOutOfBounds {
            offset: header_size,
            size: data.len(),
        }
        .into());
    }

    let end = header_size - 2;
    let mut chunks = Vec::new();
    while reader.position() < end {
        let offset = reader.position();
        let tag = unmask(reader.read_array::<4>()?);
        let len = match &tag {
            b"fmt\0" | b"comp" | b"loop" => 16,
            b"dec\0" => 12,
            b"vbr\0" | b"rva\0" => 8,
            b"ath\0" | b"ciph" => 6,
            b"comm" => {
                let text = offset + 5;
                let terminator = data
                    .get(text..end)
                    .and_then(|rest| rest.iter().position(|b| *b == 0))
                    .ok_or(FormatError::MissingTerminator { offset: text })?;
                5 + terminator + 1
            }
            b"pad\0" => end - offset,
            _ => {
                return Err(FormatError::UnknownChunk {
                    tag: String::from_utf8_lossy(&tag).into_owned(),
                    offset,
                }
                .into())
            }
        };

        if offset + len > end {
            return Err(FormatError::OffsetOutOfBounds {
                offset: offset + len,
                size: end,
            }
            .into());
        }
        reader.seek(offset + len)?;
        chunks.push(Chunk { tag, offset, len });
    }

    Ok((version, header_size, chunks))
}
