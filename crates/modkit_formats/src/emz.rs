//! Compressed envelope (`#EMZ`)
//!
//! | Offset | Field             | Description                                   |
//! |--------|-------------------|-----------------------------------------------|
//! | 0x00   | Signature         | 4 bytes: `#EMZ`                               |
//! | 0x04   | Reserved          | 4 bytes                                       |
//! | 0x08   | Uncompressed Size | 4 bytes                                       |
//! | 0x0C   | Data Offset       | 4 bytes: start of the raw DEFLATE stream      |
//!
//! The envelope has no type tag. The unwrapped payload is identified by its own signature, see
//! [`EmzPayload`].

use binrw::{BinRead, BinWrite};
use byteorder::LittleEndian;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use modkit_bin::ByteReader;
use std::io::{Cursor, Read, Write};
use tracing::{debug, instrument};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::bundle::{self, Bundle};
use crate::error::{DataConstraintError, Error, FormatError, Result};
use crate::material::MaterialTable;

pub const SIGNATURE: [u8; 4] = *b"#EMZ";

pub const HEADER_SIZE: usize = 0x10;

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq)]
#[brw(little, magic = b"#EMZ")]
struct EmzHeader {
    reserved: u32,
    uncompressed_size: u32,
    data_offset: u32,
}

/// Decompress an envelope and return its payload.
#[instrument(skip_all, err)]
pub fn unwrap(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = ByteReader::<LittleEndian>::new(data);
    reader.expect_signature(&SIGNATURE)?;
    if data.len() < HEADER_SIZE {
        return Err(Error::UnexpectedEof {
            offset: 0,
            needed: HEADER_SIZE,
            available: data.len(),
        });
    }

    let header = EmzHeader::read(&mut Cursor::new(data))?;
    let stream = data
        .get(header.data_offset as usize..)
        .ok_or(FormatError::OffsetOutOfBounds {
            offset: header.data_offset as usize,
            size: data.len(),
        })?;

    let mut payload = Vec::with_capacity(header.uncompressed_size as usize);
    DeflateDecoder::new(stream).read_to_end(&mut payload)?;
    if payload.len() != header.uncompressed_size as usize {
        return Err(FormatError::LengthMismatch {
            declared: header.uncompressed_size as usize,
            actual: payload.len(),
        }
        .into());
    }

    debug!(
        compressed = stream.len(),
        uncompressed = payload.len(),
        "unwrapped envelope"
    );
    Ok(payload)
}

/// Compress `payload` into an envelope.
#[instrument(skip_all, err)]
pub fn wrap(payload: &[u8]) -> Result<Vec<u8>> {
    let header = EmzHeader {
        reserved: 0,
        uncompressed_size: u32::try_from(payload.len()).map_err(|_| {
            DataConstraintError::ValueOutOfRange {
                field: "uncompressed size",
                value: payload.len() as u64,
            }
        })?,
        data_offset: HEADER_SIZE as u32,
    };

    let mut out = Cursor::new(Vec::with_capacity(HEADER_SIZE + payload.len() / 2));
    header.write(&mut out)?;

    let mut encoder = DeflateEncoder::new(out.into_inner(), Compression::default());
    encoder.write_all(payload)?;
    let out = encoder.finish()?;

    debug!(
        uncompressed = payload.len(),
        compressed = out.len() - HEADER_SIZE,
        "wrapped envelope"
    );
    Ok(out)
}

/// Formats that travel inside an envelope
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EmzPayload {
    Bundle(Bundle),
    Material(MaterialTable),
}

impl EmzPayload {
    const KNOWN: &'static str = "#EMB, #EMM";

    /// Decode an unwrapped payload by its signature.
    pub fn sniff(payload: &[u8]) -> Result<Self> {
        match payload.get(..4) {
            Some(signature) if signature == bundle::SIGNATURE => {
                Ok(Self::Bundle(Bundle::decode(payload)?))
            }
            Some(signature) if signature == b"#EMM" => {
                Ok(Self::Material(MaterialTable::decode(payload)?))
            }
            other => Err(FormatError::UnknownPayload {
                found: String::from_utf8_lossy(other.unwrap_or(payload)).into_owned(),
                expected: Self::KNOWN.to_string(),
            }
            .into()),
        }
    }

    /// Unwrap and decode an envelope.
    pub fn open(data: &[u8]) -> Result<Self> {
        Self::sniff(&unwrap(data)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Bundle(bundle) => bundle.encode(),
            Self::Material(table) => table.encode(),
        }
    }

    /// Encode and wrap into an envelope.
    pub fn seal(&self) -> Result<Vec<u8>> {
        wrap(&self.encode()?)
    }
}
