//! CRC-16 used to seal headers
//!
//! The checksum is CRC-16 with polynomial `0x8005`, initial value `0`, no reflection and no final
//! xor ([`crc::CRC_16_UMTS`]). It covers everything in front of the last two header bytes and is
//! stored big-endian in those two bytes.

use byteorder::{BigEndian, ByteOrder};
use crc::{Crc, CRC_16_UMTS};

use crate::error::{Error, Result};

/// Table driven CRC-16 engine
pub const HEADER_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_UMTS);

/// Checksum of `data`
pub fn crc16(data: &[u8]) -> u16 {
    HEADER_CRC.checksum(data)
}

/// Recompute the checksum of `header` and store it in its last two bytes.
pub fn seal(header: &mut [u8]) -> Result<u16> {
    let span = checksum_span(header.len())?;
    let checksum = crc16(&header[..span]);
    BigEndian::write_u16(&mut header[span..], checksum);
    Ok(checksum)
}

/// Whether the checksum stored in the last two bytes of `header` is correct.
pub fn verify(header: &[u8]) -> Result<bool> {
    let span = checksum_span(header.len())?;
    Ok(BigEndian::read_u16(&header[span..]) == crc16(&header[..span]))
}

fn checksum_span(len: usize) -> Result<usize> {
    len.checked_sub(2).ok_or(Error::UnexpectedEof {
        offset: 0,
        needed: 2,
        available: len,
    })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{crc16, seal, verify};
    use crate::error::Result;

    fn bitwise_crc16(data: &[u8]) -> u16 {
        let mut crc = 0u16;
        for byte in data {
            crc ^= (*byte as u16) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 {
                    (crc << 1) ^ 0x8005
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    #[test]
    fn check_value() {
        assert_eq!(crc16(b"123456789"), 0xFEE8);
    }

    #[test]
    fn matches_bitwise_implementation() {
        let data: Vec<u8> = (0u8..=255).cycle().take(1000).collect();
        assert_eq!(crc16(&data), bitwise_crc16(&data));
    }

    #[test]
    fn seal_then_verify() -> Result<()> {
        let mut header = b"HCA\0\x02\x00\x00\x0c\0\0".to_vec();
        let checksum = seal(&mut header)?;
        assert_eq!(checksum, bitwise_crc16(&header[..8]));
        assert_eq!(header[8..].to_vec(), checksum.to_be_bytes().to_vec());
        assert!(verify(&header)?);

        // a sealed header checks out to zero over its whole length
        assert_eq!(crc16(&header), 0);
        Ok(())
    }

    #[test]
    fn too_short_to_seal() {
        assert!(seal(&mut [0u8]).is_err());
    }
}
