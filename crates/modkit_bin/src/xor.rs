//! Cyclic XOR obfuscation of length-prefixed string regions
//!
//! A single key stream runs across the whole file: the position counter keeps walking the key
//! table from one region to the next and wraps at the end of the table. The counter always moves
//! over the full declared length of a region, including a terminator that is dropped from the
//! decoded output.

/// Key stream state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclicXor {
    key: Vec<u8>,
    position: usize,
}

impl CyclicXor {
    /// New stream at the start of `key`. An empty key leaves the data untouched.
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            position: 0,
        }
    }

    /// Index of the next key byte
    pub fn position(&self) -> usize {
        self.position
    }

    /// Restart the stream at the beginning of the key.
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// XOR `region` with the key stream and advance past it.
    pub fn apply(&mut self, region: &[u8]) -> Vec<u8> {
        if self.key.is_empty() {
            return region.to_vec();
        }

        region
            .iter()
            .map(|byte| {
                let out = byte ^ self.key[self.position];
                self.position = (self.position + 1) % self.key.len();
                out
            })
            .collect()
    }

    /// Decode a region, dropping a NUL produced at its final position.
    pub fn decode_region(&mut self, region: &[u8]) -> Vec<u8> {
        let mut plain = self.apply(region);
        if plain.last() == Some(&0) {
            plain.pop();
        }
        plain
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::CyclicXor;

    #[test]
    fn stream_continues_across_regions() {
        let mut xor = CyclicXor::new([0x10u8, 0x20, 0x30]);
        assert_eq!(xor.apply(&[0x00, 0x00]), vec![0x10, 0x20]);
        assert_eq!(xor.position(), 2);
        assert_eq!(xor.apply(&[0x00, 0x00]), vec![0x30, 0x10]);
        assert_eq!(xor.position(), 1);
    }

    #[test]
    fn trailing_nul_is_dropped_but_consumes_key() {
        let key = [0x5Au8, 0xA5, 0x3C, 0xC3];
        let mut encoder = CyclicXor::new(key);
        let encoded = encoder.apply(b"ab\0");

        let mut decoder = CyclicXor::new(key);
        assert_eq!(decoder.decode_region(&encoded), b"ab".to_vec());
        assert_eq!(decoder.position(), 3);
    }

    #[test]
    fn inner_nul_is_kept() {
        let mut xor = CyclicXor::new([0x00u8]);
        assert_eq!(xor.decode_region(b"a\0b"), b"a\0b".to_vec());
    }

    #[test]
    fn empty_key_is_identity() {
        let mut xor = CyclicXor::new(Vec::<u8>::new());
        assert_eq!(xor.apply(b"plain"), b"plain".to_vec());
    }
}
