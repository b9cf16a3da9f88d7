//! Padding arithmetic between variable length sections
//!

/// Number of zero bytes needed to move `len` onto the next multiple of `boundary`.
///
/// A boundary of `0` or `1` never needs padding.
pub const fn padding_for(len: usize, boundary: usize) -> usize {
    if boundary <= 1 {
        return 0;
    }
    (boundary - len % boundary) % boundary
}

/// `len` rounded up to the next multiple of `boundary`
pub const fn align_up(len: usize, boundary: usize) -> usize {
    len + padding_for(len, boundary)
}
