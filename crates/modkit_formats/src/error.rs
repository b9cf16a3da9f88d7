//! Error types shared with [`modkit_bin`]
//!
//! Format codecs fail with the same categories as the engine underneath them, so the engine's
//! error enums are re-exported as they are.

pub use modkit_bin::error::{DataConstraintError, Error, FormatError, Result};
