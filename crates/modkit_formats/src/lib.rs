//! Concrete file formats handled by **modkit**.
//!
//! ## Engine Tables
//!
//! All of these use the common table header from [`modkit_bin::table`] and only describe their
//! records.
//!
//! | Module        | Signature                   | Contents                                  |
//! |---------------|-----------------------------|-------------------------------------------|
//! | [`aura`]      | `#AUR`                      | aura effects per aura id                  |
//! | [`chara`]     | `#CMS`                      | playable characters and their DLC flags   |
//! | [`message`]   | `#MSG`                      | localized message names and texts         |
//! | [`cue`]       | `#CUE`                      | audio cues                                |
//! | [`lookup`]    | `#LUT`                      | jukebox slots mapped to cues              |
//! | [`partner`]   | `#PSK` `#PST` `#POF` `#PAI` | partner skills, stats, outfits and AI     |
//! | [`material`]  | `#EMM`                      | materials with shader parameters          |
//!
//! [`any::AnyTable`] decodes any of them by signature.
//!
//! ## Other Formats
//!
//! - [`audio_loop`]: loop points in the header of `HCA` streams
//! - [`name_list`]: XOR obfuscated name list (`#ONL`)
//! - [`bundle`]: resource bundle (`#EMB`)
//! - [`emz`]: DEFLATE envelope around a bundle or a material table
//!

pub mod any;
pub mod audio_loop;
pub mod aura;
pub mod bundle;
pub mod chara;
pub mod cue;
pub mod emz;
pub mod error;
pub mod lookup;
pub mod material;
pub mod message;
pub mod name_list;
pub mod partner;

pub use any::{AnyTable, TableKind, TableVariant};
