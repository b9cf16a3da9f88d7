//! Aura table (`#AUR`)
//!
//! | Offset | Field         | Description                                  |
//! |--------|---------------|----------------------------------------------|
//! | 0x00   | Aura ID       | 4 bytes: sort id, dense from 0               |
//! | 0x04   | Flags         | 4 bytes: [`AuraFlags`]                       |
//! | 0x08   | Effect Count  | 4 bytes                                      |
//! | 0x0C   | Effect Offset | 4 bytes: file offset of the first effect     |
//!
//! Each effect is 8 bytes: effect kind (4 bytes) and effect id (4 bytes, signed, `-1` for none).
//!
//! The game indexes auras by position, so every id between `0` and the highest id has to be
//! present. Missing ids are filled with empty auras on encode, up to [`MAX_AURA_ID`].

use bitflags::bitflags;
use modkit_bin::table::{OffsetBase, SubLink};
use modkit_bin::{
    installable::pad_dense, EntryReader, EntrySchema, EntryWriter, Installable, StringEncoding,
    SubEntrySchema, Table, TableLayout,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Highest aura id the encoder pads up to
pub const MAX_AURA_ID: u32 = 0xFFFF;

bitflags! {
    /// Rendering behaviour of an aura
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct AuraFlags: u32 {
        /// Adds the screen glare pass
        const GLARE = 0x1;
        /// Keeps the aura during the idle animation
        const PERSIST_IDLE = 0x2;
        /// Keeps the aura while transformed
        const PERSIST_TRANSFORM = 0x4;
        /// Hides the character's own lighting
        const OVERRIDE_LIGHTING = 0x8;
    }
}

/// One entry of the aura table
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AuraEntry {
    pub id: u32,
    pub flags: AuraFlags,
    pub effects: Vec<AuraEffect>,
}

impl AuraEntry {
    /// Empty aura used to keep ids dense
    pub fn empty(id: u32) -> Self {
        Self {
            id,
            flags: AuraFlags::empty(),
            effects: Vec::new(),
        }
    }
}

/// Particle effect attached to an aura
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AuraEffect {
    /// Which slot of the aura the effect plays in
    pub kind: u32,
    pub effect_id: i32,
}

/// Aura table file
pub type AuraTable = Table<AuraEntry>;

impl Installable for AuraEntry {
    fn sort_id(&self) -> u32 {
        self.id
    }

    fn index(&self) -> String {
        self.id.to_string()
    }
}

impl EntrySchema for AuraEntry {
    const LAYOUT: TableLayout = TableLayout {
        signature: *b"#AUR",
        version: 0,
        entry_size: 0x10,
        sub_entry_size: 0x08,
        sub_link: SubLink::Offset,
        offset_base: OffsetBase::File,
        encoding: StringEncoding::Ascii,
    };
    type Sub = AuraEffect;

    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        Ok(Self {
            id: reader.read_u32()?,
            flags: AuraFlags::from_bits_retain(reader.read_u32()?),
            effects: reader.read_sub_entries()?,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_u32(self.id);
        writer.write_u32(self.flags.bits());
        writer.write_sub_link(self.effects.len())
    }

    fn sub_entries(&self) -> &[AuraEffect] {
        &self.effects
    }

    fn canonical_fill(entries: &mut Vec<Self>) -> Result<()> {
        pad_dense(entries, MAX_AURA_ID, AuraEntry::empty)
    }

    fn is_placeholder(&self) -> bool {
        self.flags.is_empty() && self.effects.is_empty()
    }
}

impl SubEntrySchema for AuraEffect {
    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        Ok(Self {
            kind: reader.read_u32()?,
            effect_id: reader.read_i32()?,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_u32(self.kind);
        writer.write_i32(self.effect_id);
        Ok(())
    }
}
