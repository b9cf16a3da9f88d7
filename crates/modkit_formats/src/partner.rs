//! Partner tables (`#PSK`, `#PST`, `#POF`, `#PAI`)
//!
//! Four files describe partner characters in two levels. They share the same entry record and
//! differ only in the signature, the version and the layout of their sub entries.
//!
//! | Offset | Field          | Description                                                  |
//! |--------|----------------|--------------------------------------------------------------|
//! | 0x00   | Partner ID     | 4 bytes                                                      |
//! | 0x04   | Costume        | 2 bytes                                                      |
//! | 0x06   | Flags          | 2 bytes: [`PartnerFlags`]                                    |
//! | 0x08   | Sub Count      | 4 bytes                                                      |
//! | 0x0C   | Current Index  | 4 bytes: index of the first sub entry in the sub section     |
//!
//! | File   | Sub entry         | Size |
//! |--------|-------------------|------|
//! | `#PSK` | [`SkillSlot`]     | 8    |
//! | `#PST` | [`StatGrowth`]    | 8    |
//! | `#POF` | [`OutfitPart`]    | 12   |
//! | `#PAI` | [`AiBehavior`]    | 4    |

use bitflags::bitflags;
use modkit_bin::table::{OffsetBase, SubLink};
use modkit_bin::{
    EntryReader, EntrySchema, EntryWriter, Installable, StringEncoding, SubEntrySchema, Table,
    TableLayout,
};
use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct PartnerFlags: u16 {
        /// Available before story completion
        const UNLOCKED = 0x1;
        /// Can be picked as the second partner
        const SECONDARY = 0x2;
        /// Only appears in online modes
        const ONLINE_ONLY = 0x4;
    }
}

/// What makes one partner file different from the others
pub trait PartnerKind: Clone + Debug + PartialEq + 'static {
    const SIGNATURE: [u8; 4];
    const VERSION: u32;
    const SUB_ENTRY_SIZE: usize;

    type Sub: SubEntrySchema + Clone + Debug + PartialEq;
}

/// One partner costume with its sub entries
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "S::Sub: Serialize",
        deserialize = "S::Sub: Deserialize<'de>"
    ))
)]
pub struct PartnerEntry<S: PartnerKind> {
    pub partner_id: u32,
    pub costume: u16,
    pub flags: PartnerFlags,
    pub subs: Vec<S::Sub>,
}

impl<S: PartnerKind> PartnerEntry<S> {
    pub fn new(partner_id: u32, costume: u16, subs: Vec<S::Sub>) -> Self {
        Self {
            partner_id,
            costume,
            flags: PartnerFlags::empty(),
            subs,
        }
    }
}

impl<S: PartnerKind> Installable for PartnerEntry<S> {
    fn sort_id(&self) -> u32 {
        self.partner_id
    }

    fn index(&self) -> String {
        format!("{}_{}", self.partner_id, self.costume)
    }
}

impl<S: PartnerKind> EntrySchema for PartnerEntry<S> {
    const LAYOUT: TableLayout = TableLayout {
        signature: S::SIGNATURE,
        version: S::VERSION,
        entry_size: 0x10,
        sub_entry_size: S::SUB_ENTRY_SIZE,
        sub_link: SubLink::Index,
        offset_base: OffsetBase::Section,
        encoding: StringEncoding::Ascii,
    };
    type Sub = S::Sub;

    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        Ok(Self {
            partner_id: reader.read_u32()?,
            costume: reader.read_u16()?,
            flags: PartnerFlags::from_bits_retain(reader.read_u16()?),
            subs: reader.read_sub_entries()?,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_u32(self.partner_id);
        writer.write_u16(self.costume);
        writer.write_u16(self.flags.bits());
        writer.write_sub_link(self.subs.len())
    }

    fn sub_entries(&self) -> &[S::Sub] {
        &self.subs
    }
}

macro_rules! partner_kind {
    ($(#[$meta:meta])* $name:ident, $signature:literal, $version:literal, $size:literal, $sub:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name;

        impl PartnerKind for $name {
            const SIGNATURE: [u8; 4] = *$signature;
            const VERSION: u32 = $version;
            const SUB_ENTRY_SIZE: usize = $size;
            type Sub = $sub;
        }
    };
}

partner_kind!(
    /// Skill loadout, `#PSK`
    Skills, b"#PSK", 1, 8, SkillSlot
);
partner_kind!(
    /// Stat growth, `#PST`
    Stats, b"#PST", 1, 8, StatGrowth
);
partner_kind!(
    /// Outfit parts, `#POF`
    Outfits, b"#POF", 2, 12, OutfitPart
);
partner_kind!(
    /// AI behaviours, `#PAI`
    Behaviors, b"#PAI", 3, 4, AiBehavior
);

pub type PartnerSkillTable = Table<PartnerEntry<Skills>>;
pub type PartnerStatTable = Table<PartnerEntry<Stats>>;
pub type PartnerOutfitTable = Table<PartnerEntry<Outfits>>;
pub type PartnerAiTable = Table<PartnerEntry<Behaviors>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SkillSlot {
    pub skill_id: u32,
    pub level: u16,
    pub slot: u16,
}

impl SubEntrySchema for SkillSlot {
    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        Ok(Self {
            skill_id: reader.read_u32()?,
            level: reader.read_u16()?,
            slot: reader.read_u16()?,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_u32(self.skill_id);
        writer.write_u16(self.level);
        writer.write_u16(self.slot);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatGrowth {
    pub stat: u16,
    pub rank: u16,
    pub value: i32,
}

impl SubEntrySchema for StatGrowth {
    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        Ok(Self {
            stat: reader.read_u16()?,
            rank: reader.read_u16()?,
            value: reader.read_i32()?,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_u16(self.stat);
        writer.write_u16(self.rank);
        writer.write_i32(self.value);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OutfitPart {
    pub part: u32,
    pub model_id: u32,
    /// packed RGBA
    pub color: u32,
}

impl SubEntrySchema for OutfitPart {
    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        Ok(Self {
            part: reader.read_u32()?,
            model_id: reader.read_u32()?,
            color: reader.read_u32()?,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_u32(self.part);
        writer.write_u32(self.model_id);
        writer.write_u32(self.color);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AiBehavior {
    pub behavior_id: u32,
}

impl SubEntrySchema for AiBehavior {
    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        Ok(Self {
            behavior_id: reader.read_u32()?,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_u32(self.behavior_id);
        Ok(())
    }
}
