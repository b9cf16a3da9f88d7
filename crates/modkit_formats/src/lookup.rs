//! Background music lookup (`#LUT`)
//!
//! Maps the slots the game's jukebox knows about to cue ids.
//!
//! | Offset | Field   | Description                                          |
//! |--------|---------|------------------------------------------------------|
//! | 0x00   | Slot    | 4 bytes                                              |
//! | 0x04   | Cue ID  | 4 bytes: id in the cue table                         |
//! | 0x08   | Name    | 4 bytes: ASCII name, relative to the start of table  |

use modkit_bin::table::{NoSubEntries, OffsetBase, SubLink};
use modkit_bin::{
    EntryReader, EntrySchema, EntryWriter, Installable, StringEncoding, Table, TableLayout,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BgmLookupEntry {
    pub slot: u32,
    pub cue_id: u32,
    pub name: Option<String>,
}

/// Lookup file
pub type BgmLookupTable = Table<BgmLookupEntry>;

/// Lookup table helpers
pub trait BgmLookupExt {
    /// Whether any slot plays `cue_id`
    fn references_cue(&self, cue_id: u32) -> bool;

    /// First slot after the highest one in use
    fn next_slot(&self) -> u32;
}

impl BgmLookupExt for BgmLookupTable {
    fn references_cue(&self, cue_id: u32) -> bool {
        self.entries.iter().any(|e| e.cue_id == cue_id)
    }

    fn next_slot(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.slot.saturating_add(1))
            .max()
            .unwrap_or_default()
    }
}

impl Installable for BgmLookupEntry {
    fn sort_id(&self) -> u32 {
        self.slot
    }

    fn index(&self) -> String {
        self.slot.to_string()
    }
}

impl EntrySchema for BgmLookupEntry {
    const LAYOUT: TableLayout = TableLayout {
        signature: *b"#LUT",
        version: 1,
        entry_size: 0x0C,
        sub_entry_size: 0,
        sub_link: SubLink::None,
        offset_base: OffsetBase::Section,
        encoding: StringEncoding::Ascii,
    };
    type Sub = NoSubEntries;

    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        Ok(Self {
            slot: reader.read_u32()?,
            cue_id: reader.read_u32()?,
            name: reader.read_string()?,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_u32(self.slot);
        writer.write_u32(self.cue_id);
        writer.write_string("name", self.name.as_deref())
    }
}
