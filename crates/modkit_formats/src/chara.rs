//! Character list (`#CMS`)
//!
//! | Offset | Field       | Description                                             |
//! |--------|-------------|---------------------------------------------------------|
//! | 0x00   | Chara ID    | 4 bytes                                                 |
//! | 0x04   | Short Name  | 4 bytes: up to 3 ASCII characters, zero padded          |
//! | 0x08   | DLC Flags   | 4 bytes: [`DlcFlags`]                                   |
//! | 0x0C   | Model Path  | 4 bytes: pointer relative to the start of the table     |

use bitflags::bitflags;
use modkit_bin::table::{NoSubEntries, OffsetBase, SubLink};
use modkit_bin::{
    EntryReader, EntrySchema, EntryWriter, Installable, StringEncoding, Table, TableLayout,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Width of the short name field, including its terminator
pub const SHORT_NAME_WIDTH: usize = 4;

bitflags! {
    /// Content packs a character requires
    ///
    /// A character with no flags set ships with the base game. With one or more flags set the
    /// character is only selectable when every listed pack is installed.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct DlcFlags: u32 {
        /// Pre-order bonus pack
        const PREORDER = 0x1;
        /// Extra pack 1
        const EXTRA_PACK_1 = 0x2;
        /// Extra pack 2
        const EXTRA_PACK_2 = 0x4;
        /// Extra pack 3
        const EXTRA_PACK_3 = 0x8;
        /// Free update content, owned by everyone once patched
        const FREE_UPDATE = 0x10;
        /// Season pass
        const SEASON_PASS = 0x20;
    }
}

impl DlcFlags {
    /// Whether the character ships with the base game
    pub fn is_base_game(self) -> bool {
        self.is_empty()
    }
}

/// One selectable character
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CharaEntry {
    pub id: u32,

    /// Three letter code used in asset paths, e.g. `GOK`
    pub short_name: String,

    pub dlc: DlcFlags,
    pub model_path: Option<String>,
}

/// Character list file
pub type CharaTable = Table<CharaEntry>;

impl Installable for CharaEntry {
    fn sort_id(&self) -> u32 {
        self.id
    }

    fn index(&self) -> String {
        self.id.to_string()
    }
}

impl EntrySchema for CharaEntry {
    const LAYOUT: TableLayout = TableLayout {
        signature: *b"#CMS",
        version: 1,
        entry_size: 0x10,
        sub_entry_size: 0,
        sub_link: SubLink::None,
        offset_base: OffsetBase::Section,
        encoding: StringEncoding::Ascii,
    };
    type Sub = NoSubEntries;

    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        Ok(Self {
            id: reader.read_u32()?,
            short_name: reader.read_fixed_str(SHORT_NAME_WIDTH)?,
            dlc: DlcFlags::from_bits_retain(reader.read_u32()?),
            model_path: reader.read_string()?,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_u32(self.id);
        writer.write_fixed_str("short_name", &self.short_name, SHORT_NAME_WIDTH)?;
        writer.write_u32(self.dlc.bits());
        writer.write_string("model_path", self.model_path.as_deref())
    }
}
