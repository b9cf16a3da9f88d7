//! Audio cue table (`#CUE`)
//!
//! | Offset | Field   | Description                                         |
//! |--------|---------|-----------------------------------------------------|
//! | 0x00   | Cue ID  | 4 bytes                                             |
//! | 0x04   | Name    | 4 bytes: file offset of a UTF-8 name                |
//! | 0x08   | Track   | 4 bytes: index of the stream inside the sound bank  |
//! | 0x0C   | Volume  | 4 bytes: float, `1.0` is unchanged                  |

use modkit_bin::table::{NoSubEntries, OffsetBase, SubLink};
use modkit_bin::{
    EntryReader, EntrySchema, EntryWriter, Installable, StringEncoding, Table, TableLayout,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CueEntry {
    pub cue_id: u32,
    pub name: Option<String>,
    pub track: u32,
    pub volume: f32,
}

impl CueEntry {
    /// Cue for a standalone stream at full volume
    pub fn stream(cue_id: u32, name: impl Into<String>) -> Self {
        Self {
            cue_id,
            name: Some(name.into()),
            track: 0,
            volume: 1.0,
        }
    }
}

/// Cue table file
pub type CueTable = Table<CueEntry>;

impl Installable for CueEntry {
    fn sort_id(&self) -> u32 {
        self.cue_id
    }

    fn index(&self) -> String {
        self.cue_id.to_string()
    }
}

impl EntrySchema for CueEntry {
    const LAYOUT: TableLayout = TableLayout {
        signature: *b"#CUE",
        version: 2,
        entry_size: 0x10,
        sub_entry_size: 0,
        sub_link: SubLink::None,
        offset_base: OffsetBase::File,
        encoding: StringEncoding::Utf8,
    };
    type Sub = NoSubEntries;

    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        Ok(Self {
            cue_id: reader.read_u32()?,
            name: reader.read_string()?,
            track: reader.read_u32()?,
            volume: reader.read_f32()?,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_u32(self.cue_id);
        writer.write_string("name", self.name.as_deref())?;
        writer.write_u32(self.track);
        writer.write_f32(self.volume);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{CueEntry, CueTable};
    use crate::error::Result;

    #[traced_test]
    #[test]
    fn file_relative_names() -> Result<()> {
        let table = CueTable::new(vec![
            CueEntry::stream(501, "battle_β"),
            CueEntry::stream(500, "title"),
        ]);
        let out = table.encode()?;

        // two records end at 0x40, names follow in record order
        assert_eq!(&out[0x24..0x28], &[0x40, 0x00, 0x00, 0x00]);
        assert_eq!(&out[0x34..0x38], &[0x46, 0x00, 0x00, 0x00]);
        assert_eq!(&out[0x40..0x46], b"title\0");

        let decoded = CueTable::decode(&out)?;
        assert_eq!(decoded.entries[1].name.as_deref(), Some("battle_β"));
        assert_eq!(decoded.entries[1].volume, 1.0);
        Ok(())
    }
}
