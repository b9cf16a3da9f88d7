//! Message table (`#MSG`)
//!
//! | Offset | Field   | Description                                              |
//! |--------|---------|----------------------------------------------------------|
//! | 0x00   | ID      | 4 bytes                                                  |
//! | 0x04   | Name    | 4 bytes: pointer to an ASCII key, relative to the entry  |
//! | 0x08   | Text    | 4 bytes: pointer to UTF-16 text, relative to the entry   |
//!
//! Entries are looked up by name. Names built from a prefix and a numeric id, such as
//! `BGM_NAME_502`, tie a message to a record in another table.

use modkit_bin::table::{NoSubEntries, OffsetBase, SubLink};
use modkit_bin::{
    EntryReader, EntrySchema, EntryWriter, Installable, StringEncoding, Table, TableLayout,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One localized message
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MessageEntry {
    pub id: u32,
    pub name: String,
    pub text: Option<String>,
}

/// Message table file
pub type MessageTable = Table<MessageEntry>;

impl Installable for MessageEntry {
    fn sort_id(&self) -> u32 {
        self.id
    }

    fn index(&self) -> String {
        self.name.clone()
    }
}

impl EntrySchema for MessageEntry {
    const LAYOUT: TableLayout = TableLayout {
        signature: *b"#MSG",
        version: 1,
        entry_size: 0x0C,
        sub_entry_size: 0,
        sub_link: SubLink::None,
        offset_base: OffsetBase::Entry,
        encoding: StringEncoding::Ascii,
    };
    type Sub = NoSubEntries;

    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        Ok(Self {
            id: reader.read_u32()?,
            name: reader.read_string()?.unwrap_or_default(),
            text: reader.read_string_as(StringEncoding::Utf16)?,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_u32(self.id);
        writer.write_string("name", Some(self.name.as_str()))?;
        writer.write_string_as("text", self.text.as_deref(), StringEncoding::Utf16)
    }
}

/// Name of the message bound to `id` under `prefix`
pub fn keyed_name(prefix: &str, id: u32) -> String {
    format!("{prefix}{id}")
}

/// Message table helpers for names derived from numeric ids
pub trait MessageTableExt {
    /// Whether a message named `{prefix}{id}` exists
    fn contains_keyed(&self, prefix: &str, id: u32) -> bool;

    /// Insert or replace the message `{prefix}{id}`, assigning the next free message id.
    fn upsert_keyed(&mut self, prefix: &str, id: u32, text: &str) -> Option<MessageEntry>;
}

impl MessageTableExt for MessageTable {
    fn contains_keyed(&self, prefix: &str, id: u32) -> bool {
        self.get(&keyed_name(prefix, id)).is_some()
    }

    fn upsert_keyed(&mut self, prefix: &str, id: u32, text: &str) -> Option<MessageEntry> {
        let name = keyed_name(prefix, id);
        let message_id = match self.get(&name) {
            Some(existing) => existing.id,
            None => self
                .entries
                .iter()
                .map(|e| e.id.saturating_add(1))
                .max()
                .unwrap_or_default(),
        };

        self.upsert(MessageEntry {
            id: message_id,
            name,
            text: Some(text.to_string()),
        })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::{assert_eq, assert_str_eq};
    use tracing_test::traced_test;

    use super::{MessageEntry, MessageTable, MessageTableExt};
    use crate::error::Result;

    #[traced_test]
    #[test]
    fn mixed_encodings() -> Result<()> {
        let table = MessageTable::new(vec![MessageEntry {
            id: 0,
            name: "A".into(),
            text: Some("Hi".into()),
        }]);
        let out = table.encode()?;

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            b'#', b'M', b'S', b'G', 0xFE, 0xFF, 0x20, 0x00,
            0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x0C, 0x00, 0x00, 0x00,
            0x0E, 0x00, 0x00, 0x00,
            b'A', 0x00,
            b'H', 0x00, b'i', 0x00, 0x00, 0x00,
        ];
        assert_str_eq!(format!("{:02X?}", out), format!("{:02X?}", expected));
        assert_eq!(MessageTable::decode(&out)?, table);
        Ok(())
    }

    #[test]
    fn keyed_messages() {
        let mut table = MessageTable::new(vec![MessageEntry {
            id: 4,
            name: "BGM_NAME_500".into(),
            text: Some("Opening".into()),
        }]);

        assert!(table.contains_keyed("BGM_NAME_", 500));
        assert!(!table.contains_keyed("BGM_NAME_", 501));

        assert!(table.upsert_keyed("BGM_NAME_", 501, "Custom").is_none());
        let added = table.get("BGM_NAME_501").map(|e| e.id);
        assert_eq!(added, Some(5));
    }
}
