//! Material table (`#EMM`)
//!
//! Usually shipped inside an EMZ envelope, see [`crate::emz`].
//!
//! | Offset | Field        | Description                                              |
//! |--------|--------------|----------------------------------------------------------|
//! | 0x00   | Material ID  | 4 bytes                                                  |
//! | 0x04   | Name         | 32 bytes: ASCII, zero padded                             |
//! | 0x24   | Shader       | 32 bytes: ASCII, zero padded                             |
//! | 0x44   | Param Count  | 4 bytes                                                  |
//! | 0x48   | Param Offset | 4 bytes: relative to the start of the material record    |
//! | 0x4C   | Reserved     | 4 bytes                                                  |
//!
//! Each parameter is 40 bytes: name (32 bytes, ASCII, zero padded), [`ParamKind`] (4 bytes) and
//! the value as a float (4 bytes).

use modkit_bin::table::{OffsetBase, SubLink};
use modkit_bin::{
    EntryReader, EntrySchema, EntryWriter, Installable, StringEncoding, SubEntrySchema, Table,
    TableLayout,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Width of every name field in this format
pub const NAME_WIDTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialEntry {
    pub id: u32,
    pub name: String,
    pub shader: String,
    pub params: Vec<MaterialParam>,
}

/// How the game interprets a parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParamKind {
    Float,
    Int,
    Bool,
    Other(u32),
}

impl From<u32> for ParamKind {
    fn from(value: u32) -> Self {
        match value {
            0 => ParamKind::Float,
            1 => ParamKind::Int,
            2 => ParamKind::Bool,
            other => ParamKind::Other(other),
        }
    }
}

impl From<ParamKind> for u32 {
    fn from(value: ParamKind) -> Self {
        match value {
            ParamKind::Float => 0,
            ParamKind::Int => 1,
            ParamKind::Bool => 2,
            ParamKind::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialParam {
    pub name: String,
    pub kind: ParamKind,
    pub value: f32,
}

/// Material table file
pub type MaterialTable = Table<MaterialEntry>;

impl Installable for MaterialEntry {
    fn sort_id(&self) -> u32 {
        self.id
    }

    fn index(&self) -> String {
        self.name.clone()
    }
}

impl EntrySchema for MaterialEntry {
    const LAYOUT: TableLayout = TableLayout {
        signature: *b"#EMM",
        version: 1,
        entry_size: 0x50,
        sub_entry_size: 0x28,
        sub_link: SubLink::Offset,
        offset_base: OffsetBase::Entry,
        encoding: StringEncoding::Ascii,
    };
    type Sub = MaterialParam;

    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        let id = reader.read_u32()?;
        let name = reader.read_fixed_str(NAME_WIDTH)?;
        let shader = reader.read_fixed_str(NAME_WIDTH)?;
        let params = reader.read_sub_entries()?;
        reader.skip(4)?;
        Ok(Self {
            id,
            name,
            shader,
            params,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_u32(self.id);
        writer.write_fixed_str("name", &self.name, NAME_WIDTH)?;
        writer.write_fixed_str("shader", &self.shader, NAME_WIDTH)?;
        writer.write_sub_link(self.params.len())?;
        writer.write_zeros(4);
        Ok(())
    }

    fn sub_entries(&self) -> &[MaterialParam] {
        &self.params
    }
}

impl SubEntrySchema for MaterialParam {
    fn decode(reader: &mut EntryReader<'_>) -> Result<Self> {
        Ok(Self {
            name: reader.read_fixed_str(NAME_WIDTH)?,
            kind: reader.read_u32()?.into(),
            value: reader.read_f32()?,
        })
    }

    fn encode(&self, writer: &mut EntryWriter<'_>) -> Result<()> {
        writer.write_fixed_str("param name", &self.name, NAME_WIDTH)?;
        writer.write_u32(self.kind.into());
        writer.write_f32(self.value);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{MaterialEntry, MaterialParam, MaterialTable, ParamKind};
    use crate::error::{DataConstraintError, Error, Result};

    fn sample() -> MaterialTable {
        MaterialTable::new(vec![
            MaterialEntry {
                id: 0,
                name: "body".into(),
                shader: "toon_skin".into(),
                params: vec![
                    MaterialParam {
                        name: "MatCol0R".into(),
                        kind: ParamKind::Float,
                        value: 0.5,
                    },
                    MaterialParam {
                        name: "CustomFlag".into(),
                        kind: ParamKind::Other(0x10),
                        value: 1.0,
                    },
                ],
            },
            MaterialEntry {
                id: 1,
                name: "eyes".into(),
                shader: "toon_eye".into(),
                params: vec![],
            },
        ])
    }

    #[traced_test]
    #[test]
    fn entry_relative_params() -> Result<()> {
        let out = sample().encode()?;

        // two 0x50 records end at 0xC0, already aligned
        let param_offset = u32::from_le_bytes([out[0x68], out[0x69], out[0x6A], out[0x6B]]);
        assert_eq!(param_offset, 0xC0 - 0x20);
        assert_eq!(out.len(), 0xC0 + 2 * 0x28);
        assert_eq!(MaterialTable::decode(&out)?, sample());
        Ok(())
    }

    #[test]
    fn name_must_leave_room_for_terminator() {
        let mut table = sample();
        table.entries[0].shader = "s".repeat(32);
        assert!(matches!(
            table.encode().unwrap_err(),
            Error::Constraint(DataConstraintError::StringTooLong {
                field: "shader",
                ..
            })
        ));
    }
}
