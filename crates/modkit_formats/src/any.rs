//! Engine tables picked by their signature
//!
//! Packages ship table fragments without saying which format they are. [`AnyTable`] reads the
//! signature from the common header and dispatches to the matching codec, so callers can list,
//! merge and remove entries by index without knowing the concrete format.

use derive_more::derive::Display;
use modkit_bin::{EntrySchema, Table};
use tracing::{debug, instrument};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::aura::AuraEntry;
use crate::chara::CharaEntry;
use crate::cue::CueEntry;
use crate::error::{Error, FormatError, Result};
use crate::lookup::BgmLookupEntry;
use crate::material::MaterialEntry;
use crate::message::MessageEntry;
use crate::partner::{Behaviors, Outfits, PartnerEntry, Skills, Stats};

/// One line of a table listing
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Row {
    pub sort_id: u32,
    pub index: String,
}

/// Typed access to the table inside an [`AnyTable`]
pub trait TableVariant: Sized {
    const KIND: TableKind;

    fn from_any(table: &AnyTable) -> Option<&Self>;

    fn from_any_mut(table: &mut AnyTable) -> Option<&mut Self>;

    fn into_any(self) -> AnyTable;
}

fn rows<E: EntrySchema>(table: &Table<E>) -> Vec<Row> {
    table
        .entries
        .iter()
        .map(|e| Row {
            sort_id: e.sort_id(),
            index: e.index(),
        })
        .collect()
}

fn content_indices<E: EntrySchema>(table: &Table<E>) -> Vec<String> {
    table
        .entries
        .iter()
        .filter(|e| !e.is_placeholder())
        .map(|e| e.index())
        .collect()
}

fn merge<E: EntrySchema>(table: &mut Table<E>, other: &Table<E>) -> Vec<String> {
    other
        .entries
        .iter()
        .filter(|entry| !entry.is_placeholder())
        .map(|entry| {
            let index = entry.index();
            table.upsert(entry.clone());
            index
        })
        .collect()
}

fn select<E: EntrySchema>(table: &Table<E>, indices: &[String]) -> Table<E> {
    Table::new(
        table
            .entries
            .iter()
            .filter(|e| indices.contains(&e.index()))
            .cloned()
            .collect(),
    )
}

fn restore<E: EntrySchema>(table: &mut Table<E>, prior: &Table<E>, touched: &[String]) {
    for index in touched {
        match prior.get(index) {
            Some(entry) => {
                table.upsert(entry.clone());
            }
            None => {
                table.remove(index);
            }
        }
    }
}

fn kind_mismatch(expected: TableKind, found: TableKind) -> Error {
    FormatError::InvalidSignature {
        expected: expected.signature_str(),
        found: found.signature_str(),
    }
    .into()
}

macro_rules! any_table {
    ($($variant:ident($entry:ty) => $name:literal;)+) => {
        /// Every engine table format
        #[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub enum TableKind {
            $(
                #[display($name)]
                $variant,
            )+
        }

        impl TableKind {
            pub const ALL: &'static [TableKind] = &[$(TableKind::$variant),+];

            pub fn signature(self) -> [u8; 4] {
                match self {
                    $(TableKind::$variant => <$entry as EntrySchema>::LAYOUT.signature,)+
                }
            }
        }

        /// A decoded engine table of any format
        #[derive(Debug, Clone, PartialEq)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub enum AnyTable {
            $($variant(Table<$entry>),)+
        }

        impl AnyTable {
            pub fn kind(&self) -> TableKind {
                match self {
                    $(AnyTable::$variant(_) => TableKind::$variant,)+
                }
            }

            /// Decode `data` as a table of `kind`.
            pub fn decode_as(kind: TableKind, data: &[u8]) -> Result<Self> {
                Ok(match kind {
                    $(TableKind::$variant => AnyTable::$variant(Table::<$entry>::decode(data)?),)+
                })
            }

            /// Empty table of `kind`
            pub fn empty(kind: TableKind) -> Self {
                match kind {
                    $(TableKind::$variant => AnyTable::$variant(Table::default()),)+
                }
            }

            pub fn encode(&self) -> Result<Vec<u8>> {
                match self {
                    $(AnyTable::$variant(table) => table.encode(),)+
                }
            }

            pub fn len(&self) -> usize {
                match self {
                    $(AnyTable::$variant(table) => table.len(),)+
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Sort id and index of every entry, in the current order
            pub fn rows(&self) -> Vec<Row> {
                match self {
                    $(AnyTable::$variant(table) => rows(table),)+
                }
            }

            /// Indices of the entries that carry data, leaving out gap fillers
            pub fn content_indices(&self) -> Vec<String> {
                match self {
                    $(AnyTable::$variant(table) => content_indices(table),)+
                }
            }

            pub fn contains(&self, index: &str) -> bool {
                match self {
                    $(AnyTable::$variant(table) => table.get(index).is_some(),)+
                }
            }

            pub fn canonicalize(&mut self) -> Result<()> {
                match self {
                    $(AnyTable::$variant(table) => table.canonicalize(),)+
                }
            }

            /// Upsert every entry of `other` by index, skipping gap fillers. Returns the indices
            /// written.
            #[instrument(skip_all, fields(kind = %self.kind()), err)]
            pub fn merge(&mut self, other: &AnyTable) -> Result<Vec<String>> {
                let merged = match (&mut *self, other) {
                    $((AnyTable::$variant(table), AnyTable::$variant(other)) => merge(table, other),)+
                    (this, other) => return Err(kind_mismatch(this.kind(), other.kind())),
                };
                debug!(count = merged.len(), "merged entries");
                Ok(merged)
            }

            /// Remove the entry with `index`, returns whether there was one.
            pub fn remove_index(&mut self, index: &str) -> bool {
                match self {
                    $(AnyTable::$variant(table) => table.remove(index).is_some(),)+
                }
            }

            /// Copy of the entries with the given indices, in the same format
            pub fn select(&self, indices: &[String]) -> AnyTable {
                match self {
                    $(AnyTable::$variant(table) => AnyTable::$variant(select(table, indices)),)+
                }
            }

            /// Put the `touched` indices back to their state in `prior`. Indices missing from
            /// `prior` are removed.
            pub fn restore(&mut self, prior: &AnyTable, touched: &[String]) -> Result<()> {
                match (&mut *self, prior) {
                    $((AnyTable::$variant(table), AnyTable::$variant(prior)) => {
                        restore(table, prior, touched);
                        Ok(())
                    })+
                    (this, prior) => Err(kind_mismatch(this.kind(), prior.kind())),
                }
            }
        }

        $(
            impl TableVariant for Table<$entry> {
                const KIND: TableKind = TableKind::$variant;

                fn from_any(table: &AnyTable) -> Option<&Self> {
                    match table {
                        AnyTable::$variant(table) => Some(table),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn from_any_mut(table: &mut AnyTable) -> Option<&mut Self> {
                    match table {
                        AnyTable::$variant(table) => Some(table),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn into_any(self) -> AnyTable {
                    AnyTable::$variant(self)
                }
            }

            impl From<Table<$entry>> for AnyTable {
                fn from(table: Table<$entry>) -> Self {
                    AnyTable::$variant(table)
                }
            }
        )+
    };
}

any_table! {
    Aura(AuraEntry) => "aura";
    Chara(CharaEntry) => "chara";
    Message(MessageEntry) => "message";
    Cue(CueEntry) => "cue";
    BgmLookup(BgmLookupEntry) => "bgm lookup";
    PartnerSkill(PartnerEntry<Skills>) => "partner skills";
    PartnerStat(PartnerEntry<Stats>) => "partner stats";
    PartnerOutfit(PartnerEntry<Outfits>) => "partner outfits";
    PartnerAi(PartnerEntry<Behaviors>) => "partner ai";
    Material(MaterialEntry) => "material";
}

impl TableKind {
    pub fn signature_str(self) -> String {
        String::from_utf8_lossy(&self.signature()).into_owned()
    }

    /// Format of an engine table, from the first four bytes
    pub fn sniff(data: &[u8]) -> Result<Self> {
        let signature = data.get(..4).ok_or(Error::UnexpectedEof {
            offset: 0,
            needed: 4,
            available: data.len(),
        })?;

        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.signature() == signature)
            .ok_or_else(|| {
                FormatError::UnknownPayload {
                    found: String::from_utf8_lossy(signature).into_owned(),
                    expected: Self::ALL
                        .iter()
                        .map(|kind| kind.signature_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                }
                .into()
            })
    }
}

impl AnyTable {
    /// Decode a table of whichever format `data` declares.
    #[instrument(skip_all, err)]
    pub fn decode(data: &[u8]) -> Result<Self> {
        let kind = TableKind::sniff(data)?;
        debug!(%kind, "sniffed table");
        Self::decode_as(kind, data)
    }

    pub fn downcast_ref<T: TableVariant>(&self) -> Option<&T> {
        T::from_any(self)
    }

    pub fn downcast_mut<T: TableVariant>(&mut self) -> Option<&mut T> {
        T::from_any_mut(self)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{AnyTable, Row, TableKind};
    use crate::aura::{AuraEffect, AuraEntry, AuraFlags, AuraTable};
    use crate::cue::{CueEntry, CueTable};
    use crate::error::{Error, FormatError, Result};
    use crate::partner::{PartnerEntry, PartnerStatTable, StatGrowth};

    #[traced_test]
    #[test]
    fn sniff_and_list() -> Result<()> {
        let bytes = CueTable::new(vec![
            CueEntry::stream(501, "b"),
            CueEntry::stream(500, "a"),
        ])
        .encode()?;

        let table = AnyTable::decode(&bytes)?;
        assert_eq!(table.kind(), TableKind::Cue);
        assert_eq!(table.kind().to_string(), "cue");
        assert_eq!(
            table.rows(),
            vec![
                Row {
                    sort_id: 500,
                    index: "500".into()
                },
                Row {
                    sort_id: 501,
                    index: "501".into()
                },
            ]
        );
        assert_eq!(table.encode()?, bytes);
        Ok(())
    }

    #[test]
    fn merge_select_restore() -> Result<()> {
        let mut target: AnyTable = CueTable::new(vec![CueEntry::stream(500, "title")]).into();
        let prior = target.select(&["500".to_string(), "600".to_string()]);

        let fragment: AnyTable = CueTable::new(vec![
            CueEntry::stream(500, "replaced"),
            CueEntry::stream(600, "new"),
        ])
        .into();
        let touched = target.merge(&fragment)?;
        assert_eq!(touched, vec!["500".to_string(), "600".to_string()]);
        assert_eq!(target.len(), 2);

        target.restore(&prior, &touched)?;
        let cues = target.downcast_ref::<CueTable>().map(|t| t.entries.clone());
        assert_eq!(cues, Some(vec![CueEntry::stream(500, "title")]));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn merge_skips_aura_padding() -> Result<()> {
        let glare = |id| AuraEntry {
            id,
            flags: AuraFlags::GLARE,
            effects: vec![AuraEffect {
                kind: 1,
                effect_id: 40,
            }],
        };
        let mut target: AnyTable = AuraTable::new(vec![glare(0), glare(1), glare(2)]).into();

        // the encoded fragment carries empty auras 0 to 2 in front of the real one
        let fragment = AnyTable::decode(&AuraTable::new(vec![glare(3)]).encode()?)?;
        assert_eq!(fragment.len(), 4);
        assert_eq!(fragment.content_indices(), vec!["3".to_string()]);

        let touched = target.merge(&fragment)?;
        assert_eq!(touched, vec!["3".to_string()]);
        let auras = target.downcast_ref::<AuraTable>().map(|t| t.entries.clone());
        assert_eq!(auras, Some(vec![glare(0), glare(1), glare(2), glare(3)]));
        Ok(())
    }

    #[test]
    fn merge_rejects_other_formats() {
        let mut cues: AnyTable = CueTable::default().into();
        let stats: AnyTable = PartnerStatTable::new(vec![PartnerEntry::new(
            1,
            0,
            vec![StatGrowth {
                stat: 0,
                rank: 1,
                value: 10,
            }],
        )])
        .into();

        assert!(matches!(
            cues.merge(&stats).unwrap_err(),
            Error::Format(FormatError::InvalidSignature { .. })
        ));
        assert!(cues.downcast_ref::<PartnerStatTable>().is_none());
    }

    #[test]
    fn unknown_signature() {
        assert!(matches!(
            TableKind::sniff(b"#ZZZ").unwrap_err(),
            Error::Format(FormatError::UnknownPayload { .. })
        ));
    }
}
