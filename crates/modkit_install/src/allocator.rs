//! Free id search across the tables that reference an id
//!
//! A new music track needs one cue id that is unused in the cue table, in the BGM lookup table and
//! in every locale's message table. The search walks upward from the floor, so the result only
//! depends on the tables' contents.

use modkit_formats::cue::CueTable;
use modkit_formats::lookup::{BgmLookupExt, BgmLookupTable};
use modkit_formats::message::{MessageTable, MessageTableExt};
use std::collections::BTreeSet;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// A table that may already use an id
pub trait IdRegistry {
    fn name(&self) -> &'static str;

    fn contains_id(&self, id: u32) -> bool;
}

impl IdRegistry for CueTable {
    fn name(&self) -> &'static str {
        "cue table"
    }

    fn contains_id(&self, id: u32) -> bool {
        self.contains_sort_id(id)
    }
}

impl IdRegistry for BgmLookupTable {
    fn name(&self) -> &'static str {
        "bgm lookup"
    }

    fn contains_id(&self, id: u32) -> bool {
        self.references_cue(id)
    }
}

/// Message names built from a prefix and the id
#[derive(Debug, Clone, Copy)]
pub struct KeyedMessages<'a> {
    pub table: &'a MessageTable,
    pub prefix: &'a str,
}

impl IdRegistry for KeyedMessages<'_> {
    fn name(&self) -> &'static str {
        "message names"
    }

    fn contains_id(&self, id: u32) -> bool {
        self.table.contains_keyed(self.prefix, id)
    }
}

#[derive(Debug, Clone)]
pub struct IdAllocator {
    floor: u32,
    ceiling: u32,
    reserved: BTreeSet<u32>,
}

impl IdAllocator {
    /// Allocator for ids in `floor..=ceiling`
    pub fn new(floor: u32, ceiling: u32) -> Self {
        Self {
            floor,
            ceiling,
            reserved: BTreeSet::new(),
        }
    }

    /// Ids handed out by this allocator
    pub fn reserved(&self) -> impl Iterator<Item = u32> + '_ {
        self.reserved.iter().copied()
    }

    /// First id no registry uses and this allocator has not handed out yet
    pub fn next_free(&self, registries: &[&dyn IdRegistry]) -> Result<u32> {
        (self.floor..=self.ceiling)
            .find(|id| {
                if self.reserved.contains(id) {
                    return false;
                }
                match registries.iter().find(|r| r.contains_id(*id)) {
                    Some(registry) => {
                        trace!(id, registry = registry.name(), "id in use");
                        false
                    }
                    None => true,
                }
            })
            .ok_or(Error::IdSpaceExhausted {
                floor: self.floor,
                ceiling: self.ceiling,
            })
    }

    /// Take the next free id. The caller inserts its records right away.
    pub fn allocate(&mut self, registries: &[&dyn IdRegistry]) -> Result<u32> {
        let id = self.next_free(registries)?;
        self.reserved.insert(id);
        debug!(id, "allocated id");
        Ok(id)
    }
}

#[cfg(test)]
mod test {
    use modkit_formats::cue::{CueEntry, CueTable};
    use modkit_formats::lookup::{BgmLookupEntry, BgmLookupTable};
    use modkit_formats::message::{MessageEntry, MessageTable};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{IdAllocator, IdRegistry, KeyedMessages};
    use crate::error::{Error, Result};

    #[traced_test]
    #[test]
    fn next_after_cue_ids() -> Result<()> {
        let cues = CueTable::new(vec![
            CueEntry::stream(500, "title"),
            CueEntry::stream(501, "battle"),
        ]);
        let lookup = BgmLookupTable::default();
        let messages = MessageTable::default();
        let keyed = KeyedMessages {
            table: &messages,
            prefix: "BGM_NAME_",
        };
        let registries: [&dyn IdRegistry; 3] = [&cues, &lookup, &keyed];

        assert!(registries.iter().all(|r| !r.contains_id(502)));

        let mut allocator = IdAllocator::new(500, 9999);
        assert_eq!(allocator.allocate(&registries)?, 502);
        // reserved even before any record is inserted
        assert_eq!(allocator.allocate(&registries)?, 503);
        Ok(())
    }

    #[test]
    fn every_registry_is_consulted() -> Result<()> {
        let cues = CueTable::default();
        let lookup = BgmLookupTable::new(vec![BgmLookupEntry {
            slot: 0,
            cue_id: 500,
            name: None,
        }]);
        let messages = MessageTable::new(vec![MessageEntry {
            id: 0,
            name: "BGM_NAME_501".into(),
            text: None,
        }]);
        let keyed = KeyedMessages {
            table: &messages,
            prefix: "BGM_NAME_",
        };

        let allocator = IdAllocator::new(500, 9999);
        assert_eq!(allocator.next_free(&[&cues, &lookup, &keyed])?, 502);
        Ok(())
    }

    #[test]
    fn exhausted() {
        let cues = CueTable::new(vec![CueEntry::stream(1, "a"), CueEntry::stream(2, "b")]);
        let allocator = IdAllocator::new(1, 2);
        assert!(matches!(
            allocator.next_free(&[&cues]),
            Err(Error::IdSpaceExhausted {
                floor: 1,
                ceiling: 2
            })
        ));
    }
}
