//! Uniform `(SortID, Index)` view over table rows
//!

use std::collections::HashSet;

use crate::error::{DataConstraintError, Result};

/// A table row that can be ordered, merged and removed by the installer
pub trait Installable {
    /// Numeric key the encoder orders entries by
    fn sort_id(&self) -> u32;

    /// Composite string key, unique within its container
    fn index(&self) -> String;
}

/// Stable sort by [`Installable::sort_id`], ascending.
pub fn sort_entries<T: Installable>(entries: &mut [T]) {
    entries.sort_by_key(Installable::sort_id);
}

/// Fill every `SortID` missing from `[0, max]` with `placeholder(sort_id)`.
///
/// Expects `entries` to be sorted already. A highest `SortID` above `limit` is rejected before
/// anything is allocated.
pub fn pad_dense<T: Installable>(
    entries: &mut Vec<T>,
    limit: u32,
    placeholder: impl Fn(u32) -> T,
) -> Result<()> {
    let Some(max) = entries.last().map(Installable::sort_id) else {
        return Ok(());
    };
    if max > limit {
        return Err(DataConstraintError::ValueOutOfRange {
            field: "sort_id",
            value: max.into(),
        }
        .into());
    }

    let missing = (max as usize + 1).saturating_sub(entries.len());
    if missing == 0 && entries.iter().enumerate().all(|(i, e)| e.sort_id() as usize == i) {
        return Ok(());
    }

    let mut padded = Vec::with_capacity(entries.len() + missing);
    let mut next = 0u32;
    for entry in entries.drain(..) {
        while next < entry.sort_id() {
            padded.push(placeholder(next));
            next += 1;
        }
        next = next.max(entry.sort_id().saturating_add(1));
        padded.push(entry);
    }
    *entries = padded;
    Ok(())
}

/// Reject containers where two entries share an index.
pub fn ensure_unique_indices<T: Installable>(entries: &[T]) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        let index = entry.index();
        if !seen.insert(index.clone()) {
            return Err(DataConstraintError::DuplicateIndex(index).into());
        }
    }
    Ok(())
}
