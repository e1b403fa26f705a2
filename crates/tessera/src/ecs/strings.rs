//! # Strings — Per-Scene Text Interner
//!
//! Components are `Pod`, so they can't hold a `String`. Text lives here and
//! components store a 4-byte [`StringIndex`] instead.
//!
//! ```text
//! slots:     ["", "Player", <free>, "Goblin"]
//! refcounts: [ -,  2,        0,      1      ]
//! free:      {2}
//! ```
//!
//! - Slot `0` is the permanent empty string. It is never allocated or freed,
//!   so a zeroed `StringIndex` is always a valid "no text" value.
//! - Interning text that is already present returns the existing index and
//!   bumps its reference count.
//! - Releasing the last reference frees the slot. New text goes into the
//!   lowest free slot before the table grows.

use std::collections::{BTreeSet, HashMap};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Index of a string in a scene's [`StringTable`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Debug)]
#[derive(Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct StringIndex(pub u32);

impl StringIndex {
    /// The permanent empty string.
    pub const EMPTY: Self = Self(0);

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[derive(Clone, Debug)]
struct Slot {
    text: String,
    refs: u32,
}

/// Deduplicated, index-addressed text storage owned by a scene.
#[derive(Clone, Debug)]
pub struct StringTable {
    slots: Vec<Option<Slot>>,
    lookup: HashMap<String, u32>,
    free: BTreeSet<u32>,
}

impl StringTable {
    pub fn new() -> Self {
        Self {
            slots: vec![Some(Slot {
                text: String::new(),
                refs: 0,
            })],
            lookup: HashMap::new(),
            free: BTreeSet::new(),
        }
    }

    /// Store `text` and return its index. The empty string is always
    /// [`StringIndex::EMPTY`] and takes no reference.
    pub fn intern(&mut self, text: &str) -> StringIndex {
        if text.is_empty() {
            return StringIndex::EMPTY;
        }
        if let Some(&index) = self.lookup.get(text) {
            if let Some(slot) = self.slots[index as usize].as_mut() {
                slot.refs += 1;
            }
            return StringIndex(index);
        }

        let slot = Some(Slot {
            text: text.to_owned(),
            refs: 1,
        });
        let index = match self.free.pop_first() {
            Some(index) => {
                self.slots[index as usize] = slot;
                index
            }
            None => {
                let index = u32::try_from(self.slots.len())
                    .unwrap_or_else(|_| panic!("string table index space exhausted"));
                self.slots.push(slot);
                index
            }
        };
        self.lookup.insert(text.to_owned(), index);
        StringIndex(index)
    }

    /// Text at `index`. Out-of-range or released indices log a warning and
    /// yield the empty string.
    pub fn get(&self, index: StringIndex) -> &str {
        match self.slots.get(index.0 as usize) {
            Some(Some(slot)) => &slot.text,
            Some(None) => {
                log::warn!("string index {} was released", index.0);
                ""
            }
            None => {
                log::warn!(
                    "string index {} out of bounds (table has {} slots)",
                    index.0,
                    self.slots.len()
                );
                ""
            }
        }
    }

    /// Take another reference to an interned string.
    pub fn retain(&mut self, index: StringIndex) {
        if index.is_empty() {
            return;
        }
        match self.slots.get_mut(index.0 as usize) {
            Some(Some(slot)) => slot.refs += 1,
            _ => log::warn!("cannot retain string index {}: not allocated", index.0),
        }
    }

    /// Drop one reference. The slot is cleared and becomes reusable once no
    /// references remain. Releasing index `0` is rejected.
    pub fn release(&mut self, index: StringIndex) {
        if index.is_empty() {
            log::warn!("refusing to release the reserved empty string (index 0)");
            return;
        }
        let entry = self.slots.get_mut(index.0 as usize);
        let Some(Some(slot)) = entry else {
            log::warn!("cannot release string index {}: not allocated", index.0);
            return;
        };
        slot.refs -= 1;
        if slot.refs == 0 {
            if let Some(slot) = self.slots[index.0 as usize].take() {
                self.lookup.remove(&slot.text);
            }
            self.free.insert(index.0);
        }
    }

    /// Index of `text` if it is interned, without taking a reference.
    pub fn find(&self, text: &str) -> Option<StringIndex> {
        if text.is_empty() {
            return Some(StringIndex::EMPTY);
        }
        self.lookup.get(text).map(|&i| StringIndex(i))
    }

    /// Current reference count of `index` (0 for free or out-of-range slots).
    pub fn ref_count(&self, index: StringIndex) -> u32 {
        match self.slots.get(index.0 as usize) {
            Some(Some(slot)) => slot.refs,
            _ => 0,
        }
    }

    /// Number of slots, including slot 0 and free slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live non-empty strings.
    pub fn len(&self) -> usize {
        self.slots.len() - 1 - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot contents for persistence: `None` marks a free slot.
    pub(crate) fn snapshot(&self) -> Vec<Option<(String, u32)>> {
        self.slots
            .iter()
            .skip(1)
            .map(|slot| slot.as_ref().map(|s| (s.text.clone(), s.refs)))
            .collect()
    }

    /// Rebuild a table from [`snapshot`](Self::snapshot) output, keeping
    /// every index where it was.
    pub(crate) fn restore(entries: Vec<Option<(String, u32)>>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            let index = table.slots.len() as u32;
            match entry {
                Some((text, refs)) if !text.is_empty() && refs > 0 => {
                    table.lookup.insert(text.clone(), index);
                    table.slots.push(Some(Slot { text, refs }));
                }
                _ => {
                    table.slots.push(None);
                    table.free.insert(index);
                }
            }
        }
        table
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_index_zero() {
        let mut table = StringTable::new();
        assert_eq!(table.intern(""), StringIndex::EMPTY);
        assert_eq!(table.get(StringIndex::EMPTY), "");
        assert!(table.is_empty());
    }

    #[test]
    fn intern_and_get() {
        let mut table = StringTable::new();
        let hello = table.intern("hello");
        let world = table.intern("world");
        assert_eq!(hello, StringIndex(1));
        assert_eq!(world, StringIndex(2));
        assert_eq!(table.get(hello), "hello");
        assert_eq!(table.get(world), "world");
    }

    #[test]
    fn duplicate_text_shares_a_slot() {
        let mut table = StringTable::new();
        let a = table.intern("goblin");
        let b = table.intern("goblin");
        assert_eq!(a, b);
        assert_eq!(table.ref_count(a), 2);

        table.release(a);
        assert_eq!(table.get(b), "goblin");
        table.release(b);
        assert_eq!(table.ref_count(a), 0);
        assert_eq!(table.find("goblin"), None);
    }

    #[test]
    fn release_reuses_lowest_free_slot() {
        let mut table = StringTable::new();
        let a = table.intern("a");
        let b = table.intern("b");
        let _c = table.intern("c");
        table.release(b);
        table.release(a);

        assert_eq!(table.intern("d"), a);
        assert_eq!(table.intern("e"), b);
        assert_eq!(table.intern("f"), StringIndex(4));
    }

    #[test]
    fn released_index_reads_empty() {
        let mut table = StringTable::new();
        let k = table.intern("hello");
        table.release(k);
        assert_eq!(table.get(k), "");
    }

    #[test]
    fn out_of_bounds_reads_empty() {
        let table = StringTable::new();
        assert_eq!(table.get(StringIndex(42)), "");
    }

    #[test]
    fn release_zero_is_rejected() {
        let mut table = StringTable::new();
        table.release(StringIndex::EMPTY);
        assert_eq!(table.capacity(), 1);
        assert_eq!(table.intern("x"), StringIndex(1));
    }

    #[test]
    fn double_release_is_harmless() {
        let mut table = StringTable::new();
        let k = table.intern("once");
        table.release(k);
        table.release(k);
        assert_eq!(table.len(), 0);
        assert_eq!(table.intern("twice"), k);
    }

    #[test]
    fn snapshot_restore_keeps_indices() {
        let mut table = StringTable::new();
        let a = table.intern("alpha");
        let b = table.intern("beta");
        table.intern("beta");
        table.release(a);

        let restored = StringTable::restore(table.snapshot());
        assert_eq!(restored.get(b), "beta");
        assert_eq!(restored.ref_count(b), 2);
        assert_eq!(restored.find("alpha"), None);
        assert_eq!(restored.capacity(), table.capacity());
    }
}
