//! # Directories — Where Things Live
//!
//! Two lookup tables sit beside the archetype storage:
//!
//! ```text
//! EntityDirectory     entity index → { entity, archetype, row }
//! ComponentDirectory  component key → { archetype → column }
//! ```
//!
//! The entity directory gives O(1) component access for a handle. The
//! component directory answers "which archetypes hold `Position`, and in
//! which column" without scanning every archetype's key list. Entries for
//! an archetype are written once when it is created and never change.

use std::collections::{BTreeMap, HashMap};

use super::archetype::{Archetype, ArchetypeId};
use super::entity::EntityId;

/// Storage location of one live entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityRecord {
    /// The handle as currently stored, flags included.
    pub entity: EntityId,
    pub archetype: ArchetypeId,
    pub row: usize,
}

/// Live entity index → [`EntityRecord`].
///
/// Keyed by the 32-bit index only; [`get`](Self::get) checks the generation
/// so a stale handle never resolves to whoever reused its slot.
#[derive(Default, Debug)]
pub struct EntityDirectory {
    records: HashMap<u32, EntityRecord>,
}

impl EntityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Location of `entity`, or `None` if it is not alive. Flag bits on the
    /// handle are ignored.
    pub fn get(&self, entity: EntityId) -> Option<EntityRecord> {
        self.records
            .get(&entity.index())
            .filter(|record| record.entity.same_entity(entity))
            .copied()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.get(entity).is_some()
    }

    /// `true` if any live entity occupies slot `index`, whatever its
    /// generation.
    pub(crate) fn contains_index(&self, index: u32) -> bool {
        self.records.contains_key(&index)
    }

    pub(crate) fn insert(&mut self, entity: EntityId, archetype: ArchetypeId, row: usize) {
        let previous = self.records.insert(
            entity.index(),
            EntityRecord {
                entity,
                archetype,
                row,
            },
        );
        assert!(
            previous.is_none_or(|p| p.entity.same_entity(entity)),
            "entity index {} already owned by {:?}",
            entity.index(),
            previous.map(|p| p.entity)
        );
    }

    pub(crate) fn remove(&mut self, entity: EntityId) -> Option<EntityRecord> {
        self.get(entity)?;
        self.records.remove(&entity.index())
    }

    /// Point an entity at a new row, after a swap-and-pop moved it.
    pub(crate) fn set_row(&mut self, entity: EntityId, row: usize) {
        match self.records.get_mut(&entity.index()) {
            Some(record) if record.entity.same_entity(entity) => record.row = row,
            _ => panic!("moved entity {entity:?} has no directory record"),
        }
    }

    /// Replace the stored handle (flag changes).
    pub(crate) fn set_entity(&mut self, entity: EntityId) {
        match self.records.get_mut(&entity.index()) {
            Some(record) if record.entity.same_entity(entity) => record.entity = entity,
            _ => panic!("entity {entity:?} has no directory record"),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.values()
    }
}

/// Component key → (archetype → column index).
///
/// The inner map is ordered by [`ArchetypeId`], i.e. creation order, which
/// gives queries a deterministic archetype order.
#[derive(Default, Debug)]
pub struct ComponentDirectory {
    entries: HashMap<&'static str, BTreeMap<ArchetypeId, usize>>,
}

impl ComponentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every column of a freshly created archetype.
    pub(crate) fn register_archetype(&mut self, archetype: &Archetype) {
        for (column, &key) in archetype.key().iter().enumerate() {
            let previous = self
                .entries
                .entry(key)
                .or_default()
                .insert(archetype.id(), column);
            assert!(
                previous.is_none(),
                "{:?} registered twice for `{key}`",
                archetype.id()
            );
        }
    }

    /// Column of `key` inside `archetype`, if that archetype has it.
    pub fn column_of(&self, archetype: ArchetypeId, key: &str) -> Option<usize> {
        self.entries.get(key)?.get(&archetype).copied()
    }

    /// Archetypes that have a `key` column, in creation order.
    pub fn archetypes_containing(&self, key: &str) -> impl Iterator<Item = ArchetypeId> + '_ {
        self.entries
            .get(key)
            .into_iter()
            .flat_map(|archetypes| archetypes.keys().copied())
    }

    /// Number of archetypes with a `key` column.
    pub fn archetype_count(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, BTreeMap::len)
    }

    /// `true` once any archetype with a `key` column exists.
    pub fn knows(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}
