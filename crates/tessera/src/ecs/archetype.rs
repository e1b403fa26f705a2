//! # Archetype — One Table per Component Set
//!
//! Every entity with exactly the same set of component keys lives in the same
//! archetype. The table keeps one column of blobs per component, in canonical
//! (sorted key) order, plus a parallel `entities` list.
//!
//! ```text
//! Archetype #2 { key: ["Name", "Position"] }
//!
//! columns[0] Name:     [n0, n1, n2]
//! columns[1] Position: [p0, p1, p2]
//! entities:            [e0, e1, e2]    ← entities[row] owns columns[*][row]
//! ```
//!
//! Rows are removed with swap-and-pop: the last row moves into the hole and
//! the caller is told which entity moved so it can retarget that entity's
//! directory record. Archetypes are never destroyed; an emptied table stays
//! around for the next entity with the same component set.

use std::fmt;

use super::component::{ComponentData, ComponentDescriptor};
use super::entity::EntityId;

/// Sorted, deduplicated component keys. Two entities with the same set of
/// components always produce the same key.
pub type ArchetypeKey = Vec<&'static str>;

/// Canonicalize a list of component keys.
pub fn archetype_key(mut keys: Vec<&'static str>) -> ArchetypeKey {
    keys.sort_unstable();
    keys.dedup();
    keys
}

/// Position of an archetype in its scene. Ids are assigned in creation order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(pub(crate) u32);

impl ArchetypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ArchetypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Archetype#{}", self.0)
    }
}

/// One component's blobs for every row of an archetype.
pub struct Column {
    descriptor: &'static ComponentDescriptor,
    data: Vec<ComponentData>,
}

impl Column {
    fn new(descriptor: &'static ComponentDescriptor) -> Self {
        Self {
            descriptor,
            data: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &'static ComponentDescriptor {
        self.descriptor
    }

    pub fn key(&self) -> &'static str {
        self.descriptor.key
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize) -> &ComponentData {
        &self.data[row]
    }

    pub fn get_mut(&mut self, row: usize) -> &mut ComponentData {
        &mut self.data[row]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ComponentData> {
        self.data.iter()
    }
}

/// A table of entities that share one component set.
pub struct Archetype {
    id: ArchetypeId,
    key: ArchetypeKey,
    columns: Vec<Column>,
    entities: Vec<EntityId>,
}

impl Archetype {
    /// Create an empty archetype. `descriptors` may arrive in any order; the
    /// columns are laid out in key order.
    pub(crate) fn new(id: ArchetypeId, mut descriptors: Vec<&'static ComponentDescriptor>) -> Self {
        descriptors.sort_unstable_by_key(|d| d.key);
        descriptors.dedup_by_key(|d| d.key);
        let key = descriptors.iter().map(|d| d.key).collect();
        Self {
            id,
            key,
            columns: descriptors.into_iter().map(Column::new).collect(),
            entities: Vec::new(),
        }
    }

    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Canonical component keys, one per column.
    pub fn key(&self) -> &[&'static str] {
        &self.key
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Column position of `key`, by binary search over the canonical order.
    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.key.binary_search_by(|probe| (*probe).cmp(key)).ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.column_index(key).is_some()
    }

    /// `true` when every key in `required` (sorted) is one of this
    /// archetype's columns.
    pub fn contains_all(&self, required: &[&'static str]) -> bool {
        required.iter().all(|k| self.contains(k))
    }

    /// Append a row. `row` must hold one blob per column in column order.
    /// Returns the new row index.
    ///
    /// # Panics
    ///
    /// Panics if the blob count or any blob size disagrees with the columns.
    pub(crate) fn push_row(&mut self, entity: EntityId, row: Vec<ComponentData>) -> usize {
        assert_eq!(
            row.len(),
            self.columns.len(),
            "{:?}: pushing {} blobs into {} columns",
            self.id,
            row.len(),
            self.columns.len()
        );
        for (column, blob) in self.columns.iter_mut().zip(row) {
            column.descriptor.check(&blob);
            column.data.push(blob);
        }
        self.entities.push(entity);
        self.debug_assert_consistent();
        self.entities.len() - 1
    }

    /// Swap-and-pop `row` out of every column and return its blobs in column
    /// order, plus the entity that was moved into `row` (if any).
    pub(crate) fn take_row(&mut self, row: usize) -> (Vec<ComponentData>, Option<EntityId>) {
        let blobs = self
            .columns
            .iter_mut()
            .map(|column| column.data.swap_remove(row))
            .collect();
        self.entities.swap_remove(row);
        self.debug_assert_consistent();
        (blobs, self.entities.get(row).copied())
    }

    /// Deep copy of every blob in `row`, through each column's descriptor.
    pub(crate) fn clone_row(&self, row: usize) -> Vec<ComponentData> {
        self.columns
            .iter()
            .map(|column| column.descriptor.copy(&column.data[row]))
            .collect()
    }

    pub(crate) fn set_entity(&mut self, row: usize, entity: EntityId) {
        self.entities[row] = entity;
    }

    pub fn get(&self, row: usize, column: usize) -> &ComponentData {
        self.columns[column].get(row)
    }

    pub(crate) fn get_mut(&mut self, row: usize, column: usize) -> &mut ComponentData {
        self.columns[column].get_mut(row)
    }

    /// Every column has exactly as many rows as `entities`.
    pub fn is_consistent(&self) -> bool {
        self.columns.iter().all(|c| c.len() == self.entities.len())
    }

    /// Fatal check of [`is_consistent`](Self::is_consistent).
    pub fn assert_consistent(&self) {
        for column in &self.columns {
            assert_eq!(
                column.len(),
                self.entities.len(),
                "{:?}: column `{}` has {} rows, entities has {}",
                self.id,
                column.key(),
                column.len(),
                self.entities.len()
            );
        }
    }

    fn debug_assert_consistent(&self) {
        if cfg!(debug_assertions) {
            self.assert_consistent();
        }
    }
}

impl fmt::Debug for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("entities", &self.entities)
            .finish()
    }
}
