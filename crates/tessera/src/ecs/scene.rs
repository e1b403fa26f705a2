//! # Scene — The Aggregate Root
//!
//! A [`Scene`] owns every piece of ECS state and is the only thing allowed to
//! change it, so all of its lookup tables move together.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Scene                                                        │
//! │                                                              │
//! │  allocator        EntityAllocator (index + generation)       │
//! │  archetypes       Vec<Archetype>, indexed by ArchetypeId     │
//! │  archetype_index  sorted key list → ArchetypeId              │
//! │  entities         EntityDirectory: index → (archetype, row)  │
//! │  components       ComponentDirectory: key → {arch → column}  │
//! │  strings          StringTable (names and other text)         │
//! │  cache            QueryCache: key list → matched archetypes  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Structural Mutation
//!
//! Adding or removing a component changes the entity's component set, so the
//! entity moves to another archetype:
//!
//! ```text
//! add Velocity to e1:
//!
//!   {Name, Position}             {Name, Position, Velocity}
//!   rows: [e0, e1, e2]    ──►    rows: [.., e1]
//!          └── e2 swapped into row 1; its directory row is retargeted
//! ```
//!
//! 1. Resolve (or create) the destination archetype for the new key.
//! 2. Swap-and-pop the row out of the source archetype, keeping its blobs.
//! 3. Retarget the directory entry of whichever entity filled the hole.
//! 4. Push the carried blobs (plus the new one) into the destination.
//! 5. Point the moved entity's directory entry at its new row.
//!
//! Every step runs inside one `&mut self` call, so no intermediate state is
//! ever observable.
//!
//! ## Failure Semantics
//!
//! Calls with a stale or unknown [`EntityId`] log a warning and do nothing.
//! Broken internal invariants (column lengths, blob sizes) panic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::archetype::{Archetype, ArchetypeId, ArchetypeKey, Column, archetype_key};
use super::component::{self, Component, ComponentData, ComponentDescriptor, ComponentSet};
use super::directory::{ComponentDirectory, EntityDirectory, EntityRecord};
use super::entity::{EntityAllocator, EntityFlags, EntityId};
use super::query::{self, CacheStats, QueryCache, QueryView};
use super::strings::{StringIndex, StringTable};
use crate::components::Name;
use crate::config::SceneConfig;
use crate::error::SceneError;

/// Process-unique scene identifier, for logs and active-scene bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SceneId(pub u64);

impl SceneId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// All ECS state for one level, menu, or test world.
pub struct Scene {
    id: SceneId,
    config: SceneConfig,
    pub(crate) allocator: EntityAllocator,
    pub(crate) archetypes: Vec<Archetype>,
    archetype_index: HashMap<ArchetypeKey, ArchetypeId>,
    pub(crate) entities: EntityDirectory,
    components: ComponentDirectory,
    pub(crate) strings: StringTable,
    cache: QueryCache,
}

impl Scene {
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    pub fn with_config(config: SceneConfig) -> Self {
        let scene = Self {
            id: SceneId::next(),
            config,
            allocator: EntityAllocator::new(),
            archetypes: Vec::new(),
            archetype_index: HashMap::new(),
            entities: EntityDirectory::new(),
            components: ComponentDirectory::new(),
            strings: StringTable::new(),
            cache: QueryCache::new(),
        };
        log::debug!("created scene {:?}", scene.id);
        scene
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    // ── Entity Lifecycle ─────────────────────────────────────────────────

    /// Create an entity that has only a [`Name`] component.
    pub fn create_entity(&mut self, name: &str) -> EntityId {
        let text = self.strings.intern(name);
        let descriptor = component::register::<Name>();
        let archetype = self.archetype_for(vec![descriptor]);
        let entity = self.allocator.allocate();
        let row = self.archetypes[archetype.index()]
            .push_row(entity, vec![ComponentData::new(Name { text })]);
        self.entities.insert(entity, archetype, row);
        log::trace!("created {entity:?} \"{name}\"");
        self.after_mutation();
        entity
    }

    /// Create an entity named [`SceneConfig::default_entity_name`].
    pub fn create_entity_default(&mut self) -> EntityId {
        let name = self.config.default_entity_name.clone();
        self.create_entity(&name)
    }

    /// Create an entity with `name` plus a set of type-erased components, in
    /// one archetype placement. A `Name` blob in `extra` is ignored.
    pub(crate) fn create_entity_with(
        &mut self,
        name: &str,
        extra: Vec<(&'static ComponentDescriptor, ComponentData)>,
    ) -> EntityId {
        let name_descriptor = component::register::<Name>();
        let mut blobs: HashMap<&'static str, ComponentData> = HashMap::new();
        let mut descriptors = vec![name_descriptor];
        for (descriptor, blob) in extra {
            if descriptor.key == name_descriptor.key {
                continue;
            }
            descriptor.check(&blob);
            if blobs.insert(descriptor.key, blob).is_none() {
                descriptors.push(descriptor);
            }
        }
        let text = self.strings.intern(name);
        blobs.insert(name_descriptor.key, ComponentData::new(Name { text }));

        let archetype = self.archetype_for(descriptors);
        let row = self.archetypes[archetype.index()]
            .key()
            .iter()
            .map(|key| {
                blobs
                    .remove(key)
                    .unwrap_or_else(|| panic!("no blob for column `{key}`"))
            })
            .collect();
        let entity = self.allocator.allocate();
        let row = self.archetypes[archetype.index()].push_row(entity, row);
        self.entities.insert(entity, archetype, row);
        self.after_mutation();
        entity
    }

    /// Destroy an entity and free its id for reuse. Returns `false` (and
    /// logs a warning) if the handle is stale or unknown.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        let Some(record) = self.live_record(entity, "destroy") else {
            return false;
        };
        let archetype = &mut self.archetypes[record.archetype.index()];
        let key: ArchetypeKey = archetype.key().to_vec();
        let (blobs, moved) = archetype.take_row(record.row);
        if let Some(moved) = moved {
            self.entities.set_row(moved, record.row);
        }
        for (key, blob) in key.into_iter().zip(blobs) {
            self.discard_blob(key, blob);
        }
        self.entities.remove(record.entity);
        self.allocator.deallocate(record.entity);
        log::trace!("destroyed {entity:?}");
        self.after_mutation();
        true
    }

    /// Copy an entity into a new one in the same archetype. Every blob is
    /// deep-copied; the name string gains a reference.
    pub fn clone_entity(&mut self, entity: EntityId) -> Option<EntityId> {
        let record = self.live_record(entity, "clone")?;
        let archetype = &self.archetypes[record.archetype.index()];
        let row = archetype.clone_row(record.row);
        if let Some(column) = archetype.column_index(Name::key()) {
            self.strings.retain(row[column].get::<Name>().text);
        }
        let clone = self.allocator.allocate();
        let new_row = self.archetypes[record.archetype.index()].push_row(clone, row);
        self.entities.insert(clone, record.archetype, new_row);
        self.after_mutation();
        Some(clone)
    }

    /// `true` if `entity` is alive in this scene. Flag bits are ignored.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.contains(entity)
    }

    /// Rewrite the flag bits of a live entity. Returns the updated handle.
    pub fn set_entity_flags(&mut self, entity: EntityId, flags: EntityFlags) -> Option<EntityId> {
        let record = self.live_record(entity, "set flags on")?;
        let updated = record.entity.with_flags(flags);
        self.archetypes[record.archetype.index()].set_entity(record.row, updated);
        self.entities.set_entity(updated);
        self.after_mutation();
        Some(updated)
    }

    /// Flags currently stored for `entity`.
    pub fn entity_flags(&self, entity: EntityId) -> Option<EntityFlags> {
        self.entities.get(entity).map(|r| r.entity.flags())
    }

    /// The handle as stored, with current flag bits.
    pub fn resolve(&self, entity: EntityId) -> Option<EntityId> {
        self.entities.get(entity).map(|r| r.entity)
    }

    // ── Components ───────────────────────────────────────────────────────

    /// Add `value` to `entity`, moving it to the matching archetype. If the
    /// entity already has a `T`, it is overwritten in place.
    pub fn add_component<T: Component>(&mut self, entity: EntityId, value: T) -> bool {
        let descriptor = component::register::<T>();
        self.add_component_data(entity, descriptor, ComponentData::new(value))
    }

    /// Type-erased [`add_component`](Self::add_component).
    pub fn add_component_data(
        &mut self,
        entity: EntityId,
        descriptor: &'static ComponentDescriptor,
        blob: ComponentData,
    ) -> bool {
        let Some(record) = self.live_record(entity, "add component to") else {
            return false;
        };
        descriptor.check(&blob);

        if let Some(column) = self.components.column_of(record.archetype, descriptor.key) {
            let slot = self.archetypes[record.archetype.index()].get_mut(record.row, column);
            // Writing back the value already stored must not free what it owns.
            if *slot == blob {
                return true;
            }
            let old = std::mem::replace(slot, blob);
            self.discard_blob(descriptor.key, old);
            return true;
        }

        let mut descriptors: Vec<_> = self.archetypes[record.archetype.index()]
            .columns()
            .iter()
            .map(Column::descriptor)
            .collect();
        descriptors.push(descriptor);
        let destination = self.archetype_for(descriptors);
        self.relocate(record, destination, Some((descriptor.key, blob)));
        true
    }

    /// Remove `T` from `entity`, moving it to the smaller archetype. Returns
    /// `false` if the entity is stale or has no `T`.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> bool {
        self.remove_component_key(entity, T::key())
    }

    /// Type-erased [`remove_component`](Self::remove_component).
    pub fn remove_component_key(&mut self, entity: EntityId, key: &str) -> bool {
        let Some(record) = self.live_record(entity, "remove component from") else {
            return false;
        };
        if self.components.column_of(record.archetype, key).is_none() {
            return false;
        }
        let descriptors: Vec<_> = self.archetypes[record.archetype.index()]
            .columns()
            .iter()
            .map(Column::descriptor)
            .filter(|d| d.key != key)
            .collect();
        let destination = self.archetype_for(descriptors);
        self.relocate(record, destination, None);
        true
    }

    pub fn get_component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let record = self.entities.get(entity)?;
        let column = self.components.column_of(record.archetype, T::key())?;
        Some(self.archetypes[record.archetype.index()].get(record.row, column).get::<T>())
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let record = self.entities.get(entity)?;
        let column = self.components.column_of(record.archetype, T::key())?;
        Some(
            self.archetypes[record.archetype.index()]
                .get_mut(record.row, column)
                .get_mut::<T>(),
        )
    }

    /// Raw blob of component `key` on `entity`.
    pub fn get_component_data(&self, entity: EntityId, key: &str) -> Option<&ComponentData> {
        let record = self.entities.get(entity)?;
        let column = self.components.column_of(record.archetype, key)?;
        Some(self.archetypes[record.archetype.index()].get(record.row, column))
    }

    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.has_component_key(entity, T::key())
    }

    pub fn has_component_key(&self, entity: EntityId, key: &str) -> bool {
        self.entities
            .get(entity)
            .is_some_and(|r| self.components.column_of(r.archetype, key).is_some())
    }

    /// Sorted component keys of `entity`.
    pub fn component_keys(&self, entity: EntityId) -> Option<&[&'static str]> {
        let record = self.entities.get(entity)?;
        Some(self.archetypes[record.archetype.index()].key())
    }

    // ── Names ────────────────────────────────────────────────────────────

    pub fn entity_name(&self, entity: EntityId) -> Option<&str> {
        let name = self.get_component::<Name>(entity)?;
        Some(self.strings.get(name.text))
    }

    /// Replace the entity's name, adding a `Name` if it had none.
    pub fn rename_entity(&mut self, entity: EntityId, name: &str) -> bool {
        if !self.is_alive(entity) {
            log::warn!("cannot rename {entity:?}: not alive");
            return false;
        }
        if self.entity_name(entity) == Some(name) {
            return true;
        }
        let text = self.strings.intern(name);
        self.add_component(entity, Name { text })
    }

    /// First entity (in archetype and row order) whose name is `name`.
    pub fn find_entity_by_name(&self, name: &str) -> Option<EntityId> {
        let text = self.strings.find(name)?;
        let name_key = Name::key();
        self.components
            .archetypes_containing(name_key)
            .find_map(|id| {
                let archetype = &self.archetypes[id.index()];
                let column = self.components.column_of(id, name_key)?;
                archetype.columns()[column]
                    .iter()
                    .position(|blob| blob.get::<Name>().text == text)
                    .map(|row| archetype.entities()[row])
            })
    }

    pub fn intern(&mut self, text: &str) -> StringIndex {
        self.strings.intern(text)
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn strings_mut(&mut self) -> &mut StringTable {
        &mut self.strings
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// Every entity that has all components in `Q`, computed fresh.
    ///
    /// ```ignore
    /// for e in scene.query::<(Position, Scale)>() { ... }
    /// ```
    pub fn query<Q: ComponentSet>(&self) -> Vec<EntityId> {
        self.query_keys(&Q::keys())
    }

    /// [`query`](Self::query) by sorted component keys.
    pub fn query_keys(&self, required: &[&'static str]) -> Vec<EntityId> {
        query::matching_archetypes(&self.archetypes, &self.components, required)
            .into_iter()
            .flat_map(|id| self.archetypes[id.index()].entities().iter().copied())
            .collect()
    }

    /// Same result as [`query`](Self::query), but the archetype match is
    /// memoized. The returned view reads live entity lists.
    pub fn cached_query<Q: ComponentSet>(&mut self) -> QueryView<'_> {
        let required = Q::keys();
        if !self.config.cache_queries {
            let matched =
                query::matching_archetypes(&self.archetypes, &self.components, &required);
            return QueryView::owned(&self.archetypes, matched);
        }
        let matched = self
            .cache
            .get_or_build(required, &self.archetypes, &self.components);
        QueryView::cached(&self.archetypes, matched)
    }

    /// Drop every cached query.
    pub fn invalidate_query_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ── Introspection ────────────────────────────────────────────────────

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    /// Archetype holding exactly the components in `Q`, if it exists yet.
    pub fn archetype_of<Q: ComponentSet>(&self) -> Option<ArchetypeId> {
        self.archetype_index.get(&Q::keys()).copied()
    }

    pub fn entity_record(&self, entity: EntityId) -> Option<EntityRecord> {
        self.entities.get(entity)
    }

    pub fn entity_directory(&self) -> &EntityDirectory {
        &self.entities
    }

    pub fn component_directory(&self) -> &ComponentDirectory {
        &self.components
    }

    /// Check that every archetype's columns match its entity list and that
    /// every directory record points at a row owned by that entity.
    pub fn check_invariants(&self) -> Result<(), SceneError> {
        for archetype in &self.archetypes {
            if !archetype.is_consistent() {
                return Err(SceneError::Corrupt(format!(
                    "{:?} has columns of unequal length",
                    archetype.id()
                )));
            }
            for (row, &entity) in archetype.entities().iter().enumerate() {
                let record = self.entities.get(entity).ok_or_else(|| {
                    SceneError::Corrupt(format!("{entity:?} stored in {:?} has no record", archetype.id()))
                })?;
                if record.archetype != archetype.id() || record.row != row {
                    return Err(SceneError::Corrupt(format!(
                        "{entity:?} stored at {:?} row {row}, directory says {:?} row {}",
                        archetype.id(),
                        record.archetype,
                        record.row
                    )));
                }
            }
        }
        for record in self.entities.iter() {
            let stored = self
                .archetypes
                .get(record.archetype.index())
                .and_then(|a| a.entities().get(record.row));
            if stored != Some(&record.entity) {
                return Err(SceneError::Corrupt(format!(
                    "directory record for {:?} points at {:?} row {}, which holds {stored:?}",
                    record.entity, record.archetype, record.row
                )));
            }
        }
        if self.entities.len() != self.allocator.alive_count() {
            return Err(SceneError::Corrupt(format!(
                "{} entities in directory, allocator has {} alive",
                self.entities.len(),
                self.allocator.alive_count()
            )));
        }
        Ok(())
    }

    /// Log the archetype index, entity directory, and component directory at
    /// debug level.
    pub fn dump(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        log::debug!(
            "scene {:?}: {} entities, {} archetypes, {} strings",
            self.id,
            self.entity_count(),
            self.archetype_count(),
            self.strings.len()
        );
        for archetype in &self.archetypes {
            log::debug!("  {:?} {:?}", archetype.id(), archetype.key());
            for (row, entity) in archetype.entities().iter().enumerate() {
                let values: Vec<String> = archetype
                    .columns()
                    .iter()
                    .map(|c| format!("{:?}", c.descriptor().display(c.get(row))))
                    .collect();
                log::debug!("    [{row}] {entity:?} {}", values.join(", "));
            }
        }
        let mut records: Vec<_> = self.entities.iter().collect();
        records.sort_by_key(|r| r.entity.index());
        for record in records {
            log::debug!(
                "  entity {:?} -> {:?} row {}",
                record.entity,
                record.archetype,
                record.row
            );
        }
        let mut keys: Vec<_> = self.components.keys().collect();
        keys.sort_unstable();
        for key in keys {
            let placements: Vec<String> = self
                .components
                .archetypes_containing(key)
                .filter_map(|id| {
                    self.components
                        .column_of(id, key)
                        .map(|column| format!("{id:?}[{column}]"))
                })
                .collect();
            log::debug!("  component `{key}` in {}", placements.join(" "));
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// Directory record for a live entity, or a warning naming `action`.
    fn live_record(&self, entity: EntityId, action: &str) -> Option<EntityRecord> {
        let record = self.entities.get(entity);
        if record.is_none() {
            log::warn!("cannot {action} {entity:?}: not alive in scene {:?}", self.id);
        }
        record
    }

    /// Find or lazily create the archetype for a set of descriptors.
    pub(crate) fn archetype_for(&mut self, descriptors: Vec<&'static ComponentDescriptor>) -> ArchetypeId {
        let key = archetype_key(descriptors.iter().map(|d| d.key).collect());
        if let Some(&id) = self.archetype_index.get(&key) {
            return id;
        }
        let id = ArchetypeId(
            u32::try_from(self.archetypes.len())
                .unwrap_or_else(|_| panic!("archetype id space exhausted")),
        );
        let archetype = Archetype::new(id, descriptors);
        self.components.register_archetype(&archetype);
        self.cache.archetype_created(&archetype);
        log::debug!("scene {:?}: new {id:?} {key:?}", self.id);
        self.archetypes.push(archetype);
        self.archetype_index.insert(key, id);
        id
    }

    /// Move an entity's row into `destination`, carrying every blob the
    /// destination has a column for and discarding the rest.
    fn relocate(
        &mut self,
        record: EntityRecord,
        destination: ArchetypeId,
        extra: Option<(&'static str, ComponentData)>,
    ) {
        let source = &mut self.archetypes[record.archetype.index()];
        let source_key: ArchetypeKey = source.key().to_vec();
        let (blobs, moved) = source.take_row(record.row);
        if let Some(moved) = moved {
            self.entities.set_row(moved, record.row);
        }

        let width = self.archetypes[destination.index()].columns().len();
        let mut row: Vec<Option<ComponentData>> = vec![None; width];
        let carried = source_key.into_iter().zip(blobs).chain(extra);
        for (key, blob) in carried {
            match self.components.column_of(destination, key) {
                Some(column) => row[column] = Some(blob),
                None => self.discard_blob(key, blob),
            }
        }
        let row = row
            .into_iter()
            .enumerate()
            .map(|(column, blob)| {
                blob.unwrap_or_else(|| {
                    panic!("{destination:?} column {column} left empty moving {:?}", record.entity)
                })
            })
            .collect();

        let new_row = self.archetypes[destination.index()].push_row(record.entity, row);
        self.entities.insert(record.entity, destination, new_row);
        log::trace!(
            "moved {:?} {:?} row {} -> {destination:?} row {new_row}",
            record.entity,
            record.archetype,
            record.row
        );
        self.after_mutation();
    }

    /// Release anything a blob owns outside the archetype table.
    fn discard_blob(&mut self, key: &str, blob: ComponentData) {
        if key == Name::key() {
            let text = blob.get::<Name>().text;
            if !text.is_empty() {
                self.strings.release(text);
            }
        }
    }

    fn after_mutation(&self) {
        if self.config.validate_mutations {
            if let Err(err) = self.check_invariants() {
                panic!("{err}");
            }
        }
    }

    /// Deactivation hook for the active-scene slot.
    pub(crate) fn on_deactivate(&mut self) {
        self.cache.clear();
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::{Pod, Zeroable};
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
    #[repr(C)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }
    impl Component for Velocity {}

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
    #[repr(C)]
    struct Health(u32);
    impl Component for Health {}

    fn scene() -> Scene {
        Scene::with_config(SceneConfig {
            validate_mutations: true,
            ..SceneConfig::default()
        })
    }

    #[test]
    fn create_gives_name_only() {
        let mut scene = scene();
        let e = scene.create_entity("hero");
        assert_eq!(scene.entity_name(e), Some("hero"));
        assert_eq!(scene.component_keys(e), Some(&["Name"][..]));
        assert_eq!(scene.entity_count(), 1);
        assert_eq!(scene.archetype_count(), 1);
    }

    #[test]
    fn default_name_comes_from_config() {
        let mut scene = scene();
        let e = scene.create_entity_default();
        assert_eq!(scene.entity_name(e), Some("New Entity"));
    }

    #[test]
    fn add_moves_to_new_archetype() {
        let mut scene = scene();
        let e = scene.create_entity("a");
        assert!(scene.add_component(e, Position { x: 1.0, y: 2.0 }));
        assert_eq!(scene.archetype_count(), 2);
        assert_eq!(scene.get_component::<Position>(e), Some(&Position { x: 1.0, y: 2.0 }));
        assert_eq!(scene.entity_name(e), Some("a"));
    }

    #[test]
    fn add_existing_overwrites_in_place() {
        let mut scene = scene();
        let e = scene.create_entity("a");
        scene.add_component(e, Health(1));
        let record = scene.entity_record(e).unwrap();
        scene.add_component(e, Health(7));
        assert_eq!(scene.entity_record(e), Some(record));
        assert_eq!(scene.get_component::<Health>(e), Some(&Health(7)));
    }

    #[test]
    fn remove_moves_back() {
        let mut scene = scene();
        let e = scene.create_entity("a");
        scene.add_component(e, Position { x: 1.0, y: 1.0 });
        let with_position = scene.entity_record(e).unwrap().archetype;
        scene.add_component(e, Velocity { dx: 3.0, dy: 4.0 });
        assert!(scene.remove_component::<Velocity>(e));
        assert_eq!(scene.entity_record(e).unwrap().archetype, with_position);
        assert!(!scene.has_component::<Velocity>(e));
        assert_eq!(scene.get_component::<Position>(e), Some(&Position { x: 1.0, y: 1.0 }));
    }

    #[test]
    fn remove_missing_component_is_false() {
        let mut scene = scene();
        let e = scene.create_entity("a");
        assert!(!scene.remove_component::<Health>(e));
    }

    #[test]
    fn move_retargets_swapped_entity() {
        let mut scene = scene();
        let a = scene.create_entity("a");
        let b = scene.create_entity("b");
        let c = scene.create_entity("c");
        scene.add_component(a, Health(1));
        // c was swapped into a's old row.
        assert_eq!(scene.entity_record(c).unwrap().row, 0);
        assert_eq!(scene.entity_record(b).unwrap().row, 1);
        assert_eq!(scene.entity_name(c), Some("c"));
        scene.check_invariants().unwrap();
    }

    #[test]
    fn get_component_mut_writes_through() {
        let mut scene = scene();
        let e = scene.create_entity("a");
        scene.add_component(e, Health(10));
        scene.get_component_mut::<Health>(e).unwrap().0 -= 3;
        assert_eq!(scene.get_component::<Health>(e), Some(&Health(7)));
    }

    #[test]
    fn destroy_frees_and_reuses_with_new_generation() {
        let mut scene = scene();
        let e = scene.create_entity("a");
        assert!(scene.destroy_entity(e));
        assert!(!scene.is_alive(e));
        assert!(!scene.destroy_entity(e));

        let reused = scene.create_entity("b");
        assert_eq!(reused.index(), e.index());
        assert_ne!(reused.generation(), e.generation());
        assert!(scene.get_component::<Name>(e).is_none());
        assert!(!scene.add_component(e, Health(1)));
        assert!(!scene.has_component::<Health>(reused));
    }

    #[test]
    fn destroy_releases_name() {
        let mut scene = scene();
        let e = scene.create_entity("ghost");
        scene.destroy_entity(e);
        assert_eq!(scene.strings().find("ghost"), None);
        assert_eq!(scene.find_entity_by_name("ghost"), None);
    }

    #[test]
    fn clone_copies_row() {
        let mut scene = scene();
        let e = scene.create_entity("orc");
        scene.add_component(e, Health(30));
        let copy = scene.clone_entity(e).unwrap();

        assert_ne!(copy, e);
        assert_eq!(scene.entity_record(copy).unwrap().archetype, scene.entity_record(e).unwrap().archetype);
        assert_eq!(scene.get_component::<Health>(copy), Some(&Health(30)));

        scene.get_component_mut::<Health>(copy).unwrap().0 = 5;
        assert_eq!(scene.get_component::<Health>(e), Some(&Health(30)));

        scene.destroy_entity(e);
        assert_eq!(scene.entity_name(copy), Some("orc"));
    }

    #[test]
    fn flags_update_everywhere() {
        let mut scene = scene();
        let e = scene.create_entity("a");
        let flagged = scene.set_entity_flags(e, EntityFlags::DISABLED).unwrap();
        assert_eq!(flagged.flags(), EntityFlags::DISABLED);
        assert_eq!(scene.entity_flags(e), Some(EntityFlags::DISABLED));
        assert_eq!(scene.query::<(Name,)>(), vec![flagged]);
        // The unflagged handle still resolves.
        assert!(scene.is_alive(e));
        scene.check_invariants().unwrap();
        assert!(scene.destroy_entity(e));
    }

    #[test]
    fn writing_back_name_keeps_its_string() {
        let mut scene = scene();
        let hero = scene.create_entity("hero");
        let name = *scene.get_component::<Name>(hero).unwrap();
        assert!(scene.add_component(hero, name));
        assert_eq!(scene.strings().ref_count(name.text), 1);

        let villain = scene.create_entity("villain");
        assert_eq!(scene.entity_name(hero), Some("hero"));
        assert_eq!(scene.entity_name(villain), Some("villain"));
        assert_ne!(scene.get_component::<Name>(villain).unwrap().text, name.text);
    }

    #[test]
    fn rename_to_same_name_keeps_one_reference() {
        let mut scene = scene();
        let e = scene.create_entity("scout");
        assert!(scene.rename_entity(e, "scout"));
        let text = scene.strings().find("scout").unwrap();
        assert_eq!(scene.strings().ref_count(text), 1);
        scene.destroy_entity(e);
        assert_eq!(scene.strings().find("scout"), None);
    }

    #[test]
    fn find_and_rename() {
        let mut scene = scene();
        let _a = scene.create_entity("a");
        let b = scene.create_entity("b");
        assert_eq!(scene.find_entity_by_name("b"), Some(b));
        assert!(scene.rename_entity(b, "boss"));
        assert_eq!(scene.find_entity_by_name("b"), None);
        assert_eq!(scene.find_entity_by_name("boss"), Some(b));
        assert_eq!(scene.strings().len(), 2);
    }

    #[test]
    fn query_matches_supersets() {
        let mut scene = scene();
        let a = scene.create_entity("a");
        let b = scene.create_entity("b");
        scene.add_component(a, Position { x: 0.0, y: 0.0 });
        scene.add_component(b, Position { x: 0.0, y: 0.0 });
        scene.add_component(b, Velocity { dx: 0.0, dy: 0.0 });

        assert_eq!(scene.query::<(Position,)>().len(), 2);
        assert_eq!(scene.query::<(Position, Velocity)>(), vec![b]);
        assert_eq!(scene.query::<()>().len(), 2);
    }

    #[test]
    fn cached_query_sees_new_archetypes() {
        let mut scene = scene();
        let a = scene.create_entity("a");
        scene.add_component(a, Position { x: 0.0, y: 0.0 });
        assert_eq!(scene.cached_query::<(Position,)>().to_vec(), vec![a]);

        let b = scene.create_entity("b");
        scene.add_component(b, Position { x: 0.0, y: 0.0 });
        scene.add_component(b, Health(1));
        let view = scene.cached_query::<(Position,)>();
        assert_eq!(view.len(), 2);
        assert!(view.contains(b));
        assert!(scene.cache_stats().invalidations >= 1);
    }

    #[test]
    fn cached_query_without_cache() {
        let mut scene = Scene::with_config(SceneConfig {
            cache_queries: false,
            ..SceneConfig::default()
        });
        let a = scene.create_entity("a");
        assert_eq!(scene.cached_query::<(Name,)>().to_vec(), vec![a]);
        assert_eq!(scene.cache_stats(), CacheStats::default());
    }

    #[test]
    fn stale_handle_reads_none() {
        let mut scene = scene();
        let e = scene.create_entity("a");
        scene.destroy_entity(e);
        assert_eq!(scene.entity_name(e), None);
        assert_eq!(scene.component_keys(e), None);
        assert_eq!(scene.clone_entity(e), None);
        assert_eq!(scene.set_entity_flags(e, EntityFlags::HIDDEN), None);
    }

    #[test]
    fn dump_does_not_panic() {
        let mut scene = scene();
        let e = scene.create_entity("a");
        scene.add_component(e, Health(3));
        scene.dump();
    }
}
