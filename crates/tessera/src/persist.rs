//! # Persistence — Scene Snapshots and Prefabs
//!
//! Saves walk every archetype column and turn each blob into JSON through
//! the column's registered descriptor. Loads do the reverse and rebuild the
//! entity directory, component directory, allocator, and string table, so
//! entity ids and string indices survive a round trip unchanged.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tessera::prelude::*;
//!
//! let json = persist::to_json(&scene)?;
//! let restored = persist::from_json(&json)?;
//!
//! persist::save_to_file(&scene, "level.json")?;
//! let restored = persist::load_from_file("level.json")?;
//! ```
//!
//! Every component type stored in a scene must be registered before loading
//! it. Engine components are registered automatically; game components need
//! a [`register`](crate::ecs::component::register) call (or one prior use in
//! any scene) first.
//!
//! ## Wire Shape
//!
//! ```text
//! SceneData
//!   allocator:  { generations, free_list }
//!   strings:    [ "Player", null, "Goblin", ... ]   ← slot 1 onward
//!   archetypes: [ { components: ["Name", "Position"],
//!                   entities:   [4294967297, ...],
//!                   columns:    [[{"text":1}, ...], [[0,0,0], ...]] } ]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::components::{Name, register_engine_components};
use crate::config::SceneConfig;
use crate::ecs::component::{self, Component, ComponentData, ComponentDescriptor};
use crate::ecs::entity::{EntityAllocator, EntityId};
use crate::ecs::scene::Scene;
use crate::ecs::strings::StringTable;
use crate::error::SceneError;

// ── Scene Data ───────────────────────────────────────────────────────────

/// A serialized scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneData {
    pub allocator: EntityAllocator,
    pub strings: Vec<Option<StoredString>>,
    pub archetypes: Vec<ArchetypeData>,
}

/// One interned string and its reference count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredString {
    pub text: String,
    pub refs: u32,
}

/// One archetype: its component keys, entities, and one JSON value per
/// (column, row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeData {
    pub components: Vec<String>,
    pub entities: Vec<EntityId>,
    pub columns: Vec<Vec<serde_json::Value>>,
}

/// Serialize every archetype, entity, and string of `scene`.
pub fn save_scene(scene: &Scene) -> Result<SceneData, SceneError> {
    let mut archetypes = Vec::with_capacity(scene.archetype_count());
    for archetype in scene.archetypes() {
        let mut columns = Vec::with_capacity(archetype.columns().len());
        for column in archetype.columns() {
            let descriptor = column.descriptor();
            let values = column
                .iter()
                .map(|blob| descriptor.serialize(blob))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| SceneError::Component {
                    key: descriptor.key.to_owned(),
                    source,
                })?;
            columns.push(values);
        }
        archetypes.push(ArchetypeData {
            components: archetype.key().iter().map(|k| (*k).to_owned()).collect(),
            entities: archetype.entities().to_vec(),
            columns,
        });
    }

    let strings = scene
        .strings()
        .snapshot()
        .into_iter()
        .map(|slot| slot.map(|(text, refs)| StoredString { text, refs }))
        .collect();

    log::info!(
        "saved scene {:?}: {} entities in {} archetypes",
        scene.id(),
        scene.entity_count(),
        scene.archetype_count()
    );
    Ok(SceneData {
        allocator: scene.allocator.clone(),
        strings,
        archetypes,
    })
}

/// Rebuild a scene from [`SceneData`] with the default config.
pub fn load_scene(data: &SceneData) -> Result<Scene, SceneError> {
    load_scene_with_config(data, SceneConfig::default())
}

/// Rebuild a scene from [`SceneData`].
///
/// Fails if a component key isn't registered, a column has the wrong number
/// of values, or an entity id disagrees with the saved allocator.
pub fn load_scene_with_config(data: &SceneData, config: SceneConfig) -> Result<Scene, SceneError> {
    register_engine_components();

    if !data.allocator.is_well_formed() {
        return Err(SceneError::Corrupt("malformed entity allocator".to_owned()));
    }
    let mut scene = Scene::with_config(config);
    scene.allocator = data.allocator.clone();
    scene.strings = StringTable::restore(
        data.strings
            .iter()
            .map(|slot| slot.as_ref().map(|s| (s.text.clone(), s.refs)))
            .collect(),
    );

    for (index, stored) in data.archetypes.iter().enumerate() {
        let descriptors = resolve_descriptors(&stored.components)?;
        if stored.columns.len() != descriptors.len() {
            return Err(SceneError::ColumnLength {
                archetype: index,
                expected: descriptors.len(),
                found: stored.columns.len(),
            });
        }
        for column in &stored.columns {
            if column.len() != stored.entities.len() {
                return Err(SceneError::ColumnLength {
                    archetype: index,
                    expected: stored.entities.len(),
                    found: column.len(),
                });
            }
        }

        let archetype = scene.archetype_for(descriptors.clone());
        // Saved column order may differ from canonical order.
        let placement: Vec<usize> = descriptors
            .iter()
            .map(|d| {
                scene.archetypes[archetype.index()]
                    .column_index(d.key)
                    .unwrap_or_else(|| panic!("{archetype:?} lacks column `{}`", d.key))
            })
            .collect();

        for (row, &entity) in stored.entities.iter().enumerate() {
            if scene.allocator.generation_of(entity.index()) != Some(entity.generation()) {
                return Err(SceneError::UnknownEntity(entity));
            }
            if scene.entities.contains(entity) {
                return Err(SceneError::DuplicateEntity(entity));
            }
            let mut blobs: Vec<Option<ComponentData>> = vec![None; descriptors.len()];
            let saved = descriptors.iter().zip(&stored.columns).zip(&placement);
            for ((descriptor, column), &slot) in saved {
                blobs[slot] = Some(decode(descriptor, column[row].clone())?);
            }
            let blobs = blobs.into_iter().flatten().collect();
            let new_row = scene.archetypes[archetype.index()].push_row(entity, blobs);
            scene.entities.insert(entity, archetype, new_row);
        }
    }

    for &index in scene.allocator.free_indices() {
        if scene.entities.contains_index(index) {
            return Err(SceneError::Corrupt(format!(
                "free list names slot {index}, which a stored entity occupies"
            )));
        }
    }
    scene.check_invariants()?;
    log::info!(
        "loaded scene {:?}: {} entities in {} archetypes",
        scene.id(),
        scene.entity_count(),
        scene.archetype_count()
    );
    Ok(scene)
}

fn resolve_descriptors(keys: &[String]) -> Result<Vec<&'static ComponentDescriptor>, SceneError> {
    let mut descriptors = Vec::with_capacity(keys.len());
    for key in keys {
        let descriptor =
            component::lookup(key).ok_or_else(|| SceneError::UnregisteredComponent(key.clone()))?;
        if descriptors.iter().any(|d: &&ComponentDescriptor| d.key == descriptor.key) {
            return Err(SceneError::Corrupt(format!("component `{key}` listed twice")));
        }
        descriptors.push(descriptor);
    }
    Ok(descriptors)
}

fn decode(
    descriptor: &'static ComponentDescriptor,
    value: serde_json::Value,
) -> Result<ComponentData, SceneError> {
    descriptor
        .deserialize(value)
        .map_err(|source| SceneError::Component {
            key: descriptor.key.to_owned(),
            source,
        })
}

// ── JSON & Files ─────────────────────────────────────────────────────────

pub fn to_json(scene: &Scene) -> Result<String, SceneError> {
    Ok(serde_json::to_string_pretty(&save_scene(scene)?)?)
}

pub fn from_json(json: &str) -> Result<Scene, SceneError> {
    let data: SceneData = serde_json::from_str(json)?;
    load_scene(&data)
}

pub fn save_to_file(scene: &Scene, path: impl AsRef<Path>) -> Result<(), SceneError> {
    let path = path.as_ref();
    std::fs::write(path, to_json(scene)?)?;
    log::info!("wrote {}", path.display());
    Ok(())
}

pub fn load_from_file(path: impl AsRef<Path>) -> Result<Scene, SceneError> {
    let json = std::fs::read_to_string(path)?;
    from_json(&json)
}

// ── Prefabs ──────────────────────────────────────────────────────────────

/// One entity's components, detached from any scene. The name is stored as
/// text since string indices are per scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefabData {
    pub name: String,
    pub components: BTreeMap<String, serde_json::Value>,
}

/// Capture `entity` as a prefab.
pub fn save_prefab(scene: &Scene, entity: EntityId) -> Result<PrefabData, SceneError> {
    let keys = scene
        .component_keys(entity)
        .ok_or(SceneError::UnknownEntity(entity))?;
    let mut components = BTreeMap::new();
    for &key in keys {
        if key == Name::key() {
            continue;
        }
        let descriptor = component::lookup(key)
            .ok_or_else(|| SceneError::UnregisteredComponent(key.to_owned()))?;
        let blob = scene
            .get_component_data(entity, key)
            .ok_or(SceneError::UnknownEntity(entity))?;
        let value = descriptor
            .serialize(blob)
            .map_err(|source| SceneError::Component {
                key: key.to_owned(),
                source,
            })?;
        components.insert(key.to_owned(), value);
    }
    Ok(PrefabData {
        name: scene.entity_name(entity).unwrap_or_default().to_owned(),
        components,
    })
}

/// Create a new entity in `scene` from a prefab. Nothing is created if any
/// component fails to decode.
pub fn instantiate_prefab(scene: &mut Scene, prefab: &PrefabData) -> Result<EntityId, SceneError> {
    let mut blobs = Vec::with_capacity(prefab.components.len());
    for (key, value) in &prefab.components {
        let descriptor =
            component::lookup(key).ok_or_else(|| SceneError::UnregisteredComponent(key.clone()))?;
        blobs.push((descriptor, decode(descriptor, value.clone())?));
    }
    Ok(scene.create_entity_with(&prefab.name, blobs))
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Parent, Position, ZIndex};
    use glam::Vec3;

    #[test]
    fn round_trip_keeps_ids_and_values() {
        let mut scene = Scene::new();
        let root = scene.spawn("root").add(Position(Vec3::X)).id();
        let child = scene
            .spawn("child")
            .add(Position(Vec3::Y))
            .add(Parent { parent: root })
            .id();
        let gone = scene.create_entity("gone");
        scene.destroy_entity(gone);

        let restored = from_json(&to_json(&scene).unwrap()).unwrap();
        assert_eq!(restored.entity_count(), 2);
        assert_eq!(restored.entity_name(child), Some("child"));
        assert_eq!(restored.get_component::<Parent>(child), Some(&Parent { parent: root }));
        assert_eq!(restored.get_component::<Position>(root), Some(&Position(Vec3::X)));
        assert!(!restored.is_alive(gone));
    }

    #[test]
    fn loaded_allocator_continues_where_it_left_off() {
        let mut scene = Scene::new();
        let a = scene.create_entity("a");
        let _b = scene.create_entity("b");
        scene.destroy_entity(a);

        let mut restored = load_scene(&save_scene(&scene).unwrap()).unwrap();
        let reused = restored.create_entity("c");
        assert_eq!(reused.index(), a.index());
        assert_eq!(reused.generation(), a.generation() + 1);
    }

    #[test]
    fn unregistered_key_fails() {
        let mut data = save_scene(&Scene::new()).unwrap();
        data.archetypes.push(ArchetypeData {
            components: vec!["persist_tests::Unknown".to_owned()],
            entities: Vec::new(),
            columns: vec![Vec::new()],
        });
        assert!(matches!(
            load_scene(&data),
            Err(SceneError::UnregisteredComponent(key)) if key == "persist_tests::Unknown"
        ));
    }

    #[test]
    fn short_column_fails() {
        let mut scene = Scene::new();
        scene.create_entity("a");
        let mut data = save_scene(&scene).unwrap();
        data.archetypes[0].columns[0].clear();
        assert!(matches!(
            load_scene(&data),
            Err(SceneError::ColumnLength { expected: 1, found: 0, .. })
        ));
    }

    #[test]
    fn prefab_round_trip() {
        let mut source = Scene::new();
        let orc = source
            .spawn("orc")
            .add(Position(Vec3::new(1.0, 2.0, 3.0)))
            .add(ZIndex { z: 5 })
            .id();
        let prefab = save_prefab(&source, orc).unwrap();
        assert_eq!(prefab.name, "orc");
        assert_eq!(prefab.components.len(), 2);

        let mut target = Scene::new();
        target.create_entity("filler");
        let spawned = instantiate_prefab(&mut target, &prefab).unwrap();
        assert_eq!(target.entity_name(spawned), Some("orc"));
        assert_eq!(target.get_component::<ZIndex>(spawned), Some(&ZIndex { z: 5 }));
        assert_eq!(target.component_keys(spawned), Some(&["Name", "Position", "ZIndex"][..]));
        target.check_invariants().unwrap();
    }

    #[test]
    fn prefab_of_stale_entity_fails() {
        let mut scene = Scene::new();
        let e = scene.create_entity("a");
        scene.destroy_entity(e);
        assert!(matches!(save_prefab(&scene, e), Err(SceneError::UnknownEntity(_))));
    }

    #[test]
    fn bad_prefab_value_creates_nothing() {
        let mut scene = Scene::new();
        register_engine_components();
        let prefab = PrefabData {
            name: "broken".to_owned(),
            components: BTreeMap::from([("ZIndex".to_owned(), serde_json::json!("not a z"))]),
        };
        assert!(matches!(
            instantiate_prefab(&mut scene, &prefab),
            Err(SceneError::Component { .. })
        ));
        assert_eq!(scene.entity_count(), 0);
    }
}
