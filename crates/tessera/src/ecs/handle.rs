//! Borrowed entity handles.
//!
//! [`EntityMut`] bundles a `&mut Scene` with one entity so component calls
//! read like methods on the entity itself:
//!
//! ```ignore
//! let player = scene
//!     .spawn("player")
//!     .add(Position(Vec3::ZERO))
//!     .add(ZIndex { z: 2 })
//!     .id();
//! ```

use super::component::Component;
use super::entity::{EntityFlags, EntityId};
use super::scene::Scene;

/// Read-only view of one live entity.
#[derive(Clone, Copy)]
pub struct EntityRef<'s> {
    scene: &'s Scene,
    entity: EntityId,
}

impl<'s> EntityRef<'s> {
    pub fn id(&self) -> EntityId {
        self.entity
    }

    pub fn get<T: Component>(&self) -> Option<&'s T> {
        self.scene.get_component::<T>(self.entity)
    }

    pub fn has<T: Component>(&self) -> bool {
        self.scene.has_component::<T>(self.entity)
    }

    pub fn name(&self) -> &'s str {
        self.scene.entity_name(self.entity).unwrap_or("")
    }

    pub fn component_keys(&self) -> &'s [&'static str] {
        self.scene.component_keys(self.entity).unwrap_or(&[])
    }
}

/// Mutable handle to one entity. Every method forwards to the [`Scene`].
pub struct EntityMut<'s> {
    scene: &'s mut Scene,
    entity: EntityId,
}

impl<'s> EntityMut<'s> {
    pub fn id(&self) -> EntityId {
        self.entity
    }

    /// Add or overwrite a component. Chainable.
    pub fn add<T: Component>(&mut self, value: T) -> &mut Self {
        self.scene.add_component(self.entity, value);
        self
    }

    pub fn remove<T: Component>(&mut self) -> bool {
        self.scene.remove_component::<T>(self.entity)
    }

    pub fn get<T: Component>(&self) -> Option<&T> {
        self.scene.get_component::<T>(self.entity)
    }

    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.scene.get_component_mut::<T>(self.entity)
    }

    pub fn has<T: Component>(&self) -> bool {
        self.scene.has_component::<T>(self.entity)
    }

    pub fn name(&self) -> &str {
        self.scene.entity_name(self.entity).unwrap_or("")
    }

    pub fn rename(&mut self, name: &str) -> &mut Self {
        self.scene.rename_entity(self.entity, name);
        self
    }

    /// Replace the flag bits. The handle keeps tracking the entity.
    pub fn set_flags(&mut self, flags: EntityFlags) -> &mut Self {
        if let Some(updated) = self.scene.set_entity_flags(self.entity, flags) {
            self.entity = updated;
        }
        self
    }

    /// Clone the entity and return a handle to the copy.
    pub fn duplicate(self) -> Option<EntityMut<'s>> {
        let copy = self.scene.clone_entity(self.entity)?;
        Some(EntityMut {
            scene: self.scene,
            entity: copy,
        })
    }

    pub fn destroy(self) -> bool {
        self.scene.destroy_entity(self.entity)
    }

    pub fn view(&self) -> EntityRef<'_> {
        EntityRef {
            scene: self.scene,
            entity: self.entity,
        }
    }
}

impl Scene {
    /// Create a named entity and return a handle for adding components.
    pub fn spawn(&mut self, name: &str) -> EntityMut<'_> {
        let entity = self.create_entity(name);
        EntityMut {
            scene: self,
            entity,
        }
    }

    /// Handle to a live entity. `None` if the handle is stale.
    pub fn entity(&self, entity: EntityId) -> Option<EntityRef<'_>> {
        self.is_alive(entity).then_some(EntityRef {
            scene: self,
            entity,
        })
    }

    /// Mutable handle to a live entity. Logs and returns `None` if stale.
    pub fn entity_mut(&mut self, entity: EntityId) -> Option<EntityMut<'_>> {
        if !self.is_alive(entity) {
            log::warn!("no live entity {entity:?} in scene {:?}", self.id());
            return None;
        }
        Some(EntityMut {
            scene: self,
            entity,
        })
    }
}
