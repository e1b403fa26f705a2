//! Common imports: `use tessera::prelude::*`.

pub use crate::components::{
    EngineComponents, Name, Parent, Position, Rotation, Scale, ZIndex,
    register_engine_components,
};
pub use crate::config::SceneConfig;
pub use crate::ecs::active::{
    SceneHandle, active_scene, clear_active_scene, create_scene, set_active_scene,
    try_active_scene, with_active_scene,
};
pub use crate::ecs::{
    CacheStats, Component, ComponentSet, EntityFlags, EntityId, EntityMut, EntityRef, QueryView,
    Scene, StringIndex, StringTable,
};
pub use crate::error::SceneError;
pub use crate::persist;

pub use bytemuck::{Pod, Zeroable};
pub use glam::Vec3;
pub use serde::{Deserialize, Serialize};
