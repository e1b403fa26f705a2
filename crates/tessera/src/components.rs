//! # Engine Components
//!
//! The handful of components every scene understands. [`Name`] is attached
//! to every entity at creation; the rest are plain transform data for
//! renderers and gameplay code.
//!
//! Keys are short and fixed so saved scenes don't depend on module paths.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::ecs::component::{Component, ComponentSet};
use crate::ecs::{EntityId, StringIndex};

/// Display name of an entity, as an index into the scene's string table.
///
/// The scene owns the referenced string: destroying the entity or replacing
/// its `Name` releases it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Name {
    pub text: StringIndex,
}

impl Component for Name {
    fn key() -> &'static str {
        "Name"
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Position(pub Vec3);

impl Component for Position {
    fn key() -> &'static str {
        "Position"
    }
}

/// Euler angles in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Rotation(pub Vec3);

impl Component for Rotation {
    fn key() -> &'static str {
        "Rotation"
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Scale(pub Vec3);

impl Default for Scale {
    fn default() -> Self {
        Self(Vec3::ONE)
    }
}

impl Component for Scale {
    fn key() -> &'static str {
        "Scale"
    }
}

/// Draw order. Higher values draw on top.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct ZIndex {
    pub z: i32,
}

impl Component for ZIndex {
    fn key() -> &'static str {
        "ZIndex"
    }
}

/// Hierarchy link. [`EntityId::NULL`] means no parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Parent {
    pub parent: EntityId,
}

impl Component for Parent {
    fn key() -> &'static str {
        "Parent"
    }
}

/// Register every engine component. Needed before loading a saved scene in
/// a process that hasn't touched these types yet.
pub fn register_engine_components() {
    EngineComponents::register_all();
}

/// Every built-in component, as one set.
pub type EngineComponents = (Name, Position, Rotation, Scale, ZIndex, Parent);
