//! # Archetype-Based ECS Storage
//!
//! Entities are packed 64-bit ids. Components are `Pod` values stored as
//! type-erased blobs in per-archetype columns. A [`Scene`] owns the whole
//! store and keeps its directories coherent across structural changes.
//!
//! ## Module Overview
//!
//! - [`entity`] — Packed ids (index, generation, flags) and their allocator
//! - [`component`] — `Component` trait, blobs, descriptor registry
//! - [`strings`] — Per-scene string interner
//! - [`archetype`] — Column tables with swap-and-pop removal
//! - [`directory`] — Entity and component lookup tables
//! - [`query`] — Fresh and cached multi-component queries
//! - [`scene`] — The aggregate root and all structural mutations
//! - [`handle`] — Borrowed `EntityRef` / `EntityMut` handles
//! - [`active`] — The thread-local active-scene slot

pub mod active;
pub mod archetype;
pub mod component;
pub mod directory;
pub mod entity;
pub mod handle;
pub mod query;
pub mod scene;
pub mod strings;

pub use active::{SceneHandle, active_scene, create_scene, set_active_scene, with_active_scene};
pub use archetype::{Archetype, ArchetypeId};
pub use component::{Component, ComponentData, ComponentDescriptor, ComponentSet, register};
pub use entity::{EntityFlags, EntityId};
pub use handle::{EntityMut, EntityRef};
pub use query::{CacheStats, QueryView};
pub use scene::{Scene, SceneId};
pub use strings::{StringIndex, StringTable};
