//! # Tessera — Archetype ECS Storage Engine
//!
//! The storage layer of a game engine: entities, type-erased components
//! grouped into archetype tables, a string interner for component text, and
//! cached queries that stay correct across structural changes.
//!
//! Start with `use tessera::prelude::*` and a [`Scene`](ecs::Scene).
//!
//! ```ignore
//! let mut scene = Scene::new();
//! let player = scene.spawn("player").add(Position(Vec3::ZERO)).id();
//! for e in scene.query::<(Position,)>() { ... }
//! ```

pub mod components;
pub mod config;
pub mod ecs;
pub mod error;
pub mod persist;
pub mod prelude;

/// Install an `env_logger` backend reading `RUST_LOG`, defaulting to `info`.
/// Later calls are ignored.
pub fn init_logger() {
    let env = env_logger::Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("logger already initialised");
    }
}
