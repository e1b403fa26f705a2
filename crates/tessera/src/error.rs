//! Errors for the fallible edges of the engine: loading saved scenes and
//! prefabs, and parsing configuration.
//!
//! Everyday ECS misuse (stale handles, missing components) is not an error
//! here. Those calls log a warning and return `None`/`false` instead.

use thiserror::Error;

use crate::ecs::EntityId;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("component `{0}` is not registered")]
    UnregisteredComponent(String),

    #[error("component `{key}` could not be decoded: {source}")]
    Component {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("archetype {archetype}: expected {expected} values, found {found}")]
    ColumnLength {
        archetype: usize,
        expected: usize,
        found: usize,
    },

    #[error("entity {0} appears more than once")]
    DuplicateEntity(EntityId),

    #[error("entity {0} is not alive")]
    UnknownEntity(EntityId),

    #[error("scene is inconsistent: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
