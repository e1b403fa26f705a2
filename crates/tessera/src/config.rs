//! Per-scene settings.
//!
//! ```json
//! { "default_entity_name": "Actor", "cache_queries": false }
//! ```
//!
//! Every field is optional; missing ones take their [`Default`] value.

use serde::{Deserialize, Serialize};

use crate::error::SceneError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Name given by [`Scene::create_entity_default`](crate::ecs::Scene::create_entity_default).
    pub default_entity_name: String,
    /// When `false`, `cached_query` evaluates fresh on every call.
    pub cache_queries: bool,
    /// Re-check row/column and directory invariants after every structural
    /// mutation, panicking on the first violation. Slow; meant for tests.
    pub validate_mutations: bool,
}

impl SceneConfig {
    pub fn from_json_str(text: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            default_entity_name: "New Entity".to_owned(),
            cache_queries: true,
            validate_mutations: cfg!(debug_assertions),
        }
    }
}
