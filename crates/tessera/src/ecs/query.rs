//! # Query — Which Entities Have These Components?
//!
//! A query names a set of component keys and yields every entity whose
//! archetype holds all of them. Matching works on archetypes, not entities:
//!
//! 1. For the rarest required key, walk the archetypes that contain it
//!    (from the [`ComponentDirectory`]).
//! 2. Keep the ones that also have a column for every other key.
//! 3. Concatenate their `entities` lists in archetype creation order.
//!
//! ## Caching
//!
//! [`QueryCache`] memoizes step 1–2 (the list of matching archetype ids),
//! keyed by the sorted key list. A [`QueryView`] reads each matched
//! archetype's live `entities` slice, so spawns, despawns, and row moves
//! inside already-matched archetypes are visible without touching the cache.
//!
//! The one thing a cached id list can miss is a *new* archetype that also
//! matches. The scene reports every archetype it creates to
//! [`QueryCache::archetype_created`], which drops each cached entry whose
//! key is a subset of the new archetype's key. The next lookup rebuilds it.
//!
//! ## Comparison
//!
//! - **bevy_ecs**: `QueryState` stores matched archetypes and updates them
//!   incrementally by comparing archetype generations.
//! - **tessera**: evict on archetype creation, rebuild on demand. Archetype
//!   creation is rare once a game is running.

use std::collections::HashMap;

use super::archetype::{Archetype, ArchetypeId};
use super::component;
use super::directory::ComponentDirectory;
use super::entity::EntityId;

/// Archetypes matching `required` (sorted keys), in creation order. The
/// empty set matches every archetype.
pub(crate) fn matching_archetypes(
    archetypes: &[Archetype],
    directory: &ComponentDirectory,
    required: &[&'static str],
) -> Vec<ArchetypeId> {
    let Some(rarest) = required
        .iter()
        .copied()
        .min_by_key(|key| directory.archetype_count(key))
    else {
        return archetypes.iter().map(Archetype::id).collect();
    };

    for key in required {
        if !directory.knows(key) && !component::is_registered(key) {
            log::warn!("query for unregistered component `{key}`");
            return Vec::new();
        }
    }

    directory
        .archetypes_containing(rarest)
        .filter(|&id| {
            required
                .iter()
                .all(|key| directory.column_of(id, key).is_some())
        })
        .collect()
}

/// Hit/miss counters for a [`QueryCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped because a new archetype matched them.
    pub invalidations: u64,
}

/// Memoized archetype matches, keyed by sorted component keys.
#[derive(Default, Debug)]
pub struct QueryCache {
    entries: HashMap<Vec<&'static str>, Vec<ArchetypeId>>,
    stats: CacheStats,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached matches for `required`, computing and storing them on a miss.
    pub(crate) fn get_or_build(
        &mut self,
        required: Vec<&'static str>,
        archetypes: &[Archetype],
        directory: &ComponentDirectory,
    ) -> &[ArchetypeId] {
        use std::collections::hash_map::Entry;
        match self.entries.entry(required) {
            Entry::Occupied(entry) => {
                self.stats.hits += 1;
                entry.into_mut().as_slice()
            }
            Entry::Vacant(entry) => {
                self.stats.misses += 1;
                let matched = matching_archetypes(archetypes, directory, entry.key());
                log::trace!(
                    "query cache miss for {:?}: {} archetypes",
                    entry.key(),
                    matched.len()
                );
                entry.insert(matched).as_slice()
            }
        }
    }

    /// Drop every entry the new archetype would have matched.
    pub(crate) fn archetype_created(&mut self, archetype: &Archetype) {
        let before = self.entries.len();
        self.entries
            .retain(|required, _| !archetype.contains_all(required));
        let dropped = (before - self.entries.len()) as u64;
        if dropped > 0 {
            log::debug!(
                "{:?} {:?} invalidated {dropped} cached queries",
                archetype.id(),
                archetype.key()
            );
        }
        self.stats.invalidations += dropped;
    }

    /// Forget everything (scene deactivation).
    pub fn clear(&mut self) {
        self.stats.invalidations += self.entries.len() as u64;
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// A live view over the entities of a fixed list of archetypes.
///
/// Borrowing the scene keeps the matched list valid for the view's lifetime.
pub struct QueryView<'s> {
    archetypes: &'s [Archetype],
    matched: MatchedIds<'s>,
}

enum MatchedIds<'s> {
    Cached(&'s [ArchetypeId]),
    Owned(Vec<ArchetypeId>),
}

impl<'s> QueryView<'s> {
    pub(crate) fn cached(archetypes: &'s [Archetype], matched: &'s [ArchetypeId]) -> Self {
        Self {
            archetypes,
            matched: MatchedIds::Cached(matched),
        }
    }

    pub(crate) fn owned(archetypes: &'s [Archetype], matched: Vec<ArchetypeId>) -> Self {
        Self {
            archetypes,
            matched: MatchedIds::Owned(matched),
        }
    }

    /// Matched archetype ids, in creation order.
    pub fn archetype_ids(&self) -> &[ArchetypeId] {
        match &self.matched {
            MatchedIds::Cached(ids) => ids,
            MatchedIds::Owned(ids) => ids,
        }
    }

    /// Entity slices of each matched archetype.
    pub fn chunks(&self) -> impl Iterator<Item = &'s [EntityId]> + '_ {
        let archetypes = self.archetypes;
        self.archetype_ids()
            .iter()
            .map(move |id| archetypes[id.index()].entities())
    }

    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.chunks().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.chunks().map(<[EntityId]>::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<EntityId> {
        self.iter().collect()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.iter().any(|e| e.same_entity(entity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Component, register};
    use bytemuck::{Pod, Zeroable};
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, Pod, Zeroable, Serialize, Deserialize)]
    #[repr(C)]
    struct Red(u32);
    impl Component for Red {}

    #[derive(Clone, Copy, Debug, Pod, Zeroable, Serialize, Deserialize)]
    #[repr(C)]
    struct Green(u32);
    impl Component for Green {}

    fn world() -> (Vec<Archetype>, ComponentDirectory) {
        let archetypes = vec![
            Archetype::new(ArchetypeId(0), vec![register::<Red>()]),
            Archetype::new(ArchetypeId(1), vec![register::<Green>()]),
            Archetype::new(ArchetypeId(2), vec![register::<Red>(), register::<Green>()]),
        ];
        let mut directory = ComponentDirectory::new();
        for archetype in &archetypes {
            directory.register_archetype(archetype);
        }
        (archetypes, directory)
    }

    fn sorted(mut keys: Vec<&'static str>) -> Vec<&'static str> {
        keys.sort_unstable();
        keys
    }

    #[test]
    fn matches_supersets_in_creation_order() {
        let (archetypes, directory) = world();
        assert_eq!(
            matching_archetypes(&archetypes, &directory, &[Red::key()]),
            vec![ArchetypeId(0), ArchetypeId(2)]
        );
        assert_eq!(
            matching_archetypes(&archetypes, &directory, &sorted(vec![Red::key(), Green::key()])),
            vec![ArchetypeId(2)]
        );
    }

    #[test]
    fn empty_set_matches_everything() {
        let (archetypes, directory) = world();
        assert_eq!(matching_archetypes(&archetypes, &directory, &[]).len(), 3);
    }

    #[test]
    fn unregistered_key_matches_nothing() {
        let (archetypes, directory) = world();
        assert!(matching_archetypes(&archetypes, &directory, &["query_tests::Missing"]).is_empty());
    }

    #[test]
    fn cache_hits_after_first_build() {
        let (archetypes, directory) = world();
        let mut cache = QueryCache::new();
        let first = cache.get_or_build(vec![Green::key()], &archetypes, &directory).to_vec();
        let second = cache.get_or_build(vec![Green::key()], &archetypes, &directory).to_vec();
        assert_eq!(first, second);
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn new_matching_archetype_evicts_entry() {
        let (archetypes, directory) = world();
        let mut cache = QueryCache::new();
        cache.get_or_build(vec![Red::key()], &archetypes, &directory);
        cache.get_or_build(vec![Green::key()], &archetypes, &directory);

        let red_only = Archetype::new(ArchetypeId(3), vec![register::<Red>()]);
        cache.archetype_created(&red_only);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn view_reads_live_entity_lists() {
        let (archetypes, _) = world();
        let ids = vec![ArchetypeId(0), ArchetypeId(2)];
        let view = QueryView::owned(&archetypes, ids);
        assert!(view.is_empty());
        assert_eq!(view.archetype_ids().len(), 2);
    }
}
