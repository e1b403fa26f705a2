//! # Entity — Packed 64-bit Identifiers
//!
//! An [`EntityId`] is a plain `u64` handle. It owns nothing; the
//! [`Scene`](super::scene::Scene) maps it to a row in some archetype.
//!
//! ## Bit Layout
//!
//! ```text
//!  63    60 59                      32 31                              0
//! ┌────────┬──────────────────────────┬─────────────────────────────────┐
//! │ flags  │ generation (28 bits)     │ index (32 bits)                 │
//! └────────┴──────────────────────────┴─────────────────────────────────┘
//! ```
//!
//! The generation counter is bumped every time a slot is freed, so a handle
//! kept past `destroy_entity` no longer matches the slot and every lookup
//! rejects it. The flag bits carry per-entity state (e.g. disabled) and are
//! ignored when comparing identity against the directory.
//!
//! Index `0` is never handed out: the all-zero value is [`EntityId::NULL`],
//! which lets a zeroed component field (like `Parent`) mean "no entity".

use std::collections::HashSet;
use std::fmt;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

const INDEX_BITS: u32 = 32;
const GENERATION_BITS: u32 = 28;
const FLAG_SHIFT: u32 = INDEX_BITS + GENERATION_BITS;

const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: u32 = (1 << GENERATION_BITS) - 1;
const FLAG_MASK: u8 = 0x0F;

/// Four state bits stored in the top of an [`EntityId`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Serialize, Deserialize)]
pub struct EntityFlags(u8);

impl EntityFlags {
    pub const NONE: Self = Self(0);
    /// The entity is excluded from gameplay updates.
    pub const DISABLED: Self = Self(0b0001);
    /// The entity is skipped by renderers.
    pub const HIDDEN: Self = Self(0b0010);

    /// Builds flags from raw bits. Bits above the low four are discarded.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & FLAG_MASK)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

/// A packed entity handle: index, generation, and flags in one `u64`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Pod, Zeroable)]
#[derive(Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// The null handle. Never allocated, never alive.
    pub const NULL: Self = Self(0);

    pub const fn new(index: u32, generation: u32, flags: EntityFlags) -> Self {
        Self(
            index as u64
                | (((generation & GENERATION_MASK) as u64) << INDEX_BITS)
                | ((flags.0 as u64) << FLAG_SHIFT),
        )
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Slot index. Unique among live entities of one scene.
    pub const fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    pub const fn generation(self) -> u32 {
        ((self.0 >> INDEX_BITS) as u32) & GENERATION_MASK
    }

    pub const fn flags(self) -> EntityFlags {
        EntityFlags::from_bits((self.0 >> FLAG_SHIFT) as u8)
    }

    /// Same index and generation, different flags.
    pub const fn with_flags(self, flags: EntityFlags) -> Self {
        Self::new(self.index(), self.generation(), flags)
    }

    pub const fn is_null(self) -> bool {
        self.index() == 0
    }

    /// Identity comparison that ignores flag bits.
    pub const fn same_entity(self, other: Self) -> bool {
        self.index() == other.index() && self.generation() == other.generation()
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flags() == EntityFlags::NONE {
            write!(f, "EntityId({}v{})", self.index(), self.generation())
        } else {
            write!(
                f,
                "EntityId({}v{} f{:04b})",
                self.index(),
                self.generation(),
                self.flags().bits()
            )
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// Hands out entity indices and tracks their generations.
///
/// ```text
/// generations: [-, 0, 1, 0, 2]   ← slot 0 is the null handle, never used
/// free_list:   [2, 4]            ← slots available for reuse
/// ```
///
/// Allocating pops `free_list` (most recently freed first) before growing.
/// Freeing bumps the slot's generation (wrapping at 28 bits).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityAllocator {
    generations: Vec<u32>,
    free_list: Vec<u32>,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            generations: vec![0],
            free_list: Vec::new(),
        }
    }

    /// Allocate a fresh [`EntityId`] with no flags set.
    pub fn allocate(&mut self) -> EntityId {
        if let Some(index) = self.free_list.pop() {
            let generation = self.generations[index as usize];
            EntityId::new(index, generation, EntityFlags::NONE)
        } else {
            let index = u32::try_from(self.generations.len())
                .unwrap_or_else(|_| panic!("entity index space exhausted"));
            self.generations.push(0);
            EntityId::new(index, 0, EntityFlags::NONE)
        }
    }

    /// Free a live entity's slot. Returns `false` if the handle was stale.
    pub fn deallocate(&mut self, entity: EntityId) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = &mut self.generations[entity.index() as usize];
        *slot = slot.wrapping_add(1) & GENERATION_MASK;
        self.free_list.push(entity.index());
        true
    }

    /// Generation check only. A hand-built handle that guesses the next
    /// generation of a freed slot passes; the scene's directory rejects it.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        let idx = entity.index() as usize;
        idx != 0
            && idx < self.generations.len()
            && self.generations[idx] == entity.generation()
    }

    pub fn alive_count(&self) -> usize {
        self.generations.len() - 1 - self.free_list.len()
    }

    #[cfg(any(feature = "diagnostics", test))]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Number of slots ever handed out.
    #[cfg(any(feature = "diagnostics", test))]
    pub fn total_slots(&self) -> usize {
        self.generations.len() - 1
    }

    /// Slot 0 is reserved and every free index names a distinct real slot.
    /// Only deserialized allocators can break this.
    pub(crate) fn is_well_formed(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.free_list.len());
        !self.generations.is_empty()
            && self.free_list.len() < self.generations.len()
            && self
                .free_list
                .iter()
                .all(|&i| i != 0 && (i as usize) < self.generations.len() && seen.insert(i))
    }

    /// Indices waiting for reuse, next one last.
    pub(crate) fn free_indices(&self) -> &[u32] {
        &self.free_list
    }

    /// Generation a slot currently expects. Used by persistence to reject
    /// snapshots whose entity handles disagree with the allocator state.
    pub(crate) fn generation_of(&self, index: u32) -> Option<u32> {
        if index == 0 {
            return None;
        }
        self.generations.get(index as usize).copied()
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}
