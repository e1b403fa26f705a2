//! # Component — Type-Erased Blobs and the Descriptor Registry
//!
//! Archetype columns don't know the Rust type they hold. Each column stores
//! [`ComponentData`] blobs (sized, 8-byte aligned raw bytes) and carries a
//! `&'static` [`ComponentDescriptor`]: a table of function pointers for
//! constructing, copying, serializing and printing a blob of one concrete
//! type.
//!
//! ## Why Raw Bytes?
//!
//! Moving an entity between archetypes must be a plain byte move, and scenes
//! must be able to deep-copy rows without knowing types. Components are
//! [`bytemuck::Pod`]: trivially copyable, no destructor, viewable as `&[u8]`
//! without `unsafe`. Variable-length text is stored as a
//! [`StringIndex`](super::strings::StringIndex) into the scene's string table.
//!
//! ```text
//! ComponentData { size: 12, words: [u64; 2] }
//!                 │          └─ storage rounded up to whole words (8-aligned)
//!                 └─ exact byte size of the component
//! ```
//!
//! ## Registry
//!
//! The registry is process-wide and append-only. [`register`] is idempotent
//! and is called implicitly the first time a type is added to any scene, so
//! explicit registration is only needed before loading a saved scene.
//!
//! ## Comparison
//!
//! - **bevy_ecs**: `ComponentDescriptor` with `Layout` + drop fn, `BlobVec`
//!   columns, lots of `unsafe`.
//! - **tessera**: `Pod` bound, `Box<[u64]>` blobs, zero `unsafe`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{OnceLock, PoisonError, RwLock};

use bytemuck::Pod;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Largest alignment a component may require. Blob storage is `u64` words.
pub const MAX_COMPONENT_ALIGN: usize = std::mem::align_of::<u64>();

/// A component type that can live in a scene.
///
/// Implement it with an empty `impl` block; the default [`Component::key`]
/// uses the full type path. Override `key` to keep saved scenes readable
/// across module moves.
///
/// ```ignore
/// #[derive(Clone, Copy, Debug, Pod, Zeroable, Serialize, Deserialize)]
/// #[repr(C)]
/// struct Health { hp: i32 }
/// impl Component for Health {}
/// ```
pub trait Component: Pod + Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Stable string key identifying this component type.
    fn key() -> &'static str {
        std::any::type_name::<Self>()
    }
}

// ── ComponentData ────────────────────────────────────────────────────────

/// An owned, type-erased component value.
///
/// Each blob is owned by exactly one column slot. `Clone` is a deep copy.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ComponentData {
    size: usize,
    words: Box<[u64]>,
}

impl ComponentData {
    /// An all-zero blob of `size` bytes.
    pub fn zeroed(size: usize) -> Self {
        Self {
            size,
            words: vec![0u64; size.div_ceil(8)].into_boxed_slice(),
        }
    }

    /// Copy raw bytes into a new blob.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = Self::zeroed(bytes.len());
        data.bytes_mut().copy_from_slice(bytes);
        data
    }

    /// Wrap a typed value.
    pub fn new<T: Pod>(value: T) -> Self {
        assert!(
            std::mem::align_of::<T>() <= MAX_COMPONENT_ALIGN,
            "component `{}` requires alignment {} (max {MAX_COMPONENT_ALIGN})",
            std::any::type_name::<T>(),
            std::mem::align_of::<T>()
        );
        Self::from_bytes(bytemuck::bytes_of(&value))
    }

    /// Byte size recorded in the blob header.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.size]
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.size]
    }

    /// View the blob as `T`.
    ///
    /// # Panics
    ///
    /// Panics if the blob size differs from `size_of::<T>()`. That means a
    /// column holds data of the wrong type, which is an engine bug.
    pub fn get<T: Pod>(&self) -> &T {
        self.check_size::<T>();
        bytemuck::from_bytes(self.bytes())
    }

    /// Mutable view of the blob as `T`. Same panics as [`get`](Self::get).
    pub fn get_mut<T: Pod>(&mut self) -> &mut T {
        self.check_size::<T>();
        bytemuck::from_bytes_mut(self.bytes_mut())
    }

    fn check_size<T: Pod>(&self) {
        assert_eq!(
            self.size,
            std::mem::size_of::<T>(),
            "blob size mismatch: `{}` is {} bytes, blob holds {}",
            std::any::type_name::<T>(),
            std::mem::size_of::<T>(),
            self.size
        );
    }
}

impl fmt::Debug for ComponentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentData[{}](", self.size)?;
        for byte in self.bytes() {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

// ── ComponentDescriptor ──────────────────────────────────────────────────

type ConstructFn = fn() -> ComponentData;
type CopyFn = fn(&ComponentData) -> ComponentData;
type SerializeFn = fn(&ComponentData) -> serde_json::Result<serde_json::Value>;
type DeserializeFn = fn(serde_json::Value) -> serde_json::Result<ComponentData>;
type DebugFn = fn(&ComponentData, &mut fmt::Formatter<'_>) -> fmt::Result;

/// Type-erased operations for one component type.
///
/// There is no destroy hook: `Pod` types have no drop glue, and dropping a
/// [`ComponentData`] frees its storage.
pub struct ComponentDescriptor {
    /// Unique key, from [`Component::key`].
    pub key: &'static str,
    /// Rust type name, for diagnostics.
    pub type_name: &'static str,
    pub size: usize,
    pub align: usize,
    construct: ConstructFn,
    copy: CopyFn,
    serialize: SerializeFn,
    deserialize: DeserializeFn,
    debug: DebugFn,
}

impl ComponentDescriptor {
    fn of<T: Component>() -> Self {
        Self {
            key: T::key(),
            type_name: std::any::type_name::<T>(),
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            construct: || ComponentData::new(<T as bytemuck::Zeroable>::zeroed()),
            copy: |data| ComponentData::new(*data.get::<T>()),
            serialize: |data| serde_json::to_value(data.get::<T>()),
            deserialize: |value| serde_json::from_value::<T>(value).map(ComponentData::new),
            debug: |data, f| fmt::Debug::fmt(data.get::<T>(), f),
        }
    }

    /// A zero-initialised blob of this type.
    pub fn construct(&self) -> ComponentData {
        (self.construct)()
    }

    /// Deep copy through the typed value.
    pub fn copy(&self, data: &ComponentData) -> ComponentData {
        self.check(data);
        (self.copy)(data)
    }

    pub fn serialize(&self, data: &ComponentData) -> serde_json::Result<serde_json::Value> {
        self.check(data);
        (self.serialize)(data)
    }

    pub fn deserialize(&self, value: serde_json::Value) -> serde_json::Result<ComponentData> {
        (self.deserialize)(value)
    }

    /// Debug-format a blob as its real type.
    pub fn display<'a>(&'a self, data: &'a ComponentData) -> impl fmt::Debug + 'a {
        DebugBlob {
            descriptor: self,
            data,
        }
    }

    /// Asserts the blob's size prefix matches this descriptor.
    pub fn check(&self, data: &ComponentData) {
        assert_eq!(
            data.size(),
            self.size,
            "blob of {} bytes stored in `{}` column ({} bytes)",
            data.size(),
            self.key,
            self.size
        );
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("key", &self.key)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

struct DebugBlob<'a> {
    descriptor: &'a ComponentDescriptor,
    data: &'a ComponentData,
}

impl fmt::Debug for DebugBlob<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.descriptor.debug)(self.data, f)
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

type Registry = RwLock<HashMap<&'static str, &'static ComponentDescriptor>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register `T` and return its descriptor. Calling it again is a no-op.
///
/// Descriptors are leaked: the registry lives as long as the process and
/// the set of component types is finite and small.
///
/// # Panics
///
/// Panics if `T` needs more than 8-byte alignment, or if a different type
/// with another size or type name was already registered under `T::key()`.
pub fn register<T: Component>() -> &'static ComponentDescriptor {
    let key = T::key();
    let existing = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .copied();
    if let Some(existing) = existing {
        assert_same_type::<T>(existing);
        return existing;
    }

    let mut map = registry().write().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = map.get(key).copied() {
        assert_same_type::<T>(existing);
        return existing;
    }
    assert!(
        std::mem::align_of::<T>() <= MAX_COMPONENT_ALIGN,
        "component `{key}` requires alignment {} (max {MAX_COMPONENT_ALIGN})",
        std::mem::align_of::<T>()
    );
    let descriptor: &'static ComponentDescriptor = Box::leak(Box::new(ComponentDescriptor::of::<T>()));
    map.insert(key, descriptor);
    log::debug!("registered component `{key}` ({} bytes)", descriptor.size);
    descriptor
}

fn assert_same_type<T: Component>(existing: &ComponentDescriptor) {
    assert!(
        existing.size == std::mem::size_of::<T>()
            && existing.type_name == std::any::type_name::<T>(),
        "component key `{}` already registered for `{}` ({} bytes), not `{}` ({} bytes)",
        existing.key,
        existing.type_name,
        existing.size,
        std::any::type_name::<T>(),
        std::mem::size_of::<T>()
    );
}

/// Find a descriptor by key. Logs a warning and returns `None` when the key
/// was never registered.
pub fn lookup(key: &str) -> Option<&'static ComponentDescriptor> {
    let found = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .copied();
    if found.is_none() {
        log::warn!("component `{key}` is not registered");
    }
    found
}

/// Like [`lookup`], without the warning.
pub fn is_registered(key: &str) -> bool {
    registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains_key(key)
}

// ── ComponentSet ─────────────────────────────────────────────────────────

/// A set of component types, written as a tuple: `(Position,)`,
/// `(Position, Scale)`, or `()` for the empty set.
pub trait ComponentSet {
    /// Sorted, deduplicated keys of every member.
    fn keys() -> Vec<&'static str>;

    /// Register every member with the component registry.
    fn register_all();
}

impl ComponentSet for () {
    fn keys() -> Vec<&'static str> {
        Vec::new()
    }

    fn register_all() {}
}

macro_rules! impl_component_set_tuple {
    ($($C:ident),+) => {
        impl<$($C: Component),+> ComponentSet for ($($C,)+) {
            fn keys() -> Vec<&'static str> {
                let mut keys = vec![$($C::key()),+];
                keys.sort_unstable();
                keys.dedup();
                keys
            }

            fn register_all() {
                $(register::<$C>();)+
            }
        }
    };
}

impl_component_set_tuple!(A);
impl_component_set_tuple!(A, B);
impl_component_set_tuple!(A, B, C);
impl_component_set_tuple!(A, B, C, D);
impl_component_set_tuple!(A, B, C, D, E);
impl_component_set_tuple!(A, B, C, D, E, F);
impl_component_set_tuple!(A, B, C, D, E, F, G);
impl_component_set_tuple!(A, B, C, D, E, F, G, H);
