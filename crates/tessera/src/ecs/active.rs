//! # Active Scene — The Current Scene Slot
//!
//! Engine subsystems (renderer, gameplay, scripting) reach the scene they
//! should work on through one shared slot instead of threading a `&mut Scene`
//! through every call.
//!
//! ```text
//! create_scene() ──► slot empty? ──yes──► becomes active
//! active_scene() ──► slot empty? ──yes──► warn, create, activate
//! set_active_scene(s) ──► old scene's query cache cleared, s installed
//! ```
//!
//! The slot is thread-local and holds an `Rc<RefCell<Scene>>`. ECS access is
//! single-threaded: the main thread owns the active scene, and a handle
//! obtained from one thread is never visible to another. Entity ids and
//! query results taken from a scene must not be used after switching away
//! from it without re-validating them against the new scene.
//!
//! Code that can take a `&mut Scene` directly should; the slot exists for
//! the outer layers that can't.

use std::cell::RefCell;
use std::rc::Rc;

use super::scene::Scene;

/// Shared ownership of a scene placed in (or taken from) the active slot.
pub type SceneHandle = Rc<RefCell<Scene>>;

thread_local! {
    static ACTIVE: RefCell<Option<SceneHandle>> = const { RefCell::new(None) };
}

/// Wrap a new scene in a handle. It becomes the active scene if none is set.
pub fn create_scene() -> SceneHandle {
    let scene = Rc::new(RefCell::new(Scene::new()));
    ACTIVE.with_borrow_mut(|active| {
        if active.is_none() {
            log::info!("scene {:?} is now active", scene.borrow().id());
            *active = Some(Rc::clone(&scene));
        }
    });
    scene
}

/// The active scene, creating one (with a warning) if the slot is empty.
pub fn active_scene() -> SceneHandle {
    if let Some(scene) = try_active_scene() {
        return scene;
    }
    log::warn!("no active scene; creating an empty one");
    let scene = Rc::new(RefCell::new(Scene::new()));
    ACTIVE.with_borrow_mut(|active| *active = Some(Rc::clone(&scene)));
    scene
}

/// The active scene, if any. Never creates one.
pub fn try_active_scene() -> Option<SceneHandle> {
    ACTIVE.with_borrow(|active| active.clone())
}

/// Install `scene` as the active scene and return the previous one.
///
/// The outgoing scene's query cache is cleared; entity ids obtained from it
/// stay meaningful only for that scene.
pub fn set_active_scene(scene: SceneHandle) -> Option<SceneHandle> {
    let previous = ACTIVE.with_borrow_mut(|active| active.replace(Rc::clone(&scene)));
    if let Some(previous) = &previous {
        if Rc::ptr_eq(previous, &scene) {
            return Some(Rc::clone(previous));
        }
        deactivate(previous);
    }
    log::info!("scene {:?} is now active", scene.borrow().id());
    previous
}

/// Empty the slot and return what was in it.
pub fn clear_active_scene() -> Option<SceneHandle> {
    let previous = ACTIVE.with_borrow_mut(Option::take);
    if let Some(previous) = &previous {
        deactivate(previous);
    }
    previous
}

/// `true` if `scene` is the active scene.
pub fn is_active(scene: &SceneHandle) -> bool {
    ACTIVE.with_borrow(|active| active.as_ref().is_some_and(|a| Rc::ptr_eq(a, scene)))
}

/// Run `f` against the active scene (created on demand).
///
/// # Panics
///
/// Panics if the active scene is already borrowed, e.g. when called from
/// inside another `with_active_scene` closure.
pub fn with_active_scene<R>(f: impl FnOnce(&mut Scene) -> R) -> R {
    let scene = active_scene();
    let mut guard = scene.borrow_mut();
    f(&mut guard)
}

fn deactivate(scene: &SceneHandle) {
    match scene.try_borrow_mut() {
        Ok(mut scene) => {
            scene.on_deactivate();
            log::debug!("scene {:?} deactivated", scene.id());
        }
        Err(_) => log::warn!("outgoing scene is borrowed; its query cache was not cleared"),
    }
}
