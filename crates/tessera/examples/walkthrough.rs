//! Walkthrough — build a small scene, query it, save it, and load it back.
//!
//! Run with: `RUST_LOG=debug cargo run -p tessera --example walkthrough`

use tessera::prelude::*;

const SAVE_PATH: &str = "/tmp/tessera_walkthrough.json";

// ── Game components ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
struct Velocity(Vec3);
impl Component for Velocity {}

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
struct Health {
    current: i32,
    max: i32,
}
impl Component for Health {}

fn main() -> Result<(), SceneError> {
    tessera::init_logger();

    let scene = create_scene();
    let player = with_active_scene(|scene| {
        let player = scene
            .spawn("player")
            .add(Position(Vec3::ZERO))
            .add(Velocity(Vec3::new(1.0, 0.0, 0.0)))
            .add(Health { current: 10, max: 10 })
            .id();
        for i in 0..4 {
            scene
                .spawn(&format!("rock{i}"))
                .add(Position(Vec3::new(i as f32 * 2.0, 0.0, 5.0)))
                .add(ZIndex { z: -1 });
        }
        player
    });

    // Integrate velocities for a few ticks.
    {
        let mut scene = scene.borrow_mut();
        for _ in 0..3 {
            for e in scene.query::<(Position, Velocity)>() {
                let Some(&Velocity(v)) = scene.get_component::<Velocity>(e) else {
                    continue;
                };
                if let Some(Position(p)) = scene.get_component_mut::<Position>(e) {
                    *p += v;
                }
            }
        }
        let rocks = scene.cached_query::<(Position, ZIndex)>().len();
        log::info!("{rocks} rocks, player at {:?}", scene.get_component::<Position>(player));

        // Structural churn: the player loses velocity, a rock is destroyed.
        scene.remove_component::<Velocity>(player);
        if let Some(rock) = scene.find_entity_by_name("rock2") {
            scene.destroy_entity(rock);
        }
        scene.dump();
        scene.check_invariants()?;
    }

    persist::save_to_file(&scene.borrow(), SAVE_PATH)?;
    let restored = persist::load_from_file(SAVE_PATH)?;
    log::info!(
        "reloaded {} entities in {} archetypes; player health {:?}",
        restored.entity_count(),
        restored.archetype_count(),
        restored.get_component::<Health>(player)
    );

    let prefab = persist::save_prefab(&restored, player)?;
    log::info!("player prefab: {}", serde_json::to_string_pretty(&prefab)?);

    set_active_scene(std::rc::Rc::new(std::cell::RefCell::new(restored)));
    Ok(())
}
