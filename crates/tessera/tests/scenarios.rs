//! End-to-end scenarios against the public scene API.

use tessera::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
struct A {
    value: u32,
}
impl Component for A {}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
struct B {
    value: f32,
}
impl Component for B {}

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
struct C {
    x: i64,
    y: i64,
}
impl Component for C {}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sorted(mut ids: Vec<EntityId>) -> Vec<EntityId> {
    ids.sort();
    ids
}

#[test]
fn name_only_entities_and_one_position() {
    init();
    let mut scene = Scene::new();
    let e1 = scene.create_entity("e1");
    let e2 = scene.create_entity("e2");
    let e3 = scene.create_entity("e3");

    assert!(scene.add_component(e2, Position(Vec3::ZERO)));

    assert_eq!(scene.query::<(Position,)>(), vec![e2]);
    assert_eq!(sorted(scene.query::<(Name,)>()), sorted(vec![e1, e2, e3]));
    assert_eq!(scene.cached_query::<(Position,)>().to_vec(), vec![e2]);
}

#[test]
fn removing_middle_component_keeps_the_rest() {
    init();
    let mut scene = Scene::new();
    let e = scene.create_entity("abc");
    scene.add_component(e, A { value: 11 });
    scene.add_component(e, B { value: 2.5 });
    scene.add_component(e, C { x: -4, y: 9 });

    let a_before = *scene.get_component::<A>(e).unwrap();
    let c_before = *scene.get_component::<C>(e).unwrap();

    assert!(scene.remove_component::<B>(e));
    assert!(!scene.has_component::<B>(e));
    assert_eq!(scene.get_component::<B>(e), None);
    assert_eq!(scene.get_component::<A>(e), Some(&a_before));
    assert_eq!(scene.get_component::<C>(e), Some(&c_before));
    assert_eq!(scene.entity_name(e), Some("abc"));
}

#[test]
fn destroying_middle_entity_keeps_others_values() {
    init();
    let mut scene = Scene::new();
    let entities: Vec<EntityId> = (0..5)
        .map(|i| {
            scene
                .spawn(&format!("e{}", i + 1))
                .add(A { value: i * 100 })
                .add(C { x: i as i64, y: -(i as i64) })
                .id()
        })
        .collect();
    let archetype = scene.entity_record(entities[0]).unwrap().archetype;

    assert!(scene.destroy_entity(entities[2]));

    assert_eq!(scene.archetype(archetype).unwrap().len(), 4);
    for (i, &e) in entities.iter().enumerate() {
        if i == 2 {
            assert!(!scene.is_alive(e));
            continue;
        }
        let i = i as u32;
        assert_eq!(scene.get_component::<A>(e), Some(&A { value: i * 100 }));
        assert_eq!(
            scene.get_component::<C>(e),
            Some(&C { x: i as i64, y: -(i as i64) })
        );
        assert_eq!(scene.entity_name(e).unwrap(), format!("e{}", i + 1));
    }
    scene.check_invariants().unwrap();
}

#[test]
fn released_string_reads_empty() {
    init();
    let mut table = StringTable::new();
    let k = table.intern("hello");
    assert_eq!(table.get(k), "hello");
    table.release(k);
    assert_eq!(table.get(k), "");

    // Out-of-range reads and releasing the empty slot fall back instead of
    // failing. Both paths log a warning, which is not captured here.
    assert_eq!(table.get(StringIndex(9_999)), "");
    table.release(StringIndex::EMPTY);
    assert_eq!(table.get(StringIndex::EMPTY), "");
    assert_eq!(table.intern("hello"), k);
}

#[test]
fn double_destroy_is_a_warning_not_a_crash() {
    init();
    let mut scene = Scene::new();
    let e = scene.create_entity("once");
    assert!(scene.destroy_entity(e));
    assert!(!scene.destroy_entity(e));
    assert!(!scene.remove_component::<Name>(e));
    assert_eq!(scene.entity_count(), 0);
}

#[test]
fn cached_query_follows_growth_and_new_archetypes() {
    init();
    let mut scene = Scene::new();
    let first = scene.spawn("first").add(A { value: 1 }).id();
    assert_eq!(scene.cached_query::<(A,)>().len(), 1);

    // Growth of an already-matched archetype needs no invalidation.
    let second = scene.spawn("second").add(A { value: 2 }).id();
    let before = scene.cache_stats();
    assert_eq!(scene.cached_query::<(A,)>().len(), 2);
    assert_eq!(scene.cache_stats().hits, before.hits + 1);

    // A brand-new matching archetype must show up too.
    let third = scene.spawn("third").add(A { value: 3 }).add(B { value: 0.0 }).id();
    let view = scene.cached_query::<(A,)>();
    assert_eq!(sorted(view.to_vec()), sorted(vec![first, second, third]));

    // A new archetype that does not match leaves the entry alone.
    let stats = scene.cache_stats();
    scene.spawn("other").add(C { x: 0, y: 0 });
    assert_eq!(scene.cache_stats().invalidations, stats.invalidations);
}

#[test]
fn query_on_unregistered_type_is_empty() {
    init();
    #[derive(Clone, Copy, Debug, Pod, Zeroable, Serialize, Deserialize)]
    #[repr(C)]
    struct NeverUsed(u8);
    impl Component for NeverUsed {}

    let mut scene = Scene::new();
    scene.create_entity("a");
    assert!(scene.query::<(NeverUsed,)>().is_empty());
    assert!(scene.cached_query::<(NeverUsed, Name)>().is_empty());
}

#[test]
fn active_scene_lifecycle() {
    init();
    let scene = create_scene();
    let e = with_active_scene(|s| s.spawn("hero").add(ZIndex { z: 3 }).id());
    assert_eq!(scene.borrow().get_component::<ZIndex>(e), Some(&ZIndex { z: 3 }));

    let next = create_scene();
    set_active_scene(next.clone());
    // The old handle does not resolve in the new scene.
    assert!(with_active_scene(|s| !s.is_alive(e)));
    assert!(scene.borrow().is_alive(e));
}
