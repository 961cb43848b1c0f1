use lattice_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[test]
fn basic_spawn_and_query_counts() {
    let mut world = World::new();

    for i in 0..3 {
        world.spawn_with((Position { x: i as f32, y: 0.0 },));
    }
    for i in 0..2 {
        world.spawn_with((
            Position { x: i as f32, y: 1.0 },
            Velocity { dx: 1.0, dy: 0.0 },
        ));
    }

    assert_eq!(world.query2::<Position, Velocity>(Filter::new()).count(), 2);
    assert_eq!(world.query1::<Position>(Filter::new()).count(), 5);
}

#[test]
fn despawn_swap_remove_updates_locations() {
    let mut world = World::new();
    let e1 = world.spawn_with((Position { x: 1.0, y: 0.0 },));
    let e2 = world.spawn_with((Position { x: 2.0, y: 0.0 },));
    let e3 = world.spawn_with((Position { x: 3.0, y: 0.0 },));

    assert!(world.despawn(e2));

    assert!(world.is_alive(e1));
    assert!(world.is_alive(e3));
    assert_eq!(world.query1::<Position>(Filter::new()).count(), 2);

    // e3 took over e2's old row; both survivors stay queryable with their
    // own data.
    let e3_location = world.get_location(e3).unwrap();
    assert_eq!(e3_location.row, 1);
    assert_eq!(world.get::<Position>(e1), Some(&Position { x: 1.0, y: 0.0 }));
    assert_eq!(world.get::<Position>(e3), Some(&Position { x: 3.0, y: 0.0 }));
}

#[test]
fn query_iteration_is_archetype_then_row_ordered() {
    let mut world = World::new();
    let a = world.spawn_with((Position { x: 0.0, y: 0.0 },));
    let b = world.spawn_with((Position { x: 1.0, y: 0.0 },));
    let c = world.spawn_with((Position { x: 2.0, y: 0.0 }, Velocity { dx: 0.0, dy: 0.0 }));

    let mut query = world.query1::<Position>(Filter::new());
    let visited: Vec<Entity> = query.iter().map(|(entity, _)| entity).collect();
    drop(query);

    // Plain-Position archetype was created first, so its rows come first.
    assert_eq!(visited, vec![a, b, c]);

    // Stable across repeated iteration.
    let mut query = world.query1::<Position>(Filter::new());
    let again: Vec<Entity> = query.iter().map(|(entity, _)| entity).collect();
    assert_eq!(visited, again);
}

#[test]
fn spawn_batch_shares_one_archetype() {
    let mut world = World::new();
    let spawned = world.spawn_batch((0..100).map(|i| (Position { x: i as f32, y: 0.0 },)));
    assert_eq!(spawned.len(), 100);
    assert_eq!(world.query1::<Position>(Filter::new()).count(), 100);

    let first = world.get_location(spawned[0]).unwrap().archetype_index;
    for &entity in &spawned {
        assert_eq!(world.get_location(entity).unwrap().archetype_index, first);
    }
}

#[test]
fn mixed_filters_compose() {
    let mut world = World::new();
    world.spawn_with((Position { x: 0.0, y: 0.0 }, Velocity { dx: 0.0, dy: 0.0 }));
    world.spawn_with((Position { x: 1.0, y: 0.0 },));

    let moving = world
        .query1::<Position>(Filter::new().with::<Velocity>())
        .count();
    let still = world
        .query1::<Position>(Filter::new().without::<Velocity>())
        .count();
    assert_eq!((moving, still), (1, 1));
}
