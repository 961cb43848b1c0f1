use lattice_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct A(u32);

#[derive(Debug, Clone, Copy, PartialEq)]
struct B(u32);

#[test]
fn migration_preserves_ticks_exactly() {
    let mut world = World::new();
    while world.current_tick() < 5 {
        world.advance_tick();
    }

    // Tick 5: spawn with A.
    let e = world.spawn_with((A(1),));
    let a = world.ticks::<A>(e).unwrap();
    assert_eq!((a.added, a.changed), (5, 5));

    // Tick 6: inserting B migrates the row; A's history travels unchanged.
    world.advance_tick();
    world.insert(e, B(1)).unwrap();
    let a = world.ticks::<A>(e).unwrap();
    let b = world.ticks::<B>(e).unwrap();
    assert_eq!((a.added, a.changed), (5, 5));
    assert_eq!((b.added, b.changed), (6, 6));

    // Tick 7: overwriting A in place bumps only its changed tick.
    world.advance_tick();
    world.insert(e, A(2)).unwrap();
    let a = world.ticks::<A>(e).unwrap();
    let b = world.ticks::<B>(e).unwrap();
    assert_eq!((a.added, a.changed), (5, 7));
    assert_eq!((b.added, b.changed), (6, 6));
}

#[test]
fn changed_filter_tracks_last_seen() {
    let mut world = World::new();

    // Tick 1: spawn.
    let e = world.spawn_with((Position { x: 0.0, y: 0.0 },));

    // Tick 2, last_seen 0: the spawn write is visible.
    world.advance_tick();
    let query = world.query1::<Position>(Filter::new().changed::<Position>());
    let seen: Vec<Entity> = query.since(0).iter().map(|(entity, _)| entity).collect();
    assert_eq!(seen, vec![e]);

    // Tick 3, last_seen 2: nothing has changed since.
    world.advance_tick();
    assert_eq!(
        world
            .query1::<Position>(Filter::new().changed::<Position>())
            .since(2)
            .count(),
        0
    );

    // Tick 4: overwrite. Tick 5, last_seen 2: visible again.
    world.advance_tick();
    world.insert(e, Position { x: 5.0, y: 0.0 }).unwrap();
    world.advance_tick();
    let query = world.query1::<Position>(Filter::new().changed::<Position>());
    let seen: Vec<Entity> = query.since(2).iter().map(|(entity, _)| entity).collect();
    assert_eq!(seen, vec![e]);
}

#[test]
fn added_filter_sees_only_new_cells() {
    let mut world = World::new();
    world.spawn_with((A(1),));

    world.advance_tick(); // tick 2
    let late = world.spawn_with((A(2),));

    // Only the entity spawned after tick 1 passes `added > 1`.
    let query = world.query1::<A>(Filter::new().added::<A>());
    let fresh: Vec<Entity> = query.since(1).iter().map(|(entity, _)| entity).collect();
    assert_eq!(fresh, vec![late]);

    // Migration does not count as an add for pre-existing components.
    world.advance_tick(); // tick 3
    world.insert(late, B(1)).unwrap();
    assert_eq!(world.query1::<A>(Filter::new().added::<A>()).since(2).count(), 0);
    assert_eq!(world.query1::<B>(Filter::new().added::<B>()).since(2).count(), 1);
}

#[test]
fn count_with_change_filters_walks_rows() {
    let mut world = World::new();
    let tracked = world.spawn_with((Position { x: 0.0, y: 0.0 }, A(1)));
    world.spawn_with((Position { x: 1.0, y: 0.0 }, A(2)));

    world.advance_tick(); // tick 2
    world.insert(tracked, Position { x: 9.0, y: 0.0 }).unwrap();

    // Same archetype for both rows, but only one passes the filter.
    assert_eq!(
        world
            .query1::<Position>(Filter::new().changed::<Position>())
            .since(1)
            .count(),
        1
    );
}

#[test]
fn get_mut_marks_change() {
    let mut world = World::new();
    let e = world.spawn_with((Position { x: 0.0, y: 0.0 },));

    world.advance_tick(); // tick 2
    world.get_mut::<Position>(e).unwrap().x = 3.0;

    assert_eq!(
        world
            .query1::<Position>(Filter::new().changed::<Position>())
            .since(1)
            .count(),
        1
    );
}
