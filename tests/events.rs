use lattice_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Damage(u32);

#[derive(Debug, Default)]
struct SeenPerTick(Vec<Vec<u32>>);

#[test]
fn events_are_double_buffered_across_ticks() {
    let mut app = App::new();
    app.add_event::<Damage>();
    app.insert_resource(SeenPerTick::default());

    // Sender fires one event during the first tick only.
    app.add_system(
        CoreStage::Update,
        SystemConfig::new(system("sender", |world, _| {
            if world.current_tick() == 1 {
                world.send_event(Damage(1))?;
            }
            Ok(())
        }))
        .before("reader"),
    );

    // Reader records what it can see each tick, after the sender ran.
    app.add_system(
        CoreStage::Update,
        system("reader", |world, _| {
            let seen: Vec<u32> = world
                .event_reader::<Damage>()?
                .iter()
                .map(|damage| damage.0)
                .collect();
            if let Some(mut log) = world.get_resource_mut::<SeenPerTick>() {
                log.0.push(seen);
            }
            Ok(())
        }),
    );

    for _ in 0..3 {
        app.tick().unwrap();
    }

    let log = app.world.get_resource::<SeenPerTick>().unwrap();
    // Same-tick reads see nothing, the next tick sees the event once,
    // after that it is gone.
    assert_eq!(log.0, vec![vec![], vec![1], vec![]]);
}

#[test]
fn unregistered_event_access_raises() {
    let world = World::new();
    let err = world.event_reader::<Damage>().unwrap_err();
    assert!(matches!(err, EcsError::UnregisteredEvent(_)));

    let mut world = World::new();
    let err = world.send_event(Damage(1)).unwrap_err();
    assert!(matches!(err, EcsError::UnregisteredEvent(_)));
}

#[test]
fn commands_can_send_events() {
    let mut app = App::new();
    app.add_event::<Damage>();
    app.insert_resource(0u32);

    app.add_system(
        CoreStage::Update,
        system("emitter", |world, commands| {
            if world.current_tick() == 1 {
                commands.send_event(Damage(7));
            }
            Ok(())
        }),
    );
    app.add_system(
        CoreStage::PostUpdate,
        system("collector", |world, _| {
            let total: u32 = world
                .event_reader::<Damage>()?
                .iter()
                .map(|damage| damage.0)
                .sum();
            if total > 0 {
                if let Some(mut sum) = world.get_resource_mut::<u32>() {
                    *sum += total;
                }
            }
            Ok(())
        }),
    );

    app.tick().unwrap();
    app.tick().unwrap();
    app.tick().unwrap();
    assert_eq!(*app.world.get_resource::<u32>().unwrap(), 7);
}

#[test]
fn event_read_writer_union() {
    let mut world = World::new();
    world.register_event::<Damage>();
    world.send_event(Damage(1)).unwrap();
    world.update_events();

    let mut both = world.event_read_writer::<Damage>().unwrap();
    let doubled: Vec<Damage> = both.iter().map(|d| Damage(d.0 * 2)).collect();
    for damage in doubled {
        both.send(damage);
    }

    world.update_events();
    let seen: Vec<u32> = world
        .event_reader::<Damage>()
        .unwrap()
        .iter()
        .map(|d| d.0)
        .collect();
    assert_eq!(seen, vec![2]);
}
