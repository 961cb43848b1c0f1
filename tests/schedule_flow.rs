use std::sync::{Arc, Mutex};

use lattice_ecs::prelude::*;
use lattice_ecs::FunctionSystem;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Shadow;

fn recorder(
    log: &Arc<Mutex<Vec<&'static str>>>,
    name: &'static str,
) -> FunctionSystem<impl FnMut(&mut World, &mut Commands) -> Result<()>> {
    let log = log.clone();
    FunctionSystem::new(SystemMeta::new(name), move |_world, _commands| {
        log.lock().unwrap().push(name);
        Ok(())
    })
}

#[test]
fn stage_and_constraint_order_is_total() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut app = App::new();

    app.add_system(CoreStage::PostUpdate, recorder(&log, "post"));
    app.add_system(
        CoreStage::Update,
        SystemConfig::new(recorder(&log, "late_update")).after("early_update"),
    );
    app.add_system(CoreStage::Update, recorder(&log, "early_update"));
    app.add_system(CoreStage::First, recorder(&log, "first"));

    app.tick().unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["first", "early_update", "late_update", "post"]
    );
}

#[test]
fn command_buffers_drain_between_systems() {
    let mut app = App::new();
    app.insert_resource(0u32);

    // Producer spawns through its command buffer; the consumer, ordered
    // after it in the same stage, must observe the entity the same tick.
    app.add_system(
        CoreStage::Update,
        SystemConfig::new(system("producer", |world, commands| {
            if world.current_tick() == 1 {
                commands.spawn_with((Position { x: 1.0 },));
            }
            Ok(())
        }))
        .before("consumer"),
    );
    app.add_system(
        CoreStage::Update,
        system("consumer", |world, _| {
            let count = world.query1::<Position>(Filter::new()).count() as u32;
            if let Some(mut seen) = world.get_resource_mut::<u32>() {
                *seen = count;
            }
            Ok(())
        }),
    );

    app.tick().unwrap();
    assert_eq!(*app.world.get_resource::<u32>().unwrap(), 1);
}

#[test]
fn observer_commands_drain_after_triggering_system() {
    let mut app = App::new();
    app.insert_resource(false);

    app.world.observe_add::<Position>(|_, entity, commands| {
        commands.entity(entity).insert(Shadow);
    });

    app.add_system(
        CoreStage::Update,
        SystemConfig::new(system("spawner", |world, commands| {
            if world.current_tick() == 1 {
                commands.spawn_with((Position { x: 0.0 },));
            }
            Ok(())
        }))
        .before("checker"),
    );
    app.add_system(
        CoreStage::Update,
        system("checker", |world, _| {
            let shadowed = world.query1::<Shadow>(Filter::new()).count() == 1;
            if shadowed {
                if let Some(mut flag) = world.get_resource_mut::<bool>() {
                    *flag = true;
                }
            }
            Ok(())
        }),
    );

    app.tick().unwrap();
    assert!(
        *app.world.get_resource::<bool>().unwrap(),
        "observer-queued insert must be visible to the next system"
    );
}

#[test]
fn exclusive_system_sees_quiesced_world() {
    let mut app = App::new();
    app.insert_resource(false);

    app.world.observe_add::<Position>(|_, entity, commands| {
        commands.entity(entity).insert(Shadow);
    });

    // Direct mutation outside any system leaves observer commands pending.
    let entity = app.world.spawn_with((Position { x: 0.0 },));

    app.add_system(
        CoreStage::Update,
        FunctionSystem::new(
            SystemMeta::new("exclusive_check").exclusive(),
            move |world, _| {
                if world.has::<Shadow>(entity) {
                    if let Some(mut flag) = world.get_resource_mut::<bool>() {
                        *flag = true;
                    }
                }
                Ok(())
            },
        ),
    );

    app.tick().unwrap();
    assert!(
        *app.world.get_resource::<bool>().unwrap(),
        "pending buffers must drain before an exclusive system runs"
    );
}

#[test]
fn run_conditions_compose_with_set_conditions() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut app = App::new();

    app.configure_set(
        SystemSet::new("combat")
            .in_stage(CoreStage::Update)
            .run_if(|world| world.has_resource::<u8>()),
    );

    let sink = log.clone();
    app.add_system_to_set(
        "combat",
        FunctionSystem::new(SystemMeta::new("attack"), move |_, _| {
            sink.lock().unwrap().push("attack");
            Ok(())
        })
        .with_run_condition(|world| world.has_resource::<u16>()),
    )
    .unwrap();

    // Neither gate open.
    app.tick().unwrap();
    // Set gate open, system gate closed.
    app.insert_resource(1u8);
    app.tick().unwrap();
    assert!(log.lock().unwrap().is_empty());

    // Both gates open.
    app.insert_resource(1u16);
    app.tick().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["attack"]);
}

#[test]
fn cycle_is_fatal_and_names_systems() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut app = App::new();
    app.add_system(
        CoreStage::Update,
        SystemConfig::new(system("a", |_, _| Ok(()))).before("b"),
    );
    app.add_system(
        CoreStage::Update,
        SystemConfig::new(system("b", |_, _| Ok(()))).before("a"),
    );

    let err = app.tick().unwrap_err();
    match err {
        EcsError::ScheduleCycle(names) => {
            assert_eq!(names.len(), 2);
        }
        other => panic!("expected ScheduleCycle, got {other}"),
    }
}
