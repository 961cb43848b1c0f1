use lattice_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
enum GameState {
    Menu,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
}

#[derive(Debug, Default)]
struct MoveRuns(u32);

#[test]
fn state_gates_systems_across_ticks() {
    let mut app = App::new();
    app.add_state(GameState::Menu);
    app.insert_resource(MoveRuns::default());
    app.world.spawn_with((Position { x: 0.0 },));

    // Requests Playing during tick 1.
    app.add_system(
        CoreStage::Update,
        system("request_play", |world, _| {
            if world.current_tick() == 1 {
                world.set_state(GameState::Playing);
            }
            Ok(())
        }),
    );
    app.add_system_in_state(
        CoreStage::Update,
        GameState::Playing,
        system("move", |world, _| {
            if let Some(mut runs) = world.get_resource_mut::<MoveRuns>() {
                runs.0 += 1;
            }
            Ok(())
        }),
    );

    // Tick 1: the transition is requested but InState(Playing) still sees
    // Menu, so `move` must not run.
    app.tick().unwrap();
    assert_eq!(app.world.get_resource::<MoveRuns>().unwrap().0, 0);

    // The transition applied at end of tick 1; entering tick 2 the edge
    // flag is up and `move` runs.
    let state = app.world.state::<GameState>().unwrap();
    assert_eq!(*state.current(), GameState::Playing);
    assert!(state.just_entered());
    assert!(state.just_exited());

    app.tick().unwrap();
    assert_eq!(app.world.get_resource::<MoveRuns>().unwrap().0, 1);

    // Edge flags last exactly one tick.
    let state = app.world.state::<GameState>().unwrap();
    assert!(!state.just_entered());
    assert!(!state.just_exited());

    app.tick().unwrap();
    assert_eq!(app.world.get_resource::<MoveRuns>().unwrap().0, 2);
}

#[test]
fn set_to_current_state_raises_no_edges() {
    let mut app = App::new();
    app.add_state(GameState::Menu);

    app.world.set_state(GameState::Menu);
    app.tick().unwrap();

    let state = app.world.state::<GameState>().unwrap();
    assert_eq!(*state.current(), GameState::Menu);
    assert!(!state.just_entered());
}

#[test]
fn last_request_in_a_tick_wins() {
    let mut app = App::new();
    app.add_state(GameState::Menu);

    app.world.set_state(GameState::Playing);
    app.world.set_state(GameState::Paused);
    app.tick().unwrap();

    assert_eq!(
        *app.world.state::<GameState>().unwrap().current(),
        GameState::Paused
    );
}

#[test]
fn unregistered_state_set_returns_false() {
    let mut world = World::new();
    assert!(!world.set_state(GameState::Playing));
    assert!(world.state::<GameState>().is_none());
}

#[test]
fn in_state_condition_reads_current() {
    let mut world = World::new();
    world.add_state(GameState::Menu);

    let condition = in_state(GameState::Menu);
    assert!(condition(&world));

    world.set_state(GameState::Playing);
    // Still Menu until transitions apply.
    assert!(condition(&world));

    world.apply_state_transitions();
    assert!(!condition(&world));
}
