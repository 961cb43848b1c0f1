use lattice_ecs::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
}

#[derive(Debug, Default)]
struct BuildCount(u32);

struct SessionPlugin;

impl Plugin for SessionPlugin {
    fn build(&self, app: &mut App) -> Result<()> {
        if let Some(mut count) = app.world.get_resource_mut::<BuildCount>() {
            count.0 += 1;
        } else {
            app.insert_resource(BuildCount(1));
        }
        app.add_system(CoreStage::Update, system("session_tick", |_, _| Ok(())));
        Ok(())
    }
}

struct GamePlugin;

impl Plugin for GamePlugin {
    fn build(&self, app: &mut App) -> Result<()> {
        app.add_system(CoreStage::Update, system("game_logic", |_, _| Ok(())));
        app.add_system(CoreStage::PostUpdate, system("game_cleanup", |_, _| Ok(())));
        Ok(())
    }
}

#[test]
fn reset_unwinds_game_plugins_and_state() {
    let mut app = App::new();
    app.add_plugin(SessionPlugin).unwrap();
    app.mark_session_checkpoint();

    app.add_plugin(GamePlugin).unwrap();
    assert_eq!(app.schedule.system_count(), 3);

    let hero = app.world.spawn_with((Position { x: 1.0 },));
    app.world.register_event::<u32>();
    app.world.send_event(3u32).unwrap();
    app.tick().unwrap();

    app.reset_to_session_checkpoint().unwrap();

    // Game plugin and its systems are gone; the session plugin re-built.
    assert_eq!(app.plugin_count(), 1);
    assert_eq!(app.schedule.system_count(), 1);
    assert_eq!(app.world.get_resource::<BuildCount>().unwrap().0, 2);

    // Game state cleared, stale handles dead.
    assert!(!app.world.is_alive(hero));
    assert_eq!(app.world.entity_count(), 0);
    assert_eq!(app.world.archetype_count(), 1);

    // The app keeps ticking normally afterwards.
    app.tick().unwrap();
    let fresh = app.world.spawn_with((Position { x: 2.0 },));
    assert!(app.world.is_alive(fresh));
    assert_eq!(app.world.query1::<Position>(Filter::new()).count(), 1);
}

#[test]
fn cleanup_errors_are_swallowed() {
    struct FailingCleanup;
    impl Plugin for FailingCleanup {
        fn build(&self, _app: &mut App) -> Result<()> {
            Ok(())
        }
        fn cleanup(&self, _app: &mut App) -> Result<()> {
            Err(EcsError::CommandError("cleanup exploded".into()))
        }
    }

    let mut app = App::new();
    app.mark_session_checkpoint();
    app.add_plugin(FailingCleanup).unwrap();

    // The failing cleanup is logged, not propagated.
    app.reset_to_session_checkpoint().unwrap();
    assert_eq!(app.plugin_count(), 0);
}

#[test]
fn queries_recover_after_reset() {
    let mut app = App::new();
    app.mark_session_checkpoint();

    app.world.spawn_with((Position { x: 1.0 },));
    assert_eq!(app.world.query1::<Position>(Filter::new()).count(), 1);

    app.reset_to_session_checkpoint().unwrap();
    assert_eq!(app.world.query1::<Position>(Filter::new()).count(), 0);

    // Archetype indices restarted from scratch; cached matches must not
    // leak across the reset.
    app.world.spawn_with((Position { x: 2.0 },));
    assert_eq!(app.world.query1::<Position>(Filter::new()).count(), 1);
}
