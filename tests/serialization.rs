use lattice_ecs::prelude::*;
use lattice_ecs::reflect::FieldInfo;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Inventory {
    items: Vec<String>,
    gold: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RuntimeOnly;

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register::<Position>("Position");
    registry.register_with_fields::<Inventory>(
        "Inventory",
        vec![
            FieldInfo::new("items", "Vec<String>").with_default(json!([])),
            FieldInfo::new("gold", "u32").with_default(json!(0)),
        ],
    );
    registry
}

#[test]
fn to_json_of_loaded_entity_matches_source() {
    let registry = registry();
    let mut world = World::new();

    let source = world.spawn_with((
        Position { x: 1.5, y: -2.0 },
        Inventory {
            items: vec!["sword".into(), "potion".into()],
            gold: 40,
        },
        RuntimeOnly,
    ));

    let saved = registry.entity_to_json(&world, source).unwrap();
    let loaded = registry.entity_from_json(&mut world, &saved).unwrap();
    let resaved = registry.entity_to_json(&world, loaded).unwrap();

    // Identity is remapped on load; the component map round-trips exactly.
    assert_eq!(saved["components"], resaved["components"]);
}

#[test]
fn scene_round_trip_restores_population() {
    let registry = registry();
    let mut world = World::new();

    world.spawn_with((Position { x: 0.0, y: 0.0 },));
    world.spawn_with((
        Position { x: 1.0, y: 1.0 },
        Inventory {
            items: vec![],
            gold: 10,
        },
    ));
    world.spawn(); // empty entities serialize as empty component maps

    let scene = registry.save_scene_string(&world).unwrap();

    let mut restored = World::new();
    let loaded = registry.load_scene_str(&mut restored, &scene).unwrap();

    assert_eq!(loaded.len(), 3);
    assert_eq!(restored.query1::<Position>(Filter::new()).count(), 2);
    assert_eq!(restored.query1::<Inventory>(Filter::new()).count(), 1);
}

#[test]
fn defaults_fill_missing_fields_on_load() {
    let registry = registry();
    let mut world = World::new();

    let value = json!({
        "entity": { "id": 11, "generation": 0 },
        "components": { "Inventory": { "items": ["torch"] } }
    });
    let entity = registry.entity_from_json(&mut world, &value).unwrap();
    let inventory = world.get::<Inventory>(entity).unwrap();
    assert_eq!(inventory.items, vec!["torch".to_string()]);
    assert_eq!(inventory.gold, 0);
}

#[test]
fn malformed_scene_is_an_error() {
    let registry = registry();
    let mut world = World::new();

    let err = registry
        .load_scene(&mut world, &json!({"not": "an array"}))
        .unwrap_err();
    assert!(matches!(err, EcsError::SerializationError(_)));

    let err = registry
        .load_scene(&mut world, &json!(["not an object"]))
        .unwrap_err();
    assert!(matches!(err, EcsError::SerializationError(_)));
}
