// Copyright 2025 Lattice ECS contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Optional type registry with JSON round-trips.
//!
//! Registered component types serialize per entity as
//! `{"entity": {"id", "generation"}, "components": {"Name": {..}}}`.
//! Unregistered components are silently dropped on both save and load;
//! field-level mismatches are recoverable (the component is skipped and
//! logged). Loading spawns fresh entities — the stored id pair is metadata,
//! not an allocation request.

use ahash::AHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::component::{component_id, Component, ComponentId};
use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::world::World;

/// Declared field metadata for a registered type.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: &'static str,
    pub type_name: &'static str,
    pub nullable: bool,
    pub default: Option<Value>,
}

impl FieldInfo {
    pub fn new(name: &'static str, type_name: &'static str) -> Self {
        Self {
            name,
            type_name,
            nullable: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

type ExtractFn = fn(&World, Entity) -> Result<Option<Value>>;
type InsertFn = fn(&mut World, Entity, &Value, &[FieldInfo]) -> Result<()>;

struct TypeRegistration {
    name: String,
    fields: Vec<FieldInfo>,
    extract: ExtractFn,
    insert: InsertFn,
}

/// Registry of serializable component types.
#[derive(Default)]
pub struct TypeRegistry {
    registrations: Vec<TypeRegistration>,
    by_name: AHashMap<String, usize>,
    by_component: AHashMap<ComponentId, usize>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name` with no field metadata.
    pub fn register<T>(&mut self, name: &str)
    where
        T: Component + Serialize + DeserializeOwned,
    {
        self.register_with_fields::<T>(name, Vec::new());
    }

    /// Register `T` with field metadata used to patch holes on load:
    /// missing fields take their declared default, or null when nullable.
    pub fn register_with_fields<T>(&mut self, name: &str, fields: Vec<FieldInfo>)
    where
        T: Component + Serialize + DeserializeOwned,
    {
        let index = self.registrations.len();
        self.registrations.push(TypeRegistration {
            name: name.to_string(),
            fields,
            extract: extract_component::<T>,
            insert: insert_component::<T>,
        });
        self.by_name.insert(name.to_string(), index);
        self.by_component.insert(component_id::<T>(), index);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn type_count(&self) -> usize {
        self.registrations.len()
    }

    pub fn fields_of(&self, name: &str) -> Option<&[FieldInfo]> {
        let index = *self.by_name.get(name)?;
        Some(&self.registrations[index].fields)
    }

    /// Serialize one live entity. `None` for dead handles.
    pub fn entity_to_json(&self, world: &World, entity: Entity) -> Option<Value> {
        let location = world.get_location(entity)?;
        let table = world.archetypes().table(location.archetype_index as usize)?;

        let mut components = Map::new();
        for &id in table.archetype_id().ids() {
            let Some(&index) = self.by_component.get(&id) else {
                continue; // unregistered components are dropped
            };
            let registration = &self.registrations[index];
            match (registration.extract)(world, entity) {
                Ok(Some(value)) => {
                    components.insert(registration.name.clone(), value);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(component = %registration.name, error = %err, "component skipped on save");
                }
            }
        }

        Some(json!({
            "entity": { "id": entity.id, "generation": entity.generation },
            "components": Value::Object(components),
        }))
    }

    /// Spawn an entity from its JSON form. Unknown component names are
    /// dropped; a component whose shape mismatches is skipped and logged.
    pub fn entity_from_json(&self, world: &mut World, value: &Value) -> Result<Entity> {
        let object = value.as_object().ok_or_else(|| {
            EcsError::SerializationError("entity JSON must be an object".to_string())
        })?;
        let empty = Map::new();
        let components = match object.get("components") {
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(EcsError::SerializationError(
                    "\"components\" must be an object".to_string(),
                ))
            }
            None => &empty,
        };

        let entity = world.spawn();
        for (name, component_value) in components {
            let Some(&index) = self.by_name.get(name) else {
                continue;
            };
            let registration = &self.registrations[index];
            if let Err(err) =
                (registration.insert)(world, entity, component_value, &registration.fields)
            {
                warn!(component = %name, error = %err, "component skipped on load");
            }
        }
        Ok(entity)
    }

    /// Serialize every live entity into a JSON array.
    pub fn save_scene(&self, world: &World) -> Value {
        let entities: Vec<Value> = world
            .get_all_entities()
            .into_iter()
            .filter_map(|entity| self.entity_to_json(world, entity))
            .collect();
        Value::Array(entities)
    }

    /// Spawn every entity of a saved scene; returns the new handles in
    /// scene order.
    pub fn load_scene(&self, world: &mut World, scene: &Value) -> Result<Vec<Entity>> {
        let entries = scene.as_array().ok_or_else(|| {
            EcsError::SerializationError("scene JSON must be an array".to_string())
        })?;
        let mut spawned = Vec::with_capacity(entries.len());
        for entry in entries {
            spawned.push(self.entity_from_json(world, entry)?);
        }
        Ok(spawned)
    }

    pub fn save_scene_string(&self, world: &World) -> Result<String> {
        serde_json::to_string_pretty(&self.save_scene(world))
            .map_err(|err| EcsError::SerializationError(err.to_string()))
    }

    pub fn load_scene_str(&self, world: &mut World, scene: &str) -> Result<Vec<Entity>> {
        let value: Value = serde_json::from_str(scene)
            .map_err(|err| EcsError::SerializationError(err.to_string()))?;
        self.load_scene(world, &value)
    }
}

fn extract_component<T>(world: &World, entity: Entity) -> Result<Option<Value>>
where
    T: Component + Serialize,
{
    let Some(component) = world.get::<T>(entity) else {
        return Ok(None);
    };
    serde_json::to_value(component)
        .map(Some)
        .map_err(|err| EcsError::SerializationError(err.to_string()))
}

fn insert_component<T>(
    world: &mut World,
    entity: Entity,
    value: &Value,
    fields: &[FieldInfo],
) -> Result<()>
where
    T: Component + DeserializeOwned,
{
    let prepared = match value {
        Value::Object(map) => {
            let mut map = map.clone();
            for field in fields {
                if !map.contains_key(field.name) {
                    if let Some(default) = &field.default {
                        map.insert(field.name.to_string(), default.clone());
                    } else if field.nullable {
                        map.insert(field.name.to_string(), Value::Null);
                    }
                }
            }
            Value::Object(map)
        }
        other => other.clone(),
    };
    let component: T = serde_json::from_value(prepared).map_err(|err| {
        EcsError::SerializationError(format!("{}: {err}", std::any::type_name::<T>()))
    })?;
    world.insert(entity, component)
}
