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

//! Deferred world mutations.
//!
//! Systems and observers record structural changes into a [`Commands`]
//! buffer; the scheduler applies the buffer, in recorded order, immediately
//! after the owning system returns. `spawn` hands out a [`PendingEntity`]
//! handle that later commands in the same buffer may target. Commands aimed
//! at an entity that is dead by the time the buffer drains (including one
//! despawned earlier in the same buffer) are silent no-ops.

use crate::component::Component;
use crate::entity::Entity;
use crate::error::Result;
use crate::event::Event;
use crate::world::World;

/// Handle to an entity spawned earlier in the same command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEntity(usize);

#[derive(Debug, Clone, Copy)]
enum EntityRef {
    Live(Entity),
    Pending(usize),
}

type SpawnClosure = Box<dyn FnOnce(&mut World) -> Entity + Send>;
type EntityClosure = Box<dyn FnOnce(&mut World, Entity) -> Result<()> + Send>;
type WorldClosure = Box<dyn FnOnce(&mut World) -> Result<()> + Send>;

enum Command {
    Spawn(SpawnClosure),
    WithEntity { target: EntityRef, apply: EntityClosure },
    Despawn(EntityRef),
    World(WorldClosure),
}

/// Ordered buffer of deferred operations.
#[derive(Default)]
pub struct Commands {
    commands: Vec<Command>,
    spawn_count: usize,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.spawn_count = 0;
    }

    /// Queue an empty spawn; attach components through the returned builder.
    pub fn spawn(&mut self) -> EntityCommands<'_> {
        let pending = self.push_spawn(Box::new(|world| world.spawn()));
        EntityCommands {
            commands: self,
            target: EntityRef::Pending(pending.0),
        }
    }

    /// Queue a spawn with a full bundle.
    pub fn spawn_with<B: crate::component::Bundle>(&mut self, bundle: B) -> EntityCommands<'_> {
        let pending = self.push_spawn(Box::new(move |world| world.spawn_with(bundle)));
        EntityCommands {
            commands: self,
            target: EntityRef::Pending(pending.0),
        }
    }

    fn push_spawn(&mut self, spawn: SpawnClosure) -> PendingEntity {
        let pending = PendingEntity(self.spawn_count);
        self.spawn_count += 1;
        self.commands.push(Command::Spawn(spawn));
        pending
    }

    /// Target a live entity.
    pub fn entity(&mut self, entity: Entity) -> EntityCommands<'_> {
        EntityCommands {
            commands: self,
            target: EntityRef::Live(entity),
        }
    }

    /// Target an entity spawned earlier in this buffer.
    pub fn pending(&mut self, pending: PendingEntity) -> EntityCommands<'_> {
        EntityCommands {
            commands: self,
            target: EntityRef::Pending(pending.0),
        }
    }

    pub fn despawn(&mut self, entity: Entity) {
        self.commands.push(Command::Despawn(EntityRef::Live(entity)));
    }

    pub fn insert_resource<R: Send + Sync + 'static>(&mut self, value: R) {
        self.commands.push(Command::World(Box::new(move |world| {
            world.insert_resource(value);
            Ok(())
        })));
    }

    pub fn send_event<T: Event>(&mut self, event: T) {
        self.commands.push(Command::World(Box::new(move |world| {
            world.send_event(event)
        })));
    }

    /// Custom world mutation escape hatch.
    pub fn queue<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) -> Result<()> + Send + 'static,
    {
        self.commands.push(Command::World(Box::new(f)));
    }

    fn push_with(&mut self, target: EntityRef, apply: EntityClosure) {
        self.commands.push(Command::WithEntity { target, apply });
    }

    /// Drain the buffer into the world, in recorded order.
    pub fn apply(&mut self, world: &mut World) -> Result<()> {
        let mut spawned: Vec<Entity> = Vec::with_capacity(self.spawn_count);
        self.spawn_count = 0;
        for command in self.commands.drain(..) {
            match command {
                Command::Spawn(spawn) => {
                    spawned.push(spawn(world));
                }
                Command::WithEntity { target, apply } => {
                    let Some(entity) = resolve(&spawned, target) else {
                        continue;
                    };
                    if !world.is_alive(entity) {
                        continue;
                    }
                    apply(world, entity)?;
                }
                Command::Despawn(target) => {
                    if let Some(entity) = resolve(&spawned, target) {
                        world.despawn(entity);
                    }
                }
                Command::World(f) => {
                    f(world)?;
                }
            }
        }
        Ok(())
    }
}

fn resolve(spawned: &[Entity], target: EntityRef) -> Option<Entity> {
    match target {
        EntityRef::Live(entity) => Some(entity),
        EntityRef::Pending(index) => spawned.get(index).copied(),
    }
}

/// Builder over one command target.
pub struct EntityCommands<'a> {
    commands: &'a mut Commands,
    target: EntityRef,
}

impl<'a> EntityCommands<'a> {
    /// The pending handle, when this builder targets an unspawned entity.
    pub fn pending_handle(&self) -> Option<PendingEntity> {
        match self.target {
            EntityRef::Pending(index) => Some(PendingEntity(index)),
            EntityRef::Live(_) => None,
        }
    }

    pub fn insert<T: Component>(self, component: T) -> Self {
        let target = self.target;
        self.commands.push_with(
            target,
            Box::new(move |world, entity| world.insert(entity, component)),
        );
        self
    }

    pub fn remove<T: Component>(self) -> Self {
        let target = self.target;
        self.commands.push_with(
            target,
            Box::new(move |world, entity| {
                world.remove::<T>(entity);
                Ok(())
            }),
        );
        self
    }

    pub fn despawn(self) {
        let target = self.target;
        self.commands.commands.push(Command::Despawn(target));
    }
}
