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

//! Entity identifiers, locations and the generational allocator.

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, Result};

/// Generational entity handle.
///
/// A handle is live iff its slot's generation still matches. Despawning a
/// slot bumps the generation, so stale handles fail `is_alive` forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    pub id: u32,
    pub generation: u32,
}

impl Entity {
    pub fn from_raw(id: u32, generation: u32) -> Self {
        Self { id, generation }
    }
}

/// Entity location in archetype storage (archetype index, row)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype_index: u32,
    pub row: u32,
}

impl EntityLocation {
    /// Placeholder written between allocation and the first real placement.
    pub const PLACEHOLDER: EntityLocation = EntityLocation {
        archetype_index: u32::MAX,
        row: u32::MAX,
    };
}

#[derive(Debug, Clone)]
struct EntitySlot {
    generation: u32,
    location: Option<EntityLocation>,
}

/// Generational index allocator with id recycling.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    slots: Vec<EntitySlot>,
    free: Vec<u32>,
    alive: u32,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh handle with a placeholder location.
    ///
    /// Recycles a despawned slot when one is available, otherwise appends a
    /// new slot at generation 0.
    pub fn spawn(&mut self) -> Entity {
        self.alive += 1;
        if let Some(id) = self.free.pop() {
            let slot = &mut self.slots[id as usize];
            slot.location = Some(EntityLocation::PLACEHOLDER);
            Entity {
                id,
                generation: slot.generation,
            }
        } else {
            let id = self.slots.len() as u32;
            self.slots.push(EntitySlot {
                generation: 0,
                location: Some(EntityLocation::PLACEHOLDER),
            });
            Entity { id, generation: 0 }
        }
    }

    /// Release a handle. Returns false (and does nothing) for stale handles.
    ///
    /// The generation saturates at `u32::MAX`: a slot that exhausts its
    /// generations is retired rather than allowed to alias a live handle.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = &mut self.slots[entity.id as usize];
        slot.location = None;
        slot.generation = slot.generation.saturating_add(1);
        if slot.generation != u32::MAX {
            self.free.push(entity.id);
        }
        self.alive -= 1;
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.id as usize)
            .is_some_and(|slot| slot.generation == entity.generation && slot.location.is_some())
    }

    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        let slot = self.slots.get(entity.id as usize)?;
        if slot.generation != entity.generation {
            return None;
        }
        slot.location
    }

    pub fn set_location(&mut self, entity: Entity, location: EntityLocation) -> Result<()> {
        match self.slots.get_mut(entity.id as usize) {
            Some(slot) if slot.generation == entity.generation && slot.location.is_some() => {
                slot.location = Some(location);
                Ok(())
            }
            _ => Err(EcsError::DeadEntity(entity)),
        }
    }

    /// Ensure capacity for `additional` spawns without reallocation.
    ///
    /// Free-listed slots already have storage; only the shortfall needs room.
    pub fn reserve(&mut self, additional: usize) {
        let fresh = additional.saturating_sub(self.free.len());
        if self.slots.len() + fresh > self.slots.capacity() {
            self.slots.reserve(fresh);
        }
    }

    pub fn alive_count(&self) -> u32 {
        self.alive
    }

    /// Iterate every live handle in id order.
    pub fn iter_live(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.iter().enumerate().filter_map(|(id, slot)| {
            slot.location.map(|_| Entity {
                id: id as u32,
                generation: slot.generation,
            })
        })
    }

    /// Despawn every live slot, bumping generations so pre-reset handles
    /// stay dead. Used by game-state reset.
    pub fn clear(&mut self) {
        for (id, slot) in self.slots.iter_mut().enumerate() {
            if slot.location.take().is_some() {
                slot.generation = slot.generation.saturating_add(1);
                if slot.generation != u32::MAX {
                    self.free.push(id as u32);
                }
            }
        }
        self.alive = 0;
    }
}
