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

//! World: central entity, archetype, resource, event and state storage.
//!
//! The world owns every piece of runtime state — there are no process-wide
//! mutable singletons apart from the component-id interner. Structural
//! mutation goes through the operations here; the archetype-transition
//! algorithm keeps entity locations, column lengths and change ticks
//! consistent and fires the matching observers.

use std::cell::RefCell;
use std::ptr::NonNull;

use ahash::{AHashMap, AHashSet};

use crate::archetype::{Archetypes, ArchetypeId, Table};
use crate::command::Commands;
use crate::component::{
    component_id, Bundle, Component, ComponentId, ComponentTicks, MAX_BUNDLE_COMPONENTS,
};
use crate::entity::{Entity, EntityAllocator, EntityLocation};
use crate::error::{EcsError, Result};
use crate::event::{Event, EventReader, EventReadWriter, EventWriter, Events};
use crate::observer::{Lifecycle, Observers};
use crate::query::{CachedMatches, Filter, Query1, Query2, Query3, Query4, QueryKey, QueryState};
use crate::resource::{Res, ResMut, Resources};
use crate::state::{State, StateRegistry, StateValue};

/// Central ECS container.
pub struct World {
    entities: EntityAllocator,
    archetypes: Archetypes,
    resources: Resources,
    events: Events,
    observers: Observers,
    states: StateRegistry,

    /// Global change-detection tick. Tick 0 is reserved so that a
    /// `last_seen` of 0 matches everything ever written.
    tick: u64,

    /// Commands queued by observers, drained after the triggering system.
    deferred: Commands,

    /// Matching-archetype cache shared by all queries with one signature.
    query_cache: RefCell<AHashMap<QueryKey, CachedMatches>>,
}

impl World {
    pub fn new() -> Self {
        Self {
            entities: EntityAllocator::new(),
            archetypes: Archetypes::new(),
            resources: Resources::new(),
            events: Events::new(),
            observers: Observers::new(),
            states: StateRegistry::new(),
            tick: 1,
            deferred: Commands::new(),
            query_cache: RefCell::new(AHashMap::with_capacity(32)),
        }
    }

    // ========== Tick ==========

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Advance the global tick. The orchestrator calls this exactly once per
    /// frame, after the schedule has run.
    pub fn advance_tick(&mut self) {
        self.tick += 1;
    }

    // ========== Entities ==========

    /// Spawn an entity with no components (empty archetype, index 0).
    pub fn spawn(&mut self) -> Entity {
        let entity = self.entities.spawn();
        let table = self
            .archetypes
            .table_mut(0)
            .expect("empty archetype exists at index 0");
        let row = table.push_entity(entity);
        self.place(entity, 0, row);
        entity
    }

    /// Spawn an entity with a bundle of components.
    ///
    /// # Panics
    /// Panics if the bundle names the same component type twice.
    pub fn spawn_with<B: Bundle>(&mut self, bundle: B) -> Entity {
        let ids = B::component_ids();
        assert_unique(&ids);
        let archetype_id = ArchetypeId::from_unsorted(ids.clone());
        let index = self
            .archetypes
            .get_or_create_with(archetype_id, |table| B::register_columns(table));

        let entity = self.entities.spawn();
        let tick = self.tick;
        let table = self
            .archetypes
            .table_mut(index)
            .expect("freshly interned archetype index is valid");
        let row = table.push_entity(entity);
        bundle.write_into(table, tick);
        #[cfg(debug_assertions)]
        table.assert_consistent();
        self.place(entity, index, row);

        for &id in ids.iter() {
            self.fire_hooks(Lifecycle::Added, id, entity);
        }
        entity
    }

    /// Spawn many entities sharing one bundle shape. Resolves the archetype
    /// once and reserves allocator capacity up front.
    pub fn spawn_batch<B, I>(&mut self, bundles: I) -> Vec<Entity>
    where
        B: Bundle,
        I: IntoIterator<Item = B>,
    {
        let bundles = bundles.into_iter();
        let (lower, _) = bundles.size_hint();
        self.entities.reserve(lower);

        let ids = B::component_ids();
        assert_unique(&ids);
        let archetype_id = ArchetypeId::from_unsorted(ids.clone());
        let index = self
            .archetypes
            .get_or_create_with(archetype_id, |table| B::register_columns(table));
        let tick = self.tick;

        let mut spawned = Vec::with_capacity(lower);
        for bundle in bundles {
            let entity = self.entities.spawn();
            let table = self
                .archetypes
                .table_mut(index)
                .expect("batch archetype index is valid");
            let row = table.push_entity(entity);
            bundle.write_into(table, tick);
            self.place(entity, index, row);
            spawned.push(entity);
        }

        for &entity in &spawned {
            for &id in ids.iter() {
                self.fire_hooks(Lifecycle::Added, id, entity);
            }
        }
        spawned
    }

    /// Despawn an entity. Stale handles are a silent no-op returning false.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        let Some(location) = self.entities.location(entity) else {
            return false;
        };

        // Fire on-remove while the entity and its components are still
        // readable.
        let ids: smallvec::SmallVec<[ComponentId; MAX_BUNDLE_COMPONENTS]> = match self
            .archetypes
            .table(location.archetype_index as usize)
        {
            Some(table) => table.archetype_id().ids().iter().copied().collect(),
            None => return false,
        };
        for &id in &ids {
            self.fire_hooks(Lifecycle::Removed, id, entity);
        }

        let Some(table) = self.archetypes.table_mut(location.archetype_index as usize) else {
            return false;
        };
        if let Some(swapped) = table.swap_remove(location.row as usize) {
            let _ = self.entities.set_location(swapped, location);
        }
        self.entities.despawn(entity)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn get_location(&self, entity: Entity) -> Option<EntityLocation> {
        self.entities.location(entity)
    }

    /// Every live entity, in id order.
    pub fn get_all_entities(&self) -> Vec<Entity> {
        self.entities.iter_live().collect()
    }

    /// Despawn every live entity not present in `keep`.
    pub fn despawn_except(&mut self, keep: &[Entity]) {
        let keep: AHashSet<Entity> = keep.iter().copied().collect();
        let doomed: Vec<Entity> = self
            .entities
            .iter_live()
            .filter(|e| !keep.contains(e))
            .collect();
        for entity in doomed {
            self.despawn(entity);
        }
    }

    /// Ensure capacity for `additional` spawns without reallocation.
    pub fn reserve_entities(&mut self, additional: usize) {
        self.entities.reserve(additional);
    }

    pub fn entity_count(&self) -> u32 {
        self.entities.alive_count()
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    fn place(&mut self, entity: Entity, archetype_index: usize, row: usize) {
        let location = EntityLocation {
            archetype_index: archetype_index as u32,
            row: row as u32,
        };
        self.entities
            .set_location(entity, location)
            .expect("entity was just spawned or migrated while alive");
    }

    // ========== Components ==========

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let location = self.entities.location(entity)?;
        self.archetypes
            .table(location.archetype_index as usize)?
            .get_component(location.row as usize)
    }

    /// Mutable component access. Bumps the cell's `changed` tick.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let location = self.entities.location(entity)?;
        let tick = self.tick;
        self.archetypes
            .table_mut(location.archetype_index as usize)?
            .get_component_mut(location.row as usize, Some(tick))
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        let Some(location) = self.entities.location(entity) else {
            return false;
        };
        self.archetypes
            .table(location.archetype_index as usize)
            .is_some_and(|table| table.has_column(component_id::<T>()))
    }

    /// Change-detection ticks for one component cell.
    pub fn ticks<T: Component>(&self, entity: Entity) -> Option<ComponentTicks> {
        let location = self.entities.location(entity)?;
        self.archetypes
            .table(location.archetype_index as usize)?
            .ticks(component_id::<T>(), location.row as usize)
    }

    /// Insert a component, migrating the entity to the target archetype.
    ///
    /// Already-present components are overwritten in place: only the cell's
    /// `changed` tick moves and on-change observers fire. A structural add
    /// preserves the tick history of every pre-existing component, stamps
    /// the new cell with the current tick and fires on-add observers.
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        let location = self
            .entities
            .location(entity)
            .ok_or(EcsError::DeadEntity(entity))?;
        let id = component_id::<T>();
        let tick = self.tick;
        let source_index = location.archetype_index as usize;

        let source = self.archetypes.try_table_mut(source_index)?;
        if source.has_column(id) {
            source.set_component(location.row as usize, value, Some(tick))?;
            self.fire_hooks(Lifecycle::Changed, id, entity);
            return Ok(());
        }

        let target_index = self
            .archetypes
            .add_target(source_index, id, |table| table.register_column::<T>())?;

        let (source, target) = self.archetypes.pair_mut(source_index, target_index);
        let new_row = target.push_entity(entity);
        let swapped = source.move_row_to(location.row as usize, target, None);
        target
            .column_mut::<T>()
            .ok_or(EcsError::MissingComponent(std::any::type_name::<T>()))?
            .push(value, ComponentTicks::new(tick));
        #[cfg(debug_assertions)]
        target.assert_consistent();

        if let Some(swapped) = swapped {
            self.entities.set_location(swapped, location)?;
        }
        self.place(entity, target_index, new_row);
        self.fire_hooks(Lifecycle::Added, id, entity);
        Ok(())
    }

    /// Remove a component, returning its value. `None` when the entity is
    /// dead or the component absent (no-op either way).
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let location = self.entities.location(entity)?;
        let id = component_id::<T>();
        let source_index = location.archetype_index as usize;

        if !self
            .archetypes
            .table(source_index)?
            .has_column(id)
        {
            return None;
        }

        let target_index = self.archetypes.remove_target(source_index, id).ok()?;
        let (source, target) = self.archetypes.pair_mut(source_index, target_index);

        let (value, _ticks) = source
            .column_mut::<T>()?
            .swap_remove_value(location.row as usize)?;
        let new_row = target.push_entity(entity);
        let swapped = source.move_row_to(location.row as usize, target, Some(id));
        #[cfg(debug_assertions)]
        target.assert_consistent();

        if let Some(swapped) = swapped {
            let _ = self.entities.set_location(swapped, location);
        }
        self.place(entity, target_index, new_row);
        self.fire_hooks(Lifecycle::Removed, id, entity);
        Some(value)
    }

    // ========== Observers ==========

    pub fn observe_add<T: Component>(
        &mut self,
        callback: impl Fn(&World, Entity, &mut Commands) + Send + Sync + 'static,
    ) {
        self.observers.on_add::<T>(callback);
    }

    pub fn observe_change<T: Component>(
        &mut self,
        callback: impl Fn(&World, Entity, &mut Commands) + Send + Sync + 'static,
    ) {
        self.observers.on_change::<T>(callback);
    }

    pub fn observe_remove<T: Component>(
        &mut self,
        callback: impl Fn(&World, Entity, &mut Commands) + Send + Sync + 'static,
    ) {
        self.observers.on_remove::<T>(callback);
    }

    pub fn observers(&self) -> &Observers {
        &self.observers
    }

    /// Fire one lifecycle hook list. The lists are lifted out for the call
    /// so callbacks can borrow the world immutably; they queue structural
    /// follow-ups into the deferred buffer.
    fn fire_hooks(&mut self, lifecycle: Lifecycle, id: ComponentId, entity: Entity) {
        if !self.observers.has_hooks(id) {
            return;
        }
        let Some(hooks) = self.observers.take_hooks(id) else {
            return;
        };
        let mut commands = std::mem::take(&mut self.deferred);
        for hook in hooks.list(lifecycle) {
            hook(&*self, entity, &mut commands);
        }
        self.deferred = commands;
        self.observers.put_back(id, hooks);
    }

    /// Drain observer-queued commands. Applying them can trigger further
    /// observers; the loop runs until the buffer stays empty.
    pub fn flush(&mut self) -> Result<()> {
        while !self.deferred.is_empty() {
            let mut commands = std::mem::take(&mut self.deferred);
            commands.apply(self)?;
        }
        Ok(())
    }

    // ========== Resources ==========

    pub fn insert_resource<R: Send + Sync + 'static>(&mut self, value: R) {
        self.resources.insert(value);
    }

    pub fn get_resource<R: 'static>(&self) -> Option<Res<'_, R>> {
        self.resources.get()
    }

    pub fn get_resource_mut<R: 'static>(&mut self) -> Option<ResMut<'_, R>> {
        self.resources.get_mut()
    }

    pub fn has_resource<R: 'static>(&self) -> bool {
        self.resources.contains::<R>()
    }

    pub fn remove_resource<R: 'static>(&mut self) -> Option<R> {
        self.resources.remove()
    }

    // ========== Events ==========

    pub fn register_event<T: Event>(&mut self) {
        self.events.register::<T>();
    }

    pub fn event_reader<T: Event>(&self) -> Result<EventReader<'_, T>> {
        self.events
            .get::<T>()
            .map(EventReader::new)
            .ok_or(EcsError::UnregisteredEvent(std::any::type_name::<T>()))
    }

    pub fn event_writer<T: Event>(&mut self) -> Result<EventWriter<'_, T>> {
        self.events
            .get_mut::<T>()
            .map(EventWriter::new)
            .ok_or(EcsError::UnregisteredEvent(std::any::type_name::<T>()))
    }

    pub fn event_read_writer<T: Event>(&mut self) -> Result<EventReadWriter<'_, T>> {
        self.events
            .get_mut::<T>()
            .map(EventReadWriter::new)
            .ok_or(EcsError::UnregisteredEvent(std::any::type_name::<T>()))
    }

    /// Queue an event for the next tick.
    pub fn send_event<T: Event>(&mut self, event: T) -> Result<()> {
        let queue = self
            .events
            .get_mut::<T>()
            .ok_or(EcsError::UnregisteredEvent(std::any::type_name::<T>()))?;
        queue.send(event);
        Ok(())
    }

    /// Swap every event queue. The orchestrator calls this first in a tick.
    pub fn update_events(&mut self) {
        self.events.update_all();
    }

    // ========== States ==========

    pub fn add_state<S: StateValue>(&mut self, initial: S) {
        self.states.add(initial);
    }

    pub fn state<S: StateValue>(&self) -> Option<&State<S>> {
        self.states.get()
    }

    /// Request a state transition for tick N+1. False if `S` was never
    /// registered.
    pub fn set_state<S: StateValue>(&mut self, next: S) -> bool {
        match self.states.get_mut::<S>() {
            Some(state) => {
                state.set(next);
                true
            }
            None => false,
        }
    }

    /// Apply pending state transitions. Called once per tick by the
    /// orchestrator, after `advance_tick`.
    pub fn apply_state_transitions(&mut self) {
        self.states.apply_transitions();
    }

    // ========== Queries ==========

    pub fn query1<A: Component>(&mut self, filter: Filter) -> Query1<'_, A> {
        Query1::new(self, filter)
    }

    pub fn query2<A: Component, B: Component>(&mut self, filter: Filter) -> Query2<'_, A, B> {
        Query2::new(self, filter)
    }

    pub fn query3<A: Component, B: Component, C: Component>(
        &mut self,
        filter: Filter,
    ) -> Query3<'_, A, B, C> {
        Query3::new(self, filter)
    }

    pub fn query4<A: Component, B: Component, C: Component, D: Component>(
        &mut self,
        filter: Filter,
    ) -> Query4<'_, A, B, C, D> {
        Query4::new(self, filter)
    }

    /// Pull the shared matching-archetype cache into a query state,
    /// extending it for archetypes created since the last lookup.
    pub(crate) fn refresh_query_state(&self, state: &mut QueryState) {
        let mut cache = self.query_cache.borrow_mut();
        let entry = cache.entry(state.key()).or_insert_with(|| {
            let (required, excluded) = state.match_sets();
            CachedMatches::new(required, excluded)
        });
        entry.update(&self.archetypes);
        state.adopt_matches(entry.matching.clone(), entry.seen_archetypes);
    }

    pub fn archetypes(&self) -> &Archetypes {
        &self.archetypes
    }

    pub(crate) fn table_ptr_mut(&mut self, index: usize) -> Option<NonNull<Table>> {
        self.archetypes.table_mut(index).map(NonNull::from)
    }

    /// Query-cache occupancy, for diagnostics.
    pub fn query_cache_stats(&self) -> QueryCacheStats {
        let cache = self.query_cache.borrow();
        QueryCacheStats {
            cached_queries: cache.len(),
            cached_matches: cache.values().map(|c| c.matching.len()).sum(),
            total_archetypes: self.archetypes.len(),
        }
    }

    // ========== Session reset ==========

    /// Clear entities, archetypes, event buffers and query caches.
    /// Resources, observers and registered states survive; the tick keeps
    /// counting so change detection stays monotonic across resets.
    pub fn reset_game_state(&mut self) {
        self.entities.clear();
        self.archetypes.clear();
        self.events.clear_all();
        self.query_cache.borrow_mut().clear();
        self.deferred.clear();
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the shared query cache
#[derive(Debug, Clone, Copy)]
pub struct QueryCacheStats {
    /// Distinct query signatures cached
    pub cached_queries: usize,
    /// Archetype matches held across all cached signatures
    pub cached_matches: usize,
    /// Archetypes currently in the world
    pub total_archetypes: usize,
}

fn assert_unique(ids: &[ComponentId]) {
    for (i, id) in ids.iter().enumerate() {
        assert!(
            !ids[..i].contains(id),
            "duplicate component {} in bundle",
            crate::component::component_name(*id)
        );
    }
}
