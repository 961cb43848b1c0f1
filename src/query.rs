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

//! Typed queries with runtime filters and cached archetype matching.
//!
//! A query names 1..=4 fetched component types plus a [`Filter`] built from
//! `with` / `without` / `added` / `changed` clauses. Matching archetypes are
//! cached per signature and extended incrementally as new archetypes appear
//! (archetype indices are never retired, so the cache stays correct without
//! rescans). Iteration yields `(Entity, &mut C1, ..)` tuples in archetype
//! order, then row order.

use std::marker::PhantomData;
use std::ptr::NonNull;

use smallvec::{smallvec, SmallVec};

use crate::archetype::{Archetypes, Table};
use crate::component::{component_id, component_name, Component, ComponentId, ComponentTicks};
use crate::entity::Entity;
use crate::world::World;

/// Declarative query filter: the four id sets of the filter grammar.
///
/// `and` flattens, so nested combinations collapse into one value.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    required: SmallVec<[ComponentId; 8]>,
    excluded: SmallVec<[ComponentId; 8]>,
    added_filters: SmallVec<[ComponentId; 4]>,
    changed_filters: SmallVec<[ComponentId; 4]>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `T` to be present (With).
    pub fn with<T: Component>(mut self) -> Self {
        self.required.push(component_id::<T>());
        self
    }

    /// Require `T` to be absent (Without).
    pub fn without<T: Component>(mut self) -> Self {
        self.excluded.push(component_id::<T>());
        self
    }

    /// Require `T` to have been added after the query's last-seen tick.
    pub fn added<T: Component>(mut self) -> Self {
        self.added_filters.push(component_id::<T>());
        self
    }

    /// Require `T` to have changed after the query's last-seen tick.
    pub fn changed<T: Component>(mut self) -> Self {
        self.changed_filters.push(component_id::<T>());
        self
    }

    /// Conjunction. Nested `and`s flatten into the same four sets.
    pub fn and(mut self, other: Filter) -> Self {
        self.required.extend(other.required);
        self.excluded.extend(other.excluded);
        self.added_filters.extend(other.added_filters);
        self.changed_filters.extend(other.changed_filters);
        self
    }
}

/// Cache key for a query's archetype-matching signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct QueryKey {
    required: SmallVec<[ComponentId; 8]>,
    excluded: SmallVec<[ComponentId; 8]>,
}

/// Incrementally maintained match list shared through the world's query
/// cache.
#[derive(Debug)]
pub(crate) struct CachedMatches {
    required: SmallVec<[ComponentId; 8]>,
    excluded: SmallVec<[ComponentId; 8]>,
    pub(crate) matching: Vec<usize>,
    pub(crate) seen_archetypes: usize,
}

impl CachedMatches {
    pub(crate) fn new(
        required: SmallVec<[ComponentId; 8]>,
        excluded: SmallVec<[ComponentId; 8]>,
    ) -> Self {
        Self {
            required,
            excluded,
            matching: Vec::new(),
            seen_archetypes: 0,
        }
    }

    pub(crate) fn update(&mut self, archetypes: &Archetypes) {
        let count = archetypes.len();
        if count < self.seen_archetypes {
            // Storage was reset under us; start over.
            self.matching.clear();
            self.seen_archetypes = 0;
        }
        if count == self.seen_archetypes {
            return;
        }
        for (index, table) in archetypes.tables().iter().enumerate().skip(self.seen_archetypes) {
            let id = table.archetype_id();
            if id.contains_all(&self.required) && !id.contains_any(&self.excluded) {
                self.matching.push(index);
            }
        }
        self.seen_archetypes = count;
    }
}

/// Captured query plan: fetch list, filter sets, last-seen tick and the
/// cached matching-archetype list.
#[derive(Debug)]
pub struct QueryState {
    fetch: SmallVec<[ComponentId; 4]>,
    required: SmallVec<[ComponentId; 8]>,
    excluded: SmallVec<[ComponentId; 8]>,
    added_filters: SmallVec<[ComponentId; 4]>,
    changed_filters: SmallVec<[ComponentId; 4]>,
    last_seen_tick: u64,
    matching: Vec<usize>,
    seen_archetypes: usize,
}

impl QueryState {
    /// Build a state from the fetched ids and a filter. Presence of every
    /// fetched, added-filtered and changed-filtered component is required
    /// for an archetype to match.
    pub fn new(fetch: SmallVec<[ComponentId; 4]>, filter: Filter) -> Self {
        for (i, id) in fetch.iter().enumerate() {
            if fetch[..i].contains(id) {
                panic!(
                    "duplicate component {} in query fetch",
                    component_name(*id)
                );
            }
        }
        let mut required: SmallVec<[ComponentId; 8]> = SmallVec::new();
        required.extend(fetch.iter().copied());
        required.extend(filter.required.iter().copied());
        required.extend(filter.added_filters.iter().copied());
        required.extend(filter.changed_filters.iter().copied());
        required.sort_unstable();
        required.dedup();

        let mut excluded = filter.excluded;
        excluded.sort_unstable();
        excluded.dedup();

        Self {
            fetch,
            required,
            excluded,
            added_filters: filter.added_filters,
            changed_filters: filter.changed_filters,
            last_seen_tick: 0,
            matching: Vec::new(),
            seen_archetypes: 0,
        }
    }

    pub fn fetch(&self) -> &[ComponentId] {
        &self.fetch
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen_tick
    }

    pub fn set_last_seen(&mut self, tick: u64) {
        self.last_seen_tick = tick;
    }

    pub fn has_change_filters(&self) -> bool {
        !self.added_filters.is_empty() || !self.changed_filters.is_empty()
    }

    pub fn matching(&self) -> &[usize] {
        &self.matching
    }

    /// Recompute the match list if the archetype count moved. Indices are
    /// never retired, so only new archetypes need checking.
    pub fn update_cache(&mut self, archetypes: &Archetypes) {
        let count = archetypes.len();
        if count < self.seen_archetypes {
            self.invalidate();
        }
        if count == self.seen_archetypes {
            return;
        }
        for (index, table) in archetypes.tables().iter().enumerate().skip(self.seen_archetypes) {
            let id = table.archetype_id();
            if id.contains_all(&self.required) && !id.contains_any(&self.excluded) {
                self.matching.push(index);
            }
        }
        self.seen_archetypes = count;
    }

    /// Forget the cached matches; the next `update_cache` rescans.
    pub fn invalidate(&mut self) {
        self.matching.clear();
        self.seen_archetypes = 0;
    }

    /// Row-level added/changed checks against `last_seen_tick`. All filters
    /// must hold.
    pub fn passes_change_filters(&self, table: &Table, row: usize) -> bool {
        for id in &self.added_filters {
            match table.ticks(*id, row) {
                Some(ticks) if ticks.is_added(self.last_seen_tick) => {}
                _ => return false,
            }
        }
        for id in &self.changed_filters {
            match table.ticks(*id, row) {
                Some(ticks) if ticks.is_changed(self.last_seen_tick) => {}
                _ => return false,
            }
        }
        true
    }

    pub(crate) fn key(&self) -> QueryKey {
        QueryKey {
            required: self.required.clone(),
            excluded: self.excluded.clone(),
        }
    }

    pub(crate) fn match_sets(
        &self,
    ) -> (SmallVec<[ComponentId; 8]>, SmallVec<[ComponentId; 8]>) {
        (self.required.clone(), self.excluded.clone())
    }

    pub(crate) fn adopt_matches(&mut self, matching: Vec<usize>, seen: usize) {
        self.matching = matching;
        self.seen_archetypes = seen;
    }

    fn change_plan(&self) -> ChangePlan {
        ChangePlan {
            added: self.added_filters.clone(),
            changed: self.changed_filters.clone(),
            last_seen: self.last_seen_tick,
        }
    }
}

/// Per-iterator copy of the change-filter plan.
#[derive(Debug, Clone)]
struct ChangePlan {
    added: SmallVec<[ComponentId; 4]>,
    changed: SmallVec<[ComponentId; 4]>,
    last_seen: u64,
}

macro_rules! impl_query {
    ($query:ident, $iter:ident, $cursor:ident; $($T:ident => $f:ident),+) => {
        /// Query wrapper over a mutable world borrow. Iteration yields
        /// `(Entity, &mut C, ..)`; component references alias live column
        /// storage for the duration of the iterator borrow.
        pub struct $query<'w, $($T: Component),+> {
            world: &'w mut World,
            state: QueryState,
            _marker: PhantomData<($($T,)+)>,
        }

        impl<'w, $($T: Component),+> $query<'w, $($T),+> {
            pub(crate) fn new(world: &'w mut World, filter: Filter) -> Self {
                let fetch = smallvec![$(component_id::<$T>()),+];
                Self {
                    world,
                    state: QueryState::new(fetch, filter),
                    _marker: PhantomData,
                }
            }

            /// Set the change-detection baseline: only cells whose relevant
            /// tick is strictly greater than `tick` pass added/changed
            /// filters.
            pub fn since(mut self, tick: u64) -> Self {
                self.state.set_last_seen(tick);
                self
            }

            pub fn state(&self) -> &QueryState {
                &self.state
            }

            fn refresh(&mut self) {
                self.world.refresh_query_state(&mut self.state);
            }

            pub fn iter(&mut self) -> $iter<'_, $($T),+> {
                self.refresh();
                let mut tables: SmallVec<[NonNull<Table>; 8]> = SmallVec::new();
                for &index in self.state.matching() {
                    if let Some(ptr) = self.world.table_ptr_mut(index) {
                        tables.push(ptr);
                    }
                }
                $iter {
                    tables,
                    plan: self.state.change_plan(),
                    table_pos: 0,
                    row: 0,
                    cursor: None,
                    _marker: PhantomData,
                }
            }

            /// Matching-entity count. Sums table lengths unless change
            /// filters force a row walk.
            pub fn count(&mut self) -> usize {
                self.refresh();
                if !self.state.has_change_filters() {
                    return self
                        .state
                        .matching()
                        .iter()
                        .filter_map(|&index| self.world.archetypes().table(index))
                        .map(|table| table.len())
                        .sum();
                }
                let mut total = 0;
                for &index in self.state.matching() {
                    let Some(table) = self.world.archetypes().table(index) else {
                        continue;
                    };
                    for row in 0..table.len() {
                        if self.state.passes_change_filters(table, row) {
                            total += 1;
                        }
                    }
                }
                total
            }
        }

        struct $cursor<$($T),+> {
            len: usize,
            entities: *const Entity,
            $($f: *mut $T,)+
            added: SmallVec<[*const ComponentTicks; 4]>,
            changed: SmallVec<[*const ComponentTicks; 4]>,
        }

        /// Raw-pointer iterator over the matching tables. The wrapper's
        /// mutable world borrow guarantees no structural change can happen
        /// while this is live.
        pub struct $iter<'q, $($T: Component),+> {
            tables: SmallVec<[NonNull<Table>; 8]>,
            plan: ChangePlan,
            table_pos: usize,
            row: usize,
            cursor: Option<$cursor<$($T),+>>,
            _marker: PhantomData<&'q mut World>,
        }

        impl<'q, $($T: Component),+> $iter<'q, $($T),+> {
            fn enter(&mut self, mut table: NonNull<Table>) -> Option<$cursor<$($T),+>> {
                // SAFETY: the pointer comes from the world the wrapper
                // mutably borrows; nothing else can touch the table.
                let table = unsafe { table.as_mut() };
                let len = table.len();
                let entities = table.entities().as_ptr();
                $(let $f = table.column_mut::<$T>()?.data_ptr();)+
                let mut added: SmallVec<[*const ComponentTicks; 4]> = SmallVec::new();
                for id in &self.plan.added {
                    added.push(table.ticks_slice(*id)?.as_ptr());
                }
                let mut changed: SmallVec<[*const ComponentTicks; 4]> = SmallVec::new();
                for id in &self.plan.changed {
                    changed.push(table.ticks_slice(*id)?.as_ptr());
                }
                Some($cursor { len, entities, $($f,)+ added, changed })
            }

            fn passes(&self, cursor: &$cursor<$($T),+>, row: usize) -> bool {
                // SAFETY: row < cursor.len, and tick columns are exactly as
                // long as the entity column.
                for ticks in &cursor.added {
                    if !unsafe { (*ticks.add(row)).is_added(self.plan.last_seen) } {
                        return false;
                    }
                }
                for ticks in &cursor.changed {
                    if !unsafe { (*ticks.add(row)).is_changed(self.plan.last_seen) } {
                        return false;
                    }
                }
                true
            }
        }

        impl<'q, $($T: Component),+> Iterator for $iter<'q, $($T),+> {
            type Item = (Entity, $(&'q mut $T),+);

            fn next(&mut self) -> Option<Self::Item> {
                loop {
                    if self.cursor.is_none() {
                        if self.table_pos >= self.tables.len() {
                            return None;
                        }
                        self.cursor = self.enter(self.tables[self.table_pos]);
                        self.row = 0;
                        if self.cursor.is_none() {
                            // Matching table lost a fetch column; stale cache.
                            self.table_pos += 1;
                            continue;
                        }
                    }

                    let done = {
                        let cursor = self.cursor.as_ref().unwrap();
                        self.row >= cursor.len
                    };
                    if done {
                        self.cursor = None;
                        self.table_pos += 1;
                        continue;
                    }

                    let row = self.row;
                    self.row += 1;

                    let cursor = self.cursor.as_ref().unwrap();
                    if !self.passes(cursor, row) {
                        continue;
                    }

                    // SAFETY: row bounds-checked above; fetch ids are
                    // distinct so the mutable references never alias.
                    unsafe {
                        let entity = *cursor.entities.add(row);
                        return Some((entity, $(&mut *cursor.$f.add(row)),+));
                    }
                }
            }
        }
    };
}

impl_query!(Query1, QueryIter1, Cursor1; A => a);
impl_query!(Query2, QueryIter2, Cursor2; A => a, B => b);
impl_query!(Query3, QueryIter3, Cursor3; A => a, B => b, C => c);
impl_query!(Query4, QueryIter4, Cursor4; A => a, B => b, C => c, D => d);
