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

//! Archetype storage: canonical signatures, column tables, edge caches.
//!
//! A [`Table`] is Structure-of-Arrays storage for all entities sharing one
//! component set. Rows are removed with swap-remove; the caller is
//! responsible for fixing up the swapped entity's location. [`Archetypes`]
//! owns every table plus the add/remove edge caches that memoize component
//! transitions.

use std::any::Any;
use std::hash::{Hash, Hasher};

use ahash::AHashMap;
use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;

use crate::component::{component_id, Component, ComponentId, ComponentTicks};
use crate::entity::Entity;
use crate::error::{EcsError, Result};

/// Canonical, immutable component-set key: sorted ids plus precomputed hash.
#[derive(Debug, Clone)]
pub struct ArchetypeId {
    ids: SmallVec<[ComponentId; 8]>,
    hash: u64,
}

impl ArchetypeId {
    /// The empty component set (archetype index 0).
    pub fn empty() -> Self {
        Self::from_sorted(SmallVec::new())
    }

    /// Build from ids in any order; sorts and dedups.
    pub fn from_unsorted(mut ids: SmallVec<[ComponentId; 8]>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Self::from_sorted(ids)
    }

    fn from_sorted(ids: SmallVec<[ComponentId; 8]>) -> Self {
        let mut hasher = FxHasher::default();
        for id in &ids {
            hasher.write_u32(id.0);
        }
        let hash = hasher.finish();
        Self { ids, hash }
    }

    pub fn ids(&self) -> &[ComponentId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Signature with `id` added (self if already present).
    pub fn with_component(&self, id: ComponentId) -> Self {
        match self.ids.binary_search(&id) {
            Ok(_) => self.clone(),
            Err(pos) => {
                let mut ids = self.ids.clone();
                ids.insert(pos, id);
                Self::from_sorted(ids)
            }
        }
    }

    /// Signature with `id` removed (self if absent).
    pub fn without_component(&self, id: ComponentId) -> Self {
        match self.ids.binary_search(&id) {
            Ok(pos) => {
                let mut ids = self.ids.clone();
                ids.remove(pos);
                Self::from_sorted(ids)
            }
            Err(_) => self.clone(),
        }
    }

    /// True iff every id in `required` (sorted) is present. Linear merge.
    pub fn contains_all(&self, required: &[ComponentId]) -> bool {
        let mut own = self.ids.iter();
        'outer: for want in required {
            for have in own.by_ref() {
                match have.cmp(want) {
                    std::cmp::Ordering::Less => continue,
                    std::cmp::Ordering::Equal => continue 'outer,
                    std::cmp::Ordering::Greater => return false,
                }
            }
            return false;
        }
        true
    }

    /// True iff any id in `excluded` (sorted) is present. Linear merge.
    pub fn contains_any(&self, excluded: &[ComponentId]) -> bool {
        let mut a = self.ids.iter();
        let mut b = excluded.iter();
        let (mut x, mut y) = (a.next(), b.next());
        while let (Some(have), Some(want)) = (x, y) {
            match have.cmp(want) {
                std::cmp::Ordering::Less => x = a.next(),
                std::cmp::Ordering::Greater => y = b.next(),
                std::cmp::Ordering::Equal => return true,
            }
        }
        false
    }
}

impl PartialEq for ArchetypeId {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl Eq for ArchetypeId {}

impl Hash for ArchetypeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// Type-erased column interface. Every column moves its values and its tick
/// cells together.
pub(crate) trait ColumnData: Send + Sync {
    fn component_id(&self) -> ComponentId;
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Swap-remove the row, dropping the value.
    fn swap_remove(&mut self, row: usize);

    /// Swap-remove the row out of this column and append value + ticks to
    /// `dst`, which must be a column of the same component type.
    fn transfer(&mut self, row: usize, dst: &mut dyn ColumnData);

    /// Fresh zero-length column of the same component type.
    fn clone_empty(&self) -> Box<dyn ColumnData>;

    fn ticks(&self) -> &[ComponentTicks];
    fn set_changed(&mut self, row: usize, tick: u64);
}

/// Monomorphic column storage for one component type.
pub struct Column<T> {
    id: ComponentId,
    data: Vec<T>,
    ticks: Vec<ComponentTicks>,
}

impl<T: Component> Column<T> {
    fn new() -> Self {
        Self {
            id: component_id::<T>(),
            data: Vec::new(),
            ticks: Vec::new(),
        }
    }

    pub fn push(&mut self, value: T, ticks: ComponentTicks) {
        self.data.push(value);
        self.ticks.push(ticks);
    }

    pub fn get(&self, row: usize) -> Option<&T> {
        self.data.get(row)
    }

    pub fn get_mut(&mut self, row: usize) -> Option<&mut T> {
        self.data.get_mut(row)
    }

    /// Swap-remove the value and its ticks out of the column.
    pub fn swap_remove_value(&mut self, row: usize) -> Option<(T, ComponentTicks)> {
        if row >= self.data.len() {
            return None;
        }
        Some((self.data.swap_remove(row), self.ticks.swap_remove(row)))
    }

    pub fn ticks_at(&self, row: usize) -> Option<ComponentTicks> {
        self.ticks.get(row).copied()
    }

    pub(crate) fn data_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr()
    }
}

impl<T: Component> ColumnData for Column<T> {
    fn component_id(&self) -> ComponentId {
        self.id
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn swap_remove(&mut self, row: usize) {
        self.data.swap_remove(row);
        self.ticks.swap_remove(row);
    }

    fn transfer(&mut self, row: usize, dst: &mut dyn ColumnData) {
        let value = self.data.swap_remove(row);
        let ticks = self.ticks.swap_remove(row);
        let dst = dst
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .expect("transfer between columns of different component types");
        dst.data.push(value);
        dst.ticks.push(ticks);
    }

    fn clone_empty(&self) -> Box<dyn ColumnData> {
        Box::new(Column::<T>::new())
    }

    fn ticks(&self) -> &[ComponentTicks] {
        &self.ticks
    }

    fn set_changed(&mut self, row: usize, tick: u64) {
        if let Some(cell) = self.ticks.get_mut(row) {
            cell.changed = tick;
        }
    }
}

/// Structure-of-Arrays storage for one archetype.
pub struct Table {
    archetype_id: ArchetypeId,
    entities: Vec<Entity>,
    columns: Vec<Box<dyn ColumnData>>,
    column_index: FxHashMap<ComponentId, usize>,
}

impl Table {
    fn new(archetype_id: ArchetypeId) -> Self {
        Self {
            archetype_id,
            entities: Vec::new(),
            columns: Vec::new(),
            column_index: FxHashMap::default(),
        }
    }

    pub fn archetype_id(&self) -> &ArchetypeId {
        &self.archetype_id
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Register an empty column for `T` if none exists yet.
    pub fn register_column<T: Component>(&mut self) {
        let id = component_id::<T>();
        if !self.column_index.contains_key(&id) {
            self.column_index.insert(id, self.columns.len());
            self.columns.push(Box::new(Column::<T>::new()));
        }
    }

    pub(crate) fn add_column_raw(&mut self, column: Box<dyn ColumnData>) {
        let id = column.component_id();
        if !self.column_index.contains_key(&id) {
            self.column_index.insert(id, self.columns.len());
            self.columns.push(column);
        }
    }

    pub fn has_column(&self, id: ComponentId) -> bool {
        self.column_index.contains_key(&id)
    }

    pub fn column<T: Component>(&self) -> Option<&Column<T>> {
        let idx = *self.column_index.get(&component_id::<T>())?;
        self.columns[idx].as_any().downcast_ref()
    }

    pub fn column_mut<T: Component>(&mut self) -> Option<&mut Column<T>> {
        let idx = *self.column_index.get(&component_id::<T>())?;
        self.columns[idx].as_any_mut().downcast_mut()
    }

    /// Append a row for `entity`; component values follow through
    /// [`Bundle::write_into`](crate::component::Bundle::write_into) or
    /// typed column pushes.
    pub fn push_entity(&mut self, entity: Entity) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        row
    }

    /// Swap-remove an entire row. Returns the entity that moved into `row`
    /// (none if `row` was last); the caller updates its location.
    pub fn swap_remove(&mut self, row: usize) -> Option<Entity> {
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }

    /// Move row `row` into `dst`, preserving tick cells. Columns absent from
    /// `dst` are dropped; a column named in `skip` is expected to have been
    /// taken out typed already. Returns the entity swapped into `row`.
    pub(crate) fn move_row_to(
        &mut self,
        row: usize,
        dst: &mut Table,
        skip: Option<ComponentId>,
    ) -> Option<Entity> {
        for column in &mut self.columns {
            let id = column.component_id();
            if Some(id) == skip {
                continue;
            }
            match dst.column_index.get(&id).copied() {
                Some(idx) => column.transfer(row, dst.columns[idx].as_mut()),
                None => column.swap_remove(row),
            }
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }

    /// Fresh empty columns mirroring this table's layout.
    pub(crate) fn clone_empty_columns(&self) -> Vec<Box<dyn ColumnData>> {
        self.columns.iter().map(|c| c.clone_empty()).collect()
    }

    pub fn get_component<T: Component>(&self, row: usize) -> Option<&T> {
        self.column::<T>()?.get(row)
    }

    /// Mutable access; bumps the cell's `changed` tick when one is supplied.
    pub fn get_component_mut<T: Component>(
        &mut self,
        row: usize,
        current_tick: Option<u64>,
    ) -> Option<&mut T> {
        let column = self.column_mut::<T>()?;
        if let Some(tick) = current_tick {
            column.set_changed(row, tick);
        }
        column.get_mut(row)
    }

    /// Overwrite in place. Bumps only `changed` when a tick is supplied;
    /// `added` keeps its history.
    pub fn set_component<T: Component>(
        &mut self,
        row: usize,
        value: T,
        current_tick: Option<u64>,
    ) -> Result<()> {
        let column = self
            .column_mut::<T>()
            .ok_or(EcsError::MissingComponent(std::any::type_name::<T>()))?;
        match column.get_mut(row) {
            Some(slot) => {
                *slot = value;
                if let Some(tick) = current_tick {
                    column.set_changed(row, tick);
                }
                Ok(())
            }
            None => Err(EcsError::MissingComponent(std::any::type_name::<T>())),
        }
    }

    pub fn ticks(&self, id: ComponentId, row: usize) -> Option<ComponentTicks> {
        let idx = *self.column_index.get(&id)?;
        self.columns[idx].ticks().get(row).copied()
    }

    pub fn ticks_slice(&self, id: ComponentId) -> Option<&[ComponentTicks]> {
        let idx = *self.column_index.get(&id)?;
        Some(self.columns[idx].ticks())
    }

    #[cfg(debug_assertions)]
    pub(crate) fn assert_consistent(&self) {
        for column in &self.columns {
            debug_assert_eq!(
                column.len(),
                self.entities.len(),
                "column length diverged from entity count"
            );
        }
    }
}

/// All tables plus the signature index and transition edge caches.
///
/// Archetype indices are stable and monotonically allocated; index 0 is
/// always the empty archetype. Indices are never reused, which is what keeps
/// query caches monotonically correct.
pub struct Archetypes {
    tables: Vec<Table>,
    index: AHashMap<ArchetypeId, usize>,
    add_edges: AHashMap<(usize, ComponentId), usize>,
    remove_edges: AHashMap<(usize, ComponentId), usize>,
}

impl Archetypes {
    pub fn new() -> Self {
        let mut archetypes = Self {
            tables: Vec::with_capacity(64),
            index: AHashMap::with_capacity(64),
            add_edges: AHashMap::with_capacity(128),
            remove_edges: AHashMap::with_capacity(128),
        };
        // The empty archetype always sits at index 0.
        archetypes.get_or_create_with(ArchetypeId::empty(), |_| {});
        archetypes
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }

    pub fn table_mut(&mut self, index: usize) -> Option<&mut Table> {
        self.tables.get_mut(index)
    }

    pub fn try_table(&self, index: usize) -> Result<&Table> {
        let len = self.tables.len();
        self.tables
            .get(index)
            .ok_or(EcsError::ArchetypeIndexOutOfRange { index, len })
    }

    pub fn try_table_mut(&mut self, index: usize) -> Result<&mut Table> {
        let len = self.tables.len();
        self.tables
            .get_mut(index)
            .ok_or(EcsError::ArchetypeIndexOutOfRange { index, len })
    }

    /// O(1) lookup; on miss, append a fresh table and let `on_create`
    /// register its columns before anything can observe it.
    pub fn get_or_create_with<F>(&mut self, id: ArchetypeId, on_create: F) -> usize
    where
        F: FnOnce(&mut Table),
    {
        if let Some(&index) = self.index.get(&id) {
            return index;
        }
        let mut table = Table::new(id.clone());
        on_create(&mut table);
        let index = self.tables.len();
        self.tables.push(table);
        self.index.insert(id, index);
        index
    }

    /// Cached `(from, +component)` transition target. `register` adds the
    /// new component's column if the target table is created here.
    pub fn add_target<F>(&mut self, from: usize, component: ComponentId, register: F) -> Result<usize>
    where
        F: FnOnce(&mut Table),
    {
        if let Some(&target) = self.add_edges.get(&(from, component)) {
            return Ok(target);
        }
        let source = self.try_table(from)?;
        let target_id = source.archetype_id().with_component(component);
        let columns = source.clone_empty_columns();
        let target = self.get_or_create_with(target_id, |table| {
            for column in columns {
                table.add_column_raw(column);
            }
            register(table);
        });
        self.add_edges.insert((from, component), target);
        Ok(target)
    }

    /// Cached `(from, -component)` transition target.
    pub fn remove_target(&mut self, from: usize, component: ComponentId) -> Result<usize> {
        if let Some(&target) = self.remove_edges.get(&(from, component)) {
            return Ok(target);
        }
        let source = self.try_table(from)?;
        let target_id = source.archetype_id().without_component(component);
        let columns: Vec<_> = source
            .clone_empty_columns()
            .into_iter()
            .filter(|c| c.component_id() != component)
            .collect();
        let target = self.get_or_create_with(target_id, |table| {
            for column in columns {
                table.add_column_raw(column);
            }
        });
        self.remove_edges.insert((from, component), target);
        Ok(target)
    }

    /// Split-borrow two distinct tables for a row migration.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut Table, &mut Table) {
        debug_assert_ne!(a, b, "pair_mut requires distinct tables");
        if a < b {
            let (left, right) = self.tables.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.tables.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    /// Drop every table and edge, then re-bootstrap the empty archetype.
    /// Callers must also invalidate any cached archetype indices.
    pub fn clear(&mut self) {
        self.tables.clear();
        self.index.clear();
        self.add_edges.clear();
        self.remove_edges.clear();
        self.get_or_create_with(ArchetypeId::empty(), |_| {});
    }
}

impl Default for Archetypes {
    fn default() -> Self {
        Self::new()
    }
}
