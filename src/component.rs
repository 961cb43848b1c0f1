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

//! Component trait, stable component identifiers and bundles.
//!
//! Components are plain data attached to entities. Bundles group components
//! for spawning. Every component type is interned to a [`ComponentId`] at
//! first use; the id is stable and totally ordered for the process lifetime,
//! which is what archetype signatures sort and hash by.

use std::any::TypeId;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use smallvec::{smallvec, SmallVec};

use crate::archetype::Table;

/// Maximum number of components supported by Bundle implementations
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// Last-write ticks for one component cell.
///
/// Both ticks travel with the component across archetype migrations;
/// overwrite-in-place bumps only `changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentTicks {
    pub added: u64,
    pub changed: u64,
}

impl ComponentTicks {
    /// Fresh cell: both ticks stamped with the current tick.
    pub fn new(tick: u64) -> Self {
        Self {
            added: tick,
            changed: tick,
        }
    }

    pub fn is_added(&self, last_seen: u64) -> bool {
        self.added > last_seen
    }

    pub fn is_changed(&self, last_seen: u64) -> bool {
        self.changed > last_seen
    }
}

/// Marker trait for components
///
/// Components must be 'static (no borrowed data)
pub trait Component: 'static + Send + Sync {}

/// Automatically implement Component for all valid types
impl<T: 'static + Send + Sync> Component for T {}

/// Stable, totally ordered identifier for a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u32);

struct ComponentInterner {
    ids: ahash::AHashMap<TypeId, ComponentId>,
    names: Vec<&'static str>,
}

static INTERNER: Lazy<RwLock<ComponentInterner>> = Lazy::new(|| {
    RwLock::new(ComponentInterner {
        ids: ahash::AHashMap::new(),
        names: Vec::new(),
    })
});

/// Intern the id for `T`, allocating one on first use.
pub fn component_id<T: Component>() -> ComponentId {
    let type_id = TypeId::of::<T>();
    {
        let interner = INTERNER.read();
        if let Some(&id) = interner.ids.get(&type_id) {
            return id;
        }
    }
    let mut interner = INTERNER.write();
    // Re-check: another thread may have won the race between the locks.
    if let Some(&id) = interner.ids.get(&type_id) {
        return id;
    }
    let id = ComponentId(interner.names.len() as u32);
    interner.names.push(std::any::type_name::<T>());
    interner.ids.insert(type_id, id);
    id
}

/// Full type name recorded at interning time, for diagnostics.
pub fn component_name(id: ComponentId) -> &'static str {
    INTERNER
        .read()
        .names
        .get(id.0 as usize)
        .copied()
        .unwrap_or("<unknown component>")
}

/// Bundle of components
///
/// Allows spawning entities with multiple components at once.
pub trait Bundle: Send + Sync + 'static {
    /// Component ids in declaration order
    fn component_ids() -> SmallVec<[ComponentId; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// Ensure component columns exist in a table
    fn register_columns(table: &mut Table)
    where
        Self: Sized;

    /// Append one value per column, stamping fresh ticks.
    ///
    /// Caller must have pushed the owning entity's row first so that column
    /// lengths line back up with `entities.len()`.
    fn write_into(self, table: &mut Table, tick: u64);
}

// Macro for tuple Bundle implementations
macro_rules! impl_bundle {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn component_ids() -> SmallVec<[ComponentId; MAX_BUNDLE_COMPONENTS]> {
                smallvec![$(component_id::<$T>()),*]
            }

            fn register_columns(table: &mut Table) {
                $(table.register_column::<$T>();)*
            }

            #[allow(non_snake_case)]
            fn write_into(self, table: &mut Table, tick: u64) {
                let ($($T,)*) = self;
                let ticks = ComponentTicks::new(tick);
                $(
                    table
                        .column_mut::<$T>()
                        .expect("bundle column missing from destination table")
                        .push($T, ticks);
                )*
            }
        }
    };
}

// Implement for tuples of 1-8 components
impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
