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

//! Lattice ECS — archetype-based Entity Component System.
//!
//! Entities are generational indices into column-oriented archetype tables;
//! queries iterate cached archetype matches with added/changed filtering;
//! systems run in a staged, topologically sorted schedule with run
//! conditions, system sets and deferred command buffers; apps compose the
//! whole thing out of plugins.

pub mod app;
pub mod archetype;
pub mod command;
pub mod component;
pub mod debug;
pub mod entity;
pub mod error;
pub mod event;
pub mod hierarchy;
pub mod observer;
pub mod query;
pub mod reflect;
pub mod resource;
pub mod schedule;
pub mod state;
pub mod system;
pub mod time;
pub mod world;

pub mod prelude;

// Re-exports for convenience
pub use app::{App, AppExit, Plugin};
pub use archetype::{ArchetypeId, Archetypes, Table};
pub use command::{Commands, EntityCommands, PendingEntity};
pub use component::{component_id, Bundle, Component, ComponentId, ComponentTicks};
pub use debug::{FrameDiagnostics, WorldInspector};
pub use entity::{Entity, EntityLocation};
pub use error::{EcsError, Result};
pub use event::{EventQueue, EventReadWriter, EventReader, EventWriter, Events};
pub use hierarchy::{Children, Parent};
pub use observer::Observers;
pub use query::{Filter, Query1, Query2, Query3, Query4, QueryState};
pub use reflect::{FieldInfo, TypeRegistry};
pub use resource::{Res, ResMut, Resources};
pub use schedule::{CoreStage, IntoSystemConfig, Schedule, SystemConfig, SystemSet};
pub use state::{State, StateRegistry, StateValue};
pub use system::{in_state, system, BoxedSystem, FunctionSystem, RunCondition, System, SystemMeta};
pub use time::Time;
pub use world::{QueryCacheStats, World};
