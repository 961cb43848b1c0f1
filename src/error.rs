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

//! Error types

use std::fmt;

use crate::entity::Entity;

/// ECS error type
#[derive(Debug, Clone)]
pub enum EcsError {
    /// Operation referenced an entity that is not alive
    DeadEntity(Entity),

    /// Structural operation expected a component on the target archetype
    MissingComponent(&'static str),

    /// Reader/writer requested for an event type that was never registered
    UnregisteredEvent(&'static str),

    /// Internal consistency failure: stale archetype index
    ArchetypeIndexOutOfRange { index: usize, len: usize },

    /// Topological sort could not order a stage
    ScheduleCycle(Vec<String>),

    /// Schedule wiring error (unknown set, bad configuration)
    ScheduleConfig(String),

    /// A plugin's build failed; app construction aborts
    PluginBuildFailure(String),

    /// Type registry miss or JSON shape mismatch
    SerializationError(String),

    /// Attaching a parent would create a hierarchy cycle
    HierarchyCycle { child: Entity, parent: Entity },

    /// Deferred command could not be applied
    CommandError(String),
}

impl EcsError {
    /// Fatal errors abort the tick; everything else is logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EcsError::ScheduleCycle(_)
                | EcsError::ScheduleConfig(_)
                | EcsError::PluginBuildFailure(_)
        )
    }
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::DeadEntity(e) => write!(f, "entity {e:?} is not alive"),
            EcsError::MissingComponent(component) => {
                write!(f, "target archetype has no component {component}")
            }
            EcsError::UnregisteredEvent(name) => {
                write!(f, "event type {name} was never registered")
            }
            EcsError::ArchetypeIndexOutOfRange { index, len } => {
                write!(f, "archetype index {index} out of range (len {len})")
            }
            EcsError::ScheduleCycle(names) => {
                write!(f, "schedule cycle between systems: {}", names.join(", "))
            }
            EcsError::ScheduleConfig(msg) => write!(f, "schedule configuration error: {msg}"),
            EcsError::PluginBuildFailure(msg) => write!(f, "plugin build failed: {msg}"),
            EcsError::SerializationError(msg) => write!(f, "serialization error: {msg}"),
            EcsError::HierarchyCycle { child, parent } => {
                write!(
                    f,
                    "attaching {child:?} under {parent:?} would create a cycle"
                )
            }
            EcsError::CommandError(msg) => write!(f, "command error: {msg}"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
