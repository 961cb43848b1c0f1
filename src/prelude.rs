//! Convenient re-exports of commonly used types.
//!
//! ```
//! use lattice_ecs::prelude::*;
//! ```

pub use crate::app::{App, AppExit, Plugin};
pub use crate::command::Commands;
pub use crate::component::Component;
pub use crate::debug::{FrameDiagnostics, WorldInspector};
pub use crate::entity::Entity;
pub use crate::error::{EcsError, Result};
pub use crate::event::{EventReader, EventWriter};
pub use crate::hierarchy::{Children, Parent};
pub use crate::query::Filter;
pub use crate::reflect::TypeRegistry;
pub use crate::schedule::{CoreStage, SystemConfig, SystemSet};
pub use crate::state::State;
pub use crate::system::{in_state, system, SystemMeta};
pub use crate::time::Time;
pub use crate::world::World;
