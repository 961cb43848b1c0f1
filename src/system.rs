//! System trait, access metadata and run conditions.
//!
//! A system is meta + optional run condition + a run function. The meta
//! declares which components, resources and events the system touches;
//! the schedule uses it for diagnostics and the §5-style compatibility
//! check, and its name labels error logs.

use std::any::TypeId;
use std::borrow::Cow;

use crate::command::Commands;
use crate::component::{component_id, Component, ComponentId};
use crate::error::Result;
use crate::state::StateValue;
use crate::world::World;

/// Pure predicate gating a system's execution each tick.
pub type RunCondition = Box<dyn Fn(&World) -> bool + Send + Sync>;

/// Declared access sets and exclusivity for one system.
#[derive(Debug, Clone)]
pub struct SystemMeta {
    name: Cow<'static, str>,
    reads: Vec<ComponentId>,
    writes: Vec<ComponentId>,
    resource_reads: Vec<TypeId>,
    resource_writes: Vec<TypeId>,
    event_reads: Vec<TypeId>,
    event_writes: Vec<TypeId>,
    exclusive: bool,
}

impl SystemMeta {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            reads: Vec::new(),
            writes: Vec::new(),
            resource_reads: Vec::new(),
            resource_writes: Vec::new(),
            event_reads: Vec::new(),
            event_writes: Vec::new(),
            exclusive: false,
        }
    }

    pub fn reads<T: Component>(mut self) -> Self {
        self.reads.push(component_id::<T>());
        self
    }

    pub fn writes<T: Component>(mut self) -> Self {
        self.writes.push(component_id::<T>());
        self
    }

    pub fn reads_resource<R: 'static>(mut self) -> Self {
        self.resource_reads.push(TypeId::of::<R>());
        self
    }

    pub fn writes_resource<R: 'static>(mut self) -> Self {
        self.resource_writes.push(TypeId::of::<R>());
        self
    }

    pub fn reads_event<E: 'static>(mut self) -> Self {
        self.event_reads.push(TypeId::of::<E>());
        self
    }

    pub fn writes_event<E: 'static>(mut self) -> Self {
        self.event_writes.push(TypeId::of::<E>());
        self
    }

    /// Mark the system as requiring sole access to the world. Exclusive
    /// systems never overlap others and see all command buffers drained.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Two systems may run concurrently iff their write sets are disjoint
    /// from each other's read and write sets, per access class. Exclusive
    /// systems are compatible with nothing.
    pub fn is_compatible(&self, other: &SystemMeta) -> bool {
        if self.exclusive || other.exclusive {
            return false;
        }
        disjoint(&self.writes, &other.writes)
            && disjoint(&self.writes, &other.reads)
            && disjoint(&other.writes, &self.reads)
            && disjoint(&self.resource_writes, &other.resource_writes)
            && disjoint(&self.resource_writes, &other.resource_reads)
            && disjoint(&other.resource_writes, &self.resource_reads)
            && disjoint(&self.event_writes, &other.event_writes)
            && disjoint(&self.event_writes, &other.event_reads)
            && disjoint(&other.event_writes, &self.event_reads)
    }
}

fn disjoint<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.iter().all(|x| !b.contains(x))
}

/// System trait
pub trait System: Send + Sync {
    fn meta(&self) -> &SystemMeta;

    fn run_condition(&self) -> Option<&RunCondition> {
        None
    }

    fn should_run(&self, world: &World) -> bool {
        self.run_condition().is_none_or(|cond| cond(world))
    }

    /// Run for one tick. Structural changes made mid-iteration go through
    /// `commands`; the scheduler applies the buffer right after this
    /// returns.
    fn run(&mut self, world: &mut World, commands: &mut Commands) -> Result<()>;
}

/// Boxed system
pub type BoxedSystem = Box<dyn System>;

/// Closure-backed system with an explicit meta builder.
pub struct FunctionSystem<F> {
    meta: SystemMeta,
    condition: Option<RunCondition>,
    func: F,
}

impl<F> FunctionSystem<F>
where
    F: FnMut(&mut World, &mut Commands) -> Result<()> + Send + Sync + 'static,
{
    pub fn new(meta: SystemMeta, func: F) -> Self {
        Self {
            meta,
            condition: None,
            func,
        }
    }

    pub fn with_run_condition(
        mut self,
        condition: impl Fn(&World) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }
}

impl<F> System for FunctionSystem<F>
where
    F: FnMut(&mut World, &mut Commands) -> Result<()> + Send + Sync + 'static,
{
    fn meta(&self) -> &SystemMeta {
        &self.meta
    }

    fn run_condition(&self) -> Option<&RunCondition> {
        self.condition.as_ref()
    }

    fn run(&mut self, world: &mut World, commands: &mut Commands) -> Result<()> {
        (self.func)(world, commands)
    }
}

/// Shorthand for a named closure system with empty access sets.
pub fn system<F>(name: &'static str, func: F) -> FunctionSystem<F>
where
    F: FnMut(&mut World, &mut Commands) -> Result<()> + Send + Sync + 'static,
{
    FunctionSystem::new(SystemMeta::new(name), func)
}

/// Run condition: true iff the registered `State<S>` currently equals
/// `value`. Transitions apply at end of tick, so during the requesting tick
/// this still sees the old state.
pub fn in_state<S: StateValue>(value: S) -> RunCondition {
    Box::new(move |world| {
        world
            .state::<S>()
            .is_some_and(|state| *state.current() == value)
    })
}
