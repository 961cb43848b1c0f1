//! Component-lifecycle observers.
//!
//! For each component type the world keeps three callback lists: on-add,
//! on-change and on-remove, fired synchronously from the mutation that
//! caused the transition. Callbacks may read the world but must not mutate
//! archetype structure directly; structural follow-ups go through the
//! supplied [`Commands`] buffer, which the scheduler drains after the
//! triggering system.

use ahash::AHashMap;

use crate::command::Commands;
use crate::component::{component_id, Component, ComponentId};
use crate::entity::Entity;
use crate::world::World;

/// Observer callback signature.
pub type ObserverFn = Box<dyn Fn(&World, Entity, &mut Commands) + Send + Sync>;

/// Which lifecycle edge a hook listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Added,
    Changed,
    Removed,
}

#[derive(Default)]
pub(crate) struct ComponentHooks {
    pub(crate) on_add: Vec<ObserverFn>,
    pub(crate) on_change: Vec<ObserverFn>,
    pub(crate) on_remove: Vec<ObserverFn>,
}

impl ComponentHooks {
    pub(crate) fn list(&self, lifecycle: Lifecycle) -> &[ObserverFn] {
        match lifecycle {
            Lifecycle::Added => &self.on_add,
            Lifecycle::Changed => &self.on_change,
            Lifecycle::Removed => &self.on_remove,
        }
    }

    fn is_empty(&self) -> bool {
        self.on_add.is_empty() && self.on_change.is_empty() && self.on_remove.is_empty()
    }
}

/// Per-component observer lists.
#[derive(Default)]
pub struct Observers {
    hooks: AHashMap<ComponentId, ComponentHooks>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_add<T: Component>(
        &mut self,
        callback: impl Fn(&World, Entity, &mut Commands) + Send + Sync + 'static,
    ) {
        self.hooks
            .entry(component_id::<T>())
            .or_default()
            .on_add
            .push(Box::new(callback));
    }

    pub fn on_change<T: Component>(
        &mut self,
        callback: impl Fn(&World, Entity, &mut Commands) + Send + Sync + 'static,
    ) {
        self.hooks
            .entry(component_id::<T>())
            .or_default()
            .on_change
            .push(Box::new(callback));
    }

    pub fn on_remove<T: Component>(
        &mut self,
        callback: impl Fn(&World, Entity, &mut Commands) + Send + Sync + 'static,
    ) {
        self.hooks
            .entry(component_id::<T>())
            .or_default()
            .on_remove
            .push(Box::new(callback));
    }

    /// True iff any hook is registered for the component.
    pub fn has_hooks(&self, id: ComponentId) -> bool {
        self.hooks.get(&id).is_some_and(|h| !h.is_empty())
    }

    pub fn hook_count(&self) -> usize {
        self.hooks
            .values()
            .map(|h| h.on_add.len() + h.on_change.len() + h.on_remove.len())
            .sum()
    }

    // The world lifts hooks out while firing so callbacks can borrow the
    // world immutably; registration needs &mut World, so the lists cannot
    // change underneath.
    pub(crate) fn take_hooks(&mut self, id: ComponentId) -> Option<ComponentHooks> {
        self.hooks.remove(&id)
    }

    pub(crate) fn put_back(&mut self, id: ComponentId, hooks: ComponentHooks) {
        self.hooks.insert(id, hooks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Health(#[allow(dead_code)] u32);

    #[test]
    fn registration_and_counts() {
        let mut observers = Observers::new();
        assert!(!observers.has_hooks(component_id::<Health>()));

        observers.on_add::<Health>(|_, _, _| {});
        observers.on_remove::<Health>(|_, _, _| {});

        assert!(observers.has_hooks(component_id::<Health>()));
        assert_eq!(observers.hook_count(), 2);
    }

    #[test]
    fn take_and_put_back_round_trip() {
        let mut observers = Observers::new();
        observers.on_change::<Health>(|_, _, _| {});

        let id = component_id::<Health>();
        let hooks = observers.take_hooks(id).unwrap();
        assert_eq!(hooks.list(Lifecycle::Changed).len(), 1);
        assert!(!observers.has_hooks(id));

        observers.put_back(id, hooks);
        assert!(observers.has_hooks(id));
    }
}
