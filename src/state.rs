//! Enum state machines with deferred transitions.
//!
//! `set` only requests a transition; it takes effect when the tick
//! orchestrator calls `apply_transitions` at end-of-frame, so run conditions
//! evaluated during the requesting tick still see the old state. The
//! `just_entered` / `just_exited` edges hold for exactly one tick.

use std::any::{Any, TypeId};

use ahash::AHashMap;

/// Value types usable as machine states (typically fieldless enums).
pub trait StateValue: Clone + PartialEq + Send + Sync + 'static {}

impl<T: Clone + PartialEq + Send + Sync + 'static> StateValue for T {}

/// One state machine.
#[derive(Debug, Clone)]
pub struct State<S: StateValue> {
    current: S,
    pending: Option<S>,
    just_entered: bool,
    just_exited: bool,
}

impl<S: StateValue> State<S> {
    pub fn new(initial: S) -> Self {
        Self {
            current: initial,
            pending: None,
            just_entered: false,
            just_exited: false,
        }
    }

    pub fn current(&self) -> &S {
        &self.current
    }

    /// Request a transition; a no-op when `next` equals the current state.
    pub fn set(&mut self, next: S) {
        if next != self.current {
            self.pending = Some(next);
        } else {
            self.pending = None;
        }
    }

    pub fn pending(&self) -> Option<&S> {
        self.pending.as_ref()
    }

    /// True for the single tick following an applied transition.
    pub fn just_entered(&self) -> bool {
        self.just_entered
    }

    pub fn just_exited(&self) -> bool {
        self.just_exited
    }

    /// Clear the edge flags, then apply a pending transition if present.
    pub fn apply_transition(&mut self) {
        self.just_entered = false;
        self.just_exited = false;
        if let Some(next) = self.pending.take() {
            self.just_exited = true;
            self.current = next;
            self.just_entered = true;
        }
    }
}

trait AnyState: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn apply_transition(&mut self);
}

impl<S: StateValue> AnyState for State<S> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn apply_transition(&mut self) {
        State::apply_transition(self);
    }
}

/// All registered state machines, keyed by state type.
#[derive(Default)]
pub struct StateRegistry {
    states: AHashMap<TypeId, Box<dyn AnyState>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a machine at `initial`. Re-registering a type resets it.
    pub fn add<S: StateValue>(&mut self, initial: S) {
        self.states
            .insert(TypeId::of::<S>(), Box::new(State::new(initial)));
    }

    pub fn contains<S: StateValue>(&self) -> bool {
        self.states.contains_key(&TypeId::of::<S>())
    }

    pub fn get<S: StateValue>(&self) -> Option<&State<S>> {
        self.states
            .get(&TypeId::of::<S>())
            .and_then(|s| s.as_any().downcast_ref())
    }

    pub fn get_mut<S: StateValue>(&mut self) -> Option<&mut State<S>> {
        self.states
            .get_mut(&TypeId::of::<S>())
            .and_then(|s| s.as_any_mut().downcast_mut())
    }

    /// Apply every machine's pending transition. Called exactly once per
    /// tick by the orchestrator, after the schedule has run.
    pub fn apply_transitions(&mut self) {
        for state in self.states.values_mut() {
            state.apply_transition();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum GameState {
        Menu,
        Playing,
    }

    #[test]
    fn transition_is_deferred() {
        let mut state = State::new(GameState::Menu);
        state.set(GameState::Playing);
        assert_eq!(*state.current(), GameState::Menu);
        assert!(!state.just_entered());

        state.apply_transition();
        assert_eq!(*state.current(), GameState::Playing);
        assert!(state.just_entered());
        assert!(state.just_exited());

        state.apply_transition();
        assert!(!state.just_entered());
        assert!(!state.just_exited());
    }

    #[test]
    fn setting_current_state_cancels_pending() {
        let mut state = State::new(GameState::Menu);
        state.set(GameState::Playing);
        state.set(GameState::Menu);
        state.apply_transition();
        assert_eq!(*state.current(), GameState::Menu);
        assert!(!state.just_entered());
    }

    #[test]
    fn registry_round_trip() {
        let mut registry = StateRegistry::new();
        registry.add(GameState::Menu);
        assert!(registry.contains::<GameState>());

        registry.get_mut::<GameState>().unwrap().set(GameState::Playing);
        registry.apply_transitions();
        assert_eq!(
            *registry.get::<GameState>().unwrap().current(),
            GameState::Playing
        );
    }
}
