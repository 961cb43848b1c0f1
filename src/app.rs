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

//! Application composition root, plugins and the per-frame tick.
//!
//! One `tick` runs, in order: event-queue swap, the schedule, the optional
//! user callback, the global tick advance, and pending state transitions.
//! Plugins register their pieces in `build`; the session checkpoint records
//! how many plugins belong to the session so everything added afterwards
//! (a loaded game, an editor scene) can be unwound with
//! [`App::reset_to_session_checkpoint`].

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{EcsError, Result};
use crate::event::Event;
use crate::schedule::{CoreStage, IntoSystemConfig, Schedule, SystemSet};
use crate::state::StateValue;
use crate::system::in_state;
use crate::time::Time;
use crate::world::World;

/// Resource whose presence requests loop exit after the current tick.
pub struct AppExit;

/// Plugin protocol: register in `build`, unwind in `cleanup`.
pub trait Plugin: 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn build(&self, app: &mut App) -> Result<()>;

    fn cleanup(&self, app: &mut App) -> Result<()> {
        let _ = app;
        Ok(())
    }
}

/// Main application entry point.
pub struct App {
    pub world: World,
    pub schedule: Schedule,
    plugins: Vec<Box<dyn Plugin>>,
    session_checkpoint: usize,
    tick_callback: Option<Box<dyn FnMut(&mut World)>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("plugins", &self.plugins.len())
            .field("session_checkpoint", &self.session_checkpoint)
            .field("has_tick_callback", &self.tick_callback.is_some())
            .finish()
    }
}

impl App {
    pub fn new() -> Self {
        let mut world = World::new();
        world.insert_resource(Time::new());
        Self {
            world,
            schedule: Schedule::new(),
            plugins: Vec::new(),
            session_checkpoint: 0,
            tick_callback: None,
        }
    }

    // ========== Composition ==========

    /// Build and record a plugin. A failing build aborts app construction.
    pub fn add_plugin<P: Plugin>(&mut self, plugin: P) -> Result<&mut Self> {
        debug!(plugin = plugin.name(), "registering plugin");
        plugin
            .build(self)
            .map_err(|err| EcsError::PluginBuildFailure(format!("{}: {err}", plugin.name())))?;
        self.plugins.push(Box::new(plugin));
        Ok(self)
    }

    pub fn add_plugins(&mut self, plugins: Vec<Box<dyn Plugin>>) -> Result<&mut Self> {
        for plugin in plugins {
            debug!(plugin = plugin.name(), "registering plugin");
            plugin
                .build(self)
                .map_err(|err| EcsError::PluginBuildFailure(format!("{}: {err}", plugin.name())))?;
            self.plugins.push(plugin);
        }
        Ok(self)
    }

    pub fn add_system(&mut self, stage: CoreStage, config: impl IntoSystemConfig) -> &mut Self {
        self.schedule.add_system(stage, config);
        self
    }

    pub fn configure_set(&mut self, set: SystemSet) -> &mut Self {
        self.schedule.configure_set(set);
        self
    }

    pub fn add_system_to_set(
        &mut self,
        set_name: &str,
        config: impl IntoSystemConfig,
    ) -> Result<&mut Self> {
        self.schedule.add_system_to_set(set_name, config)?;
        Ok(self)
    }

    /// Add a system gated on a state value: it runs only while the
    /// registered `State<S>` equals `state`.
    pub fn add_system_in_state<S: StateValue>(
        &mut self,
        stage: CoreStage,
        state: S,
        config: impl IntoSystemConfig,
    ) -> &mut Self {
        self.schedule
            .add_system(stage, config.into_config().run_if(in_state(state)));
        self
    }

    pub fn add_event<T: Event>(&mut self) -> &mut Self {
        self.world.register_event::<T>();
        self
    }

    pub fn insert_resource<R: Send + Sync + 'static>(&mut self, value: R) -> &mut Self {
        self.world.insert_resource(value);
        self
    }

    pub fn add_state<S: StateValue>(&mut self, initial: S) -> &mut Self {
        self.world.add_state(initial);
        self
    }

    /// Called after the schedule each tick, before the tick advances.
    pub fn set_tick_callback(&mut self, callback: impl FnMut(&mut World) + 'static) -> &mut Self {
        self.tick_callback = Some(Box::new(callback));
        self
    }

    // ========== Session checkpoint ==========

    /// Record the current plugin count as the session frontier.
    pub fn mark_session_checkpoint(&mut self) {
        self.session_checkpoint = self.plugins.len();
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Unwind back to the session frontier: cleanup newer plugins in
    /// reverse order (errors swallowed and logged), clear every scheduled
    /// system and set, re-run `build` on the retained plugins, then clear
    /// game state (entities, archetypes, events — resources, observers and
    /// states survive).
    pub fn reset_to_session_checkpoint(&mut self) -> Result<()> {
        while self.plugins.len() > self.session_checkpoint {
            if let Some(plugin) = self.plugins.pop() {
                if let Err(err) = plugin.cleanup(self) {
                    warn!(plugin = plugin.name(), error = %err, "plugin cleanup failed");
                }
            }
        }

        self.schedule.clear_systems();

        let retained = std::mem::take(&mut self.plugins);
        let mut rebuild = Ok(());
        for plugin in &retained {
            if let Err(err) = plugin.build(self) {
                rebuild = Err(EcsError::PluginBuildFailure(format!(
                    "{}: {err}",
                    plugin.name()
                )));
                break;
            }
        }
        self.plugins = retained;

        self.world.reset_game_state();
        rebuild
    }

    // ========== Tick orchestration ==========

    /// Run exactly one frame.
    pub fn tick(&mut self) -> Result<()> {
        self.world.update_events();
        if let Some(mut time) = self.world.get_resource_mut::<Time>() {
            time.update();
        }

        self.schedule.run(&mut self.world)?;

        if let Some(callback) = &mut self.tick_callback {
            callback(&mut self.world);
        }

        self.world.advance_tick();
        self.world.apply_state_transitions();
        Ok(())
    }

    /// Request loop exit after the current tick completes.
    pub fn stop(&mut self) {
        self.world.insert_resource(AppExit);
    }

    /// Loop `tick` until an [`AppExit`] resource appears (systems request it
    /// through their command buffer, or anything calls [`App::stop`]).
    pub fn run(&mut self) -> Result<()> {
        self.world.remove_resource::<AppExit>();
        loop {
            self.tick()?;
            if self.world.has_resource::<AppExit>() {
                return Ok(());
            }
        }
    }

    /// Run at most one tick per `target_dt`, sleeping away the remainder of
    /// each frame budget.
    pub fn run_with_frame_budget(&mut self, target_dt: Duration) -> Result<()> {
        self.world.remove_resource::<AppExit>();
        loop {
            let frame_start = Instant::now();
            self.tick()?;
            if self.world.has_resource::<AppExit>() {
                return Ok(());
            }
            let spent = frame_start.elapsed();
            if spent < target_dt {
                std::thread::sleep(target_dt - spent);
            }
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}
