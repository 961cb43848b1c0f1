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

//! Staged schedule with system sets, explicit ordering and exclusive
//! systems.
//!
//! Stages run in a fixed order. Within a stage the declared `before` /
//! `after` constraints — per system and per set — form a DAG ordered by
//! Kahn's algorithm; a cycle is a fatal configuration error naming the
//! systems involved. The per-stage order is built lazily and invalidated
//! whenever systems are added.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error};

use crate::command::Commands;
use crate::error::{EcsError, Result};
use crate::system::{BoxedSystem, RunCondition, System};
use crate::world::World;

/// The fixed stage sequence. Stages run in declared order, once per tick,
/// and are not reentrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreStage {
    First,
    PreUpdate,
    Update,
    PostUpdate,
    Last,
}

impl CoreStage {
    pub const ALL: [CoreStage; 5] = [
        CoreStage::First,
        CoreStage::PreUpdate,
        CoreStage::Update,
        CoreStage::PostUpdate,
        CoreStage::Last,
    ];

    fn index(self) -> usize {
        match self {
            CoreStage::First => 0,
            CoreStage::PreUpdate => 1,
            CoreStage::Update => 2,
            CoreStage::PostUpdate => 3,
            CoreStage::Last => 4,
        }
    }
}

/// Named grouping of systems sharing ordering constraints and an optional
/// run condition.
pub struct SystemSet {
    name: String,
    stage: CoreStage,
    before: Vec<String>,
    after: Vec<String>,
    run_condition: Option<RunCondition>,
}

impl SystemSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: CoreStage::Update,
            before: Vec::new(),
            after: Vec::new(),
            run_condition: None,
        }
    }

    pub fn in_stage(mut self, stage: CoreStage) -> Self {
        self.stage = stage;
        self
    }

    /// Every member runs before whatever `name` resolves to.
    pub fn before(mut self, name: impl Into<String>) -> Self {
        self.before.push(name.into());
        self
    }

    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.after.push(name.into());
        self
    }

    /// Gate every member; ANDed with each member's own condition.
    pub fn run_if(mut self, condition: impl Fn(&World) -> bool + Send + Sync + 'static) -> Self {
        self.run_condition = Some(Box::new(condition));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> CoreStage {
        self.stage
    }
}

/// A system plus its scheduling metadata, pre-insertion.
pub struct SystemConfig {
    system: BoxedSystem,
    before: Vec<String>,
    after: Vec<String>,
    sets: Vec<String>,
    run_if: Option<RunCondition>,
}

impl SystemConfig {
    pub fn new(system: impl System + 'static) -> Self {
        Self {
            system: Box::new(system),
            before: Vec::new(),
            after: Vec::new(),
            sets: Vec::new(),
            run_if: None,
        }
    }

    /// Run before the named system or set.
    pub fn before(mut self, name: impl Into<String>) -> Self {
        self.before.push(name.into());
        self
    }

    /// Run after the named system or set.
    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.after.push(name.into());
        self
    }

    pub fn in_set(mut self, name: impl Into<String>) -> Self {
        self.sets.push(name.into());
        self
    }

    /// Extra condition ANDed with the system's own.
    pub fn run_if(mut self, condition: impl Fn(&World) -> bool + Send + Sync + 'static) -> Self {
        self.run_if = Some(Box::new(condition));
        self
    }
}

/// Anything addable to a stage: a system or a pre-built config.
pub trait IntoSystemConfig {
    fn into_config(self) -> SystemConfig;
}

impl IntoSystemConfig for SystemConfig {
    fn into_config(self) -> SystemConfig {
        self
    }
}

impl<S: System + 'static> IntoSystemConfig for S {
    fn into_config(self) -> SystemConfig {
        SystemConfig::new(self)
    }
}

#[derive(Default)]
struct StageData {
    nodes: Vec<SystemConfig>,
    order: Option<Vec<usize>>,
}

/// The full schedule: five stages plus the set registry.
#[derive(Default)]
pub struct Schedule {
    stages: [StageData; 5],
    sets: FxHashMap<String, SystemSet>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_system(&mut self, stage: CoreStage, config: impl IntoSystemConfig) {
        let data = &mut self.stages[stage.index()];
        data.nodes.push(config.into_config());
        data.order = None;
    }

    /// Register (or replace) a set. Systems join via
    /// [`add_system_to_set`](Self::add_system_to_set) or
    /// [`SystemConfig::in_set`].
    pub fn configure_set(&mut self, set: SystemSet) {
        let stage = set.stage.index();
        self.sets.insert(set.name.clone(), set);
        self.stages[stage].order = None;
    }

    /// Add a system as a member of a configured set, inheriting its stage.
    pub fn add_system_to_set(
        &mut self,
        set_name: &str,
        config: impl IntoSystemConfig,
    ) -> Result<()> {
        let stage = self
            .sets
            .get(set_name)
            .map(|set| set.stage)
            .ok_or_else(|| {
                EcsError::ScheduleConfig(format!("unknown system set '{set_name}'"))
            })?;
        self.add_system(stage, config.into_config().in_set(set_name));
        Ok(())
    }

    pub fn system_count(&self) -> usize {
        self.stages.iter().map(|s| s.nodes.len()).sum()
    }

    pub fn stage_system_count(&self, stage: CoreStage) -> usize {
        self.stages[stage.index()].nodes.len()
    }

    /// Drop every system and set; stage structure itself is fixed.
    pub fn clear_systems(&mut self) {
        for stage in &mut self.stages {
            stage.nodes.clear();
            stage.order = None;
        }
        self.sets.clear();
    }

    /// Declared-access conflicts between systems of a stage, for
    /// diagnostics: pairs that could never run concurrently.
    pub fn conflicting_pairs(&self, stage: CoreStage) -> Vec<(String, String)> {
        let nodes = &self.stages[stage.index()].nodes;
        let mut pairs = Vec::new();
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let a = nodes[i].system.meta();
                let b = nodes[j].system.meta();
                if !a.is_compatible(b) {
                    pairs.push((a.name().to_string(), b.name().to_string()));
                }
            }
        }
        pairs
    }

    /// Run every stage in order against the world.
    ///
    /// Per system: evaluate the effective run condition (own condition ∧
    /// config condition ∧ every containing set's condition); exclusive
    /// systems get in-flight command buffers drained first; the system's
    /// command buffer and any observer-queued commands drain right after it
    /// returns. Non-fatal errors are logged with the system's name and the
    /// stage continues.
    pub fn run(&mut self, world: &mut World) -> Result<()> {
        for stage in CoreStage::ALL {
            let index = stage.index();
            if self.stages[index].order.is_none() {
                let order = self.sort_stage(index)?;
                debug!(stage = ?stage, systems = order.len(), "stage order built");
                self.stages[index].order = Some(order);
            }
            let order = self.stages[index]
                .order
                .clone()
                .unwrap_or_default();

            for node_index in order {
                let (should_run, exclusive, name) = {
                    let node = &self.stages[index].nodes[node_index];
                    let mut should = node.system.should_run(world);
                    if should {
                        if let Some(condition) = &node.run_if {
                            should = condition(world);
                        }
                    }
                    if should {
                        for set_name in &node.sets {
                            let gate = self
                                .sets
                                .get(set_name)
                                .and_then(|set| set.run_condition.as_ref());
                            if let Some(condition) = gate {
                                if !condition(world) {
                                    should = false;
                                    break;
                                }
                            }
                        }
                    }
                    let meta = node.system.meta();
                    (should, meta.is_exclusive(), meta.name().to_string())
                };

                if !should_run {
                    continue;
                }

                if exclusive {
                    // Quiesce: nothing deferred may be pending.
                    if let Err(err) = world.flush() {
                        if err.is_fatal() {
                            return Err(err);
                        }
                        error!(system = %name, error = %err, "pre-exclusive flush failed");
                    }
                }

                let mut commands = Commands::new();
                match self.stages[index].nodes[node_index]
                    .system
                    .run(world, &mut commands)
                {
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => error!(system = %name, error = %err, "system failed"),
                    Ok(()) => {}
                }

                if let Err(err) = commands.apply(world) {
                    if err.is_fatal() {
                        return Err(err);
                    }
                    error!(system = %name, error = %err, "command buffer failed");
                }
                if let Err(err) = world.flush() {
                    if err.is_fatal() {
                        return Err(err);
                    }
                    error!(system = %name, error = %err, "observer commands failed");
                }
            }
        }
        Ok(())
    }

    /// Kahn's algorithm over the declared constraints of one stage.
    fn sort_stage(&self, stage_index: usize) -> Result<Vec<usize>> {
        let nodes = &self.stages[stage_index].nodes;
        let count = nodes.len();

        // Resolution tables: a constraint name may refer to systems (by
        // meta name) or to a set (all members). Unknown names are ignored —
        // plugins may order against systems the app never installed.
        let mut by_name: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
        let mut by_set: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
        for (i, node) in nodes.iter().enumerate() {
            by_name.entry(node.system.meta().name()).or_default().push(i);
            for set in &node.sets {
                by_set.entry(set.as_str()).or_default().push(i);
            }
        }
        let resolve = |name: &str| -> Vec<usize> {
            let mut targets = Vec::new();
            if let Some(systems) = by_name.get(name) {
                targets.extend_from_slice(systems);
            }
            if let Some(members) = by_set.get(name) {
                targets.extend_from_slice(members);
            }
            targets
        };

        let mut edges: FxHashSet<(usize, usize)> = FxHashSet::default();
        for (i, node) in nodes.iter().enumerate() {
            for name in &node.before {
                for j in resolve(name) {
                    if i != j {
                        edges.insert((i, j));
                    }
                }
            }
            for name in &node.after {
                for j in resolve(name) {
                    if i != j {
                        edges.insert((j, i));
                    }
                }
            }
        }
        for set in self.sets.values() {
            if set.stage.index() != stage_index {
                continue;
            }
            let members = by_set.get(set.name.as_str()).cloned().unwrap_or_default();
            for name in &set.before {
                for &i in &members {
                    for j in resolve(name) {
                        if i != j {
                            edges.insert((i, j));
                        }
                    }
                }
            }
            for name in &set.after {
                for &i in &members {
                    for j in resolve(name) {
                        if i != j {
                            edges.insert((j, i));
                        }
                    }
                }
            }
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut in_degree = vec![0usize; count];
        for &(from, to) in &edges {
            adjacency[from].push(to);
            in_degree[to] += 1;
        }
        for targets in &mut adjacency {
            targets.sort_unstable();
        }

        let mut queue: VecDeque<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);
        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &next in &adjacency[node] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() != count {
            let stuck: Vec<String> = (0..count)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| nodes[i].system.meta().name().to_string())
                .collect();
            return Err(EcsError::ScheduleCycle(stuck));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{system, SystemMeta};
    use std::sync::{Arc, Mutex};

    fn recorder(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    ) -> crate::system::FunctionSystem<impl FnMut(&mut World, &mut Commands) -> Result<()>> {
        let log = log.clone();
        crate::system::FunctionSystem::new(SystemMeta::new(name), move |_world, _commands| {
            log.lock().unwrap().push(name);
            Ok(())
        })
    }

    #[test]
    fn explicit_before_after_is_respected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut schedule = Schedule::new();
        let mut world = World::new();

        schedule.add_system(CoreStage::Update, SystemConfig::new(recorder(&log, "b")).after("a"));
        schedule.add_system(CoreStage::Update, SystemConfig::new(recorder(&log, "c")).after("b"));
        schedule.add_system(CoreStage::Update, recorder(&log, "a"));

        schedule.run(&mut world).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn stages_run_in_declared_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut schedule = Schedule::new();
        let mut world = World::new();

        schedule.add_system(CoreStage::Last, recorder(&log, "last"));
        schedule.add_system(CoreStage::First, recorder(&log, "first"));
        schedule.add_system(CoreStage::Update, recorder(&log, "update"));

        schedule.run(&mut world).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "update", "last"]);
    }

    #[test]
    fn cycle_reports_offenders() {
        let mut schedule = Schedule::new();
        let mut world = World::new();

        schedule.add_system(
            CoreStage::Update,
            SystemConfig::new(system("x", |_, _| Ok(()))).before("y"),
        );
        schedule.add_system(
            CoreStage::Update,
            SystemConfig::new(system("y", |_, _| Ok(()))).before("x"),
        );

        let err = schedule.run(&mut world).unwrap_err();
        match err {
            EcsError::ScheduleCycle(names) => {
                assert!(names.contains(&"x".to_string()));
                assert!(names.contains(&"y".to_string()));
            }
            other => panic!("expected cycle error, got {other}"),
        }
    }

    #[test]
    fn set_membership_orders_and_gates() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut schedule = Schedule::new();
        let mut world = World::new();

        schedule.configure_set(SystemSet::new("sim").in_stage(CoreStage::Update).before("render"));
        schedule
            .add_system_to_set("sim", recorder(&log, "integrate"))
            .unwrap();
        schedule.add_system(CoreStage::Update, recorder(&log, "render"));

        schedule.run(&mut world).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["integrate", "render"]);
    }

    #[test]
    fn set_run_condition_gates_members() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut schedule = Schedule::new();
        let mut world = World::new();

        schedule.configure_set(
            SystemSet::new("gated")
                .in_stage(CoreStage::Update)
                .run_if(|world| world.has_resource::<u8>()),
        );
        schedule
            .add_system_to_set("gated", recorder(&log, "member"))
            .unwrap();

        schedule.run(&mut world).unwrap();
        assert!(log.lock().unwrap().is_empty());

        world.insert_resource(1u8);
        schedule.run(&mut world).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["member"]);
    }

    #[test]
    fn unknown_set_is_config_error() {
        let mut schedule = Schedule::new();
        let err = schedule
            .add_system_to_set("nope", system("s", |_, _| Ok(())))
            .unwrap_err();
        assert!(matches!(err, EcsError::ScheduleConfig(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn failing_system_does_not_stop_stage() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut schedule = Schedule::new();
        let mut world = World::new();

        schedule.add_system(
            CoreStage::Update,
            SystemConfig::new(system("broken", |_, _| {
                Err(EcsError::DeadEntity(crate::entity::Entity::from_raw(9, 0)))
            }))
            .before("after_broken"),
        );
        schedule.add_system(CoreStage::Update, recorder(&log, "after_broken"));

        schedule.run(&mut world).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["after_broken"]);
    }

    #[test]
    fn unknown_ordering_targets_are_ignored() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut schedule = Schedule::new();
        let mut world = World::new();

        schedule.add_system(
            CoreStage::Update,
            SystemConfig::new(recorder(&log, "lonely")).after("never_installed"),
        );
        schedule.run(&mut world).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["lonely"]);
    }
}
