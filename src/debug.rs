//! Inspection helpers for worlds and frame timing.

use std::collections::VecDeque;

use crate::component::component_name;
use crate::entity::Entity;
use crate::world::World;

/// Read-only world inspector for debugging
pub struct WorldInspector;

impl WorldInspector {
    /// Per-archetype breakdown with readable component names.
    pub fn archetype_summary(world: &World) -> Vec<ArchetypeInfo> {
        world
            .archetypes()
            .tables()
            .iter()
            .enumerate()
            .map(|(index, table)| ArchetypeInfo {
                index,
                components: table
                    .archetype_id()
                    .ids()
                    .iter()
                    .map(|&id| component_name(id).to_string())
                    .collect(),
                entity_count: table.len(),
            })
            .collect()
    }

    /// Human-readable world summary.
    pub fn summary(world: &World) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "world: {} entities, {} archetypes, tick {}",
            world.entity_count(),
            world.archetype_count(),
            world.current_tick()
        );
        for info in Self::archetype_summary(world) {
            let _ = writeln!(
                out,
                "  archetype {}: {} rows [{}]",
                info.index,
                info.entity_count,
                info.components.join(", ")
            );
        }
        out
    }

    pub fn print_summary(world: &World) {
        println!("{}", Self::summary(world));
    }

    /// One entity's placement, or none for dead handles.
    pub fn describe_entity(world: &World, entity: Entity) -> Option<String> {
        let location = world.get_location(entity)?;
        let table = world.archetypes().table(location.archetype_index as usize)?;
        let components: Vec<&str> = table
            .archetype_id()
            .ids()
            .iter()
            .map(|&id| component_name(id))
            .collect();
        Some(format!(
            "entity {}v{}: archetype {} row {} [{}]",
            entity.id,
            entity.generation,
            location.archetype_index,
            location.row,
            components.join(", ")
        ))
    }
}

/// Archetype information for debugging
#[derive(Clone, Debug)]
pub struct ArchetypeInfo {
    pub index: usize,
    pub components: Vec<String>,
    pub entity_count: usize,
}

/// Rolling frame-time window.
#[derive(Clone, Debug)]
pub struct FrameDiagnostics {
    frame_times: VecDeque<f32>,
    max_samples: usize,
}

impl FrameDiagnostics {
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::new(),
            max_samples: 60,
        }
    }

    /// Record one frame time in milliseconds.
    pub fn record_frame_time(&mut self, time_ms: f32) {
        self.frame_times.push_back(time_ms);
        if self.frame_times.len() > self.max_samples {
            self.frame_times.pop_front();
        }
    }

    pub fn avg_frame_time(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }
        self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32
    }

    pub fn fps(&self) -> f32 {
        let avg = self.avg_frame_time();
        if avg > 0.0 {
            1000.0 / avg
        } else {
            0.0
        }
    }

    pub fn max_frame_time(&self) -> f32 {
        self.frame_times
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

impl Default for FrameDiagnostics {
    fn default() -> Self {
        Self::new()
    }
}
