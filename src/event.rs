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

//! Double-buffered typed event queues.
//!
//! Writes land in the back buffer; reads iterate the front buffer. The
//! per-tick `update` moves back to front and installs a fresh back buffer —
//! the front buffer is replaced rather than cleared in place, so an event
//! sent in tick N is readable exactly during tick N+1 and never again.

use std::any::{Any, TypeId};

use ahash::AHashMap;

/// Marker for event payloads.
pub trait Event: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Event for T {}

/// One double-buffered queue.
#[derive(Debug)]
pub struct EventQueue<T> {
    read_buffer: Vec<T>,
    write_buffer: Vec<T>,
}

impl<T: Event> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            read_buffer: Vec::new(),
            write_buffer: Vec::new(),
        }
    }

    /// Queue an event for the next tick.
    pub fn send(&mut self, event: T) {
        self.write_buffer.push(event);
    }

    /// Iterate this tick's readable events.
    pub fn read(&self) -> std::slice::Iter<'_, T> {
        self.read_buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.read_buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_buffer.is_empty()
    }

    /// Swap buffers: queued events become readable, last tick's events drop.
    pub fn update(&mut self) {
        self.read_buffer = std::mem::take(&mut self.write_buffer);
    }

    fn clear(&mut self) {
        self.read_buffer = Vec::new();
        self.write_buffer.clear();
    }
}

impl<T: Event> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

trait AnyEventQueue: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn update(&mut self);
    fn clear(&mut self);
}

impl<T: Event> AnyEventQueue for EventQueue<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn update(&mut self) {
        EventQueue::update(self);
    }

    fn clear(&mut self) {
        EventQueue::clear(self);
    }
}

/// Registry of every event queue, keyed by payload type.
#[derive(Default)]
pub struct Events {
    queues: AHashMap<TypeId, Box<dyn AnyEventQueue>>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a queue for `T`; idempotent.
    pub fn register<T: Event>(&mut self) {
        self.queues
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(EventQueue::<T>::new()));
    }

    pub fn contains<T: Event>(&self) -> bool {
        self.queues.contains_key(&TypeId::of::<T>())
    }

    pub fn get<T: Event>(&self) -> Option<&EventQueue<T>> {
        self.queues
            .get(&TypeId::of::<T>())
            .and_then(|q| q.as_any().downcast_ref())
    }

    pub fn get_mut<T: Event>(&mut self) -> Option<&mut EventQueue<T>> {
        self.queues
            .get_mut(&TypeId::of::<T>())
            .and_then(|q| q.as_any_mut().downcast_mut())
    }

    /// Swap every registered queue. Called once per tick, outside systems.
    pub fn update_all(&mut self) {
        for queue in self.queues.values_mut() {
            queue.update();
        }
    }

    /// Drop all buffered events, keeping registrations.
    pub fn clear_all(&mut self) {
        for queue in self.queues.values_mut() {
            queue.clear();
        }
    }
}

/// Read-side wrapper for a system parameter.
#[derive(Debug)]
pub struct EventReader<'w, T: Event> {
    queue: &'w EventQueue<T>,
}

impl<'w, T: Event> EventReader<'w, T> {
    pub(crate) fn new(queue: &'w EventQueue<T>) -> Self {
        Self { queue }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.queue.read()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Write-side wrapper for a system parameter.
pub struct EventWriter<'w, T: Event> {
    queue: &'w mut EventQueue<T>,
}

impl<'w, T: Event> EventWriter<'w, T> {
    pub(crate) fn new(queue: &'w mut EventQueue<T>) -> Self {
        Self { queue }
    }

    pub fn send(&mut self, event: T) {
        self.queue.send(event);
    }
}

/// Combined wrapper for systems that both consume and produce `T`.
pub struct EventReadWriter<'w, T: Event> {
    queue: &'w mut EventQueue<T>,
}

impl<'w, T: Event> EventReadWriter<'w, T> {
    pub(crate) fn new(queue: &'w mut EventQueue<T>) -> Self {
        Self { queue }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.queue.read()
    }

    pub fn send(&mut self, event: T) {
        self.queue.send(event);
    }
}
