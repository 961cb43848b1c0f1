//! Lightweight parent/child hierarchy.
//!
//! `Parent` and `Children` are ordinary components kept in sync by the
//! helpers below. Traversal is depth-first. Despawning a parent without
//! `despawn_recursive` leaves stale child entries; readers treat dead
//! handles as absent.

use crate::entity::Entity;
use crate::error::{EcsError, Result};
use crate::world::World;

/// Link to the owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub Entity);

impl Parent {
    pub fn entity(&self) -> Entity {
        self.0
    }
}

/// Ordered child list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children(Vec<Entity>);

impl Children {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, child: Entity) {
        if !self.0.contains(&child) {
            self.0.push(child);
        }
    }

    pub fn remove(&mut self, child: Entity) -> bool {
        match self.0.iter().position(|&c| c == child) {
            Some(position) => {
                self.0.remove(position);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, child: Entity) -> bool {
        self.0.contains(&child)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl World {
    /// Attach `child` under `parent`, replacing any previous parent link.
    /// Rejects self-attachment and ancestor loops.
    pub fn set_parent(&mut self, child: Entity, parent: Entity) -> Result<()> {
        if !self.is_alive(child) {
            return Err(EcsError::DeadEntity(child));
        }
        if !self.is_alive(parent) {
            return Err(EcsError::DeadEntity(parent));
        }
        if child == parent {
            return Err(EcsError::HierarchyCycle { child, parent });
        }
        // Walk up from the prospective parent; hitting `child` means a loop.
        let mut cursor = self.parent_of(parent);
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return Err(EcsError::HierarchyCycle { child, parent });
            }
            cursor = self.parent_of(ancestor);
        }

        self.unlink_from_parent(child);
        self.insert(child, Parent(parent))?;
        if let Some(children) = self.get_mut::<Children>(parent) {
            children.add(child);
            return Ok(());
        }
        let mut children = Children::new();
        children.add(child);
        self.insert(parent, children)
    }

    /// Detach `child` from its parent, if it has one.
    pub fn remove_parent(&mut self, child: Entity) -> Result<()> {
        if !self.is_alive(child) {
            return Err(EcsError::DeadEntity(child));
        }
        self.unlink_from_parent(child);
        self.remove::<Parent>(child);
        Ok(())
    }

    fn unlink_from_parent(&mut self, child: Entity) {
        if let Some(parent) = self.parent_of(child) {
            if let Some(children) = self.get_mut::<Children>(parent) {
                children.remove(child);
            }
        }
    }

    pub fn parent_of(&self, entity: Entity) -> Option<Entity> {
        self.get::<Parent>(entity).map(|p| p.entity())
    }

    /// Live children of `entity`, in attach order.
    pub fn children_of(&self, entity: Entity) -> Vec<Entity> {
        self.get::<Children>(entity)
            .map(|children| {
                children
                    .iter()
                    .copied()
                    .filter(|&c| self.is_alive(c))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Depth-first walk over `entity` and its live descendants.
    pub fn traverse_depth_first<F>(&self, entity: Entity, visit: &mut F) -> Result<()>
    where
        F: FnMut(Entity) -> Result<()>,
    {
        visit(entity)?;
        for child in self.children_of(entity) {
            self.traverse_depth_first(child, visit)?;
        }
        Ok(())
    }

    /// Every live descendant, excluding `entity` itself.
    pub fn descendants_of(&self, entity: Entity) -> Vec<Entity> {
        let mut descendants = Vec::new();
        let mut stack = self.children_of(entity);
        while let Some(current) = stack.pop() {
            descendants.push(current);
            stack.extend(self.children_of(current));
        }
        descendants
    }

    /// Despawn `entity` and its whole subtree, unlinking from its parent.
    pub fn despawn_recursive(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.unlink_from_parent(entity);
        for child in self.children_of(entity) {
            self.despawn_recursive(child);
        }
        self.despawn(entity)
    }
}
