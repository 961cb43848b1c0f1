//! Type-keyed singleton resources.
//!
//! Resources are world-global values looked up by type. Re-inserting a type
//! replaces the previous value. [`Res`] and [`ResMut`] are plain access
//! wrappers over the stored value, not separate storage.

use std::any::{Any, TypeId};
use std::ops::{Deref, DerefMut};

use ahash::AHashMap;

/// Singleton storage, one value per type.
#[derive(Default)]
pub struct Resources {
    values: AHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `R`.
    pub fn insert<R: Send + Sync + 'static>(&mut self, value: R) {
        self.values.insert(TypeId::of::<R>(), Box::new(value));
    }

    pub fn get<R: 'static>(&self) -> Option<Res<'_, R>> {
        self.values
            .get(&TypeId::of::<R>())
            .and_then(|v| v.downcast_ref())
            .map(|value| Res { value })
    }

    pub fn get_mut<R: 'static>(&mut self) -> Option<ResMut<'_, R>> {
        self.values
            .get_mut(&TypeId::of::<R>())
            .and_then(|v| v.downcast_mut())
            .map(|value| ResMut { value })
    }

    pub fn contains<R: 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<R>())
    }

    pub fn remove<R: 'static>(&mut self) -> Option<R> {
        self.values
            .remove(&TypeId::of::<R>())
            .and_then(|v| v.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Shared resource handle.
pub struct Res<'w, R> {
    value: &'w R,
}

impl<R> Deref for Res<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.value
    }
}

/// Exclusive resource handle.
pub struct ResMut<'w, R> {
    value: &'w mut R,
}

impl<R> Deref for ResMut<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.value
    }
}

impl<R> DerefMut for ResMut<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.value
    }
}
