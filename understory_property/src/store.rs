// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-instance shadow slots.
//!
//! [`ShadowStore`] holds the values written through generated accessors. A
//! property that has never been written has no slot and reads as its declared
//! initial value, so an instance only pays for what it writes.
//!
//! # Implementation
//!
//! Slots live in a sorted vector searched by [`PropertyId`] rather than a hash
//! map: element types declare a handful of properties, and a contiguous
//! `SmallVec` keeps the common case allocation-free.

use smallvec::SmallVec;

use crate::id::{Property, PropertyId};
use crate::registry::PropertyRegistry;
use crate::value::{ErasedValue, PropertyValue};

/// Default inline capacity for shadow slots.
///
/// Most elements write fewer than 8 properties, so this avoids heap allocation
/// in the common case.
const INLINE_CAPACITY: usize = 8;

/// Sparse per-instance storage for property values.
///
/// # Example
///
/// ```rust
/// use understory_property::{PropertyDeclarationBuilder, PropertyRegistryBuilder, ShadowStore};
///
/// let mut builder = PropertyRegistryBuilder::new("Slider");
/// let value = builder
///     .declare("value", PropertyDeclarationBuilder::new(50.0_f64))
///     .unwrap();
/// let registry = builder.finalize();
///
/// let mut store = ShadowStore::new();
///
/// // Unwritten slots read as the declared initial value.
/// assert!(store.get(value).is_none());
/// assert_eq!(store.get_or_initial(value, &registry), &50.0);
///
/// // Writing returns the previous slot value, if there was one.
/// assert_eq!(store.set(value, 75.0), None);
/// assert_eq!(store.set(value, 80.0), Some(75.0));
/// assert_eq!(store.get_or_initial(value, &registry), &80.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ShadowStore {
    /// Slots sorted by [`PropertyId`] for binary search lookup.
    slots: SmallVec<[(PropertyId, ErasedValue); INLINE_CAPACITY]>,
}

impl ShadowStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no slot has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the number of written slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns the ids of written slots in ascending order.
    pub fn property_ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.slots.iter().map(|(id, _)| *id)
    }

    #[inline]
    fn find(&self, id: PropertyId) -> Result<usize, usize> {
        self.slots.binary_search_by_key(&id, |(slot_id, _)| *slot_id)
    }

    /// Returns the erased slot value, if written.
    #[must_use]
    pub fn get_erased(&self, id: PropertyId) -> Option<&ErasedValue> {
        self.find(id).ok().map(|idx| &self.slots[idx].1)
    }

    /// Returns the slot value, if written with a value of type `T`.
    #[must_use]
    #[inline]
    pub fn get<T: PropertyValue>(&self, property: Property<T>) -> Option<&T> {
        self.get_erased(property.id())
            .and_then(ErasedValue::downcast_ref)
    }

    /// Writes an erased slot value, returning the previous one.
    pub fn replace(&mut self, id: PropertyId, value: ErasedValue) -> Option<ErasedValue> {
        match self.find(id) {
            Ok(idx) => Some(core::mem::replace(&mut self.slots[idx].1, value)),
            Err(idx) => {
                self.slots.insert(idx, (id, value));
                None
            }
        }
    }

    /// Writes a typed slot value, returning the previous one.
    ///
    /// A previous value of another type is discarded.
    pub fn set<T: PropertyValue>(&mut self, property: Property<T>, value: T) -> Option<T> {
        self.replace(property.id(), ErasedValue::new(value))
            .and_then(|old| old.downcast().ok())
    }

    /// Removes a slot, returning its value.
    pub fn remove(&mut self, id: PropertyId) -> Option<ErasedValue> {
        self.find(id).ok().map(|idx| self.slots.remove(idx).1)
    }

    /// Returns the slot value, falling back to the declared initial value.
    ///
    /// # Panics
    ///
    /// Panics if the property is not declared in `registry` with value type `T`.
    #[must_use]
    pub fn get_or_initial<'a, T: PropertyValue>(
        &'a self,
        property: Property<T>,
        registry: &'a PropertyRegistry,
    ) -> &'a T {
        if let Some(value) = self.get(property) {
            return value;
        }
        match registry.declaration(property) {
            Some(declaration) => declaration.initial(),
            None => panic!(
                "Property {:?} is not declared in {} with type {}",
                property.id(),
                registry.type_name(),
                core::any::type_name::<T>()
            ),
        }
    }

    /// Returns a copy of the erased slot value, falling back to the declared
    /// initial value.
    ///
    /// Returns `None` if the property is not declared in `registry`.
    #[must_use]
    pub fn get_or_initial_erased(
        &self,
        id: PropertyId,
        registry: &PropertyRegistry,
    ) -> Option<ErasedValue> {
        match self.get_erased(id) {
            Some(value) => Some(value.clone()),
            None => registry.get(id).map(|entry| entry.initial()),
        }
    }

    /// Removes every slot.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::PropertyDeclarationBuilder;
    use crate::registry::PropertyRegistryBuilder;
    use alloc::string::String;
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    fn registry() -> (Arc<PropertyRegistry>, Property<f64>, Property<String>) {
        let mut builder = PropertyRegistryBuilder::new("Widget");
        let width = builder
            .declare("width", PropertyDeclarationBuilder::new(10.0_f64))
            .unwrap();
        let label = builder
            .declare("label", PropertyDeclarationBuilder::new(String::from("none")))
            .unwrap();
        (builder.finalize(), width, label)
    }

    #[test]
    fn store_starts_empty() {
        let store = ShadowStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.property_ids().count(), 0);
    }

    #[test]
    fn unwritten_slot_reads_initial() {
        let (registry, width, label) = registry();
        let store = ShadowStore::new();
        assert_eq!(store.get_or_initial(width, &registry), &10.0);
        assert_eq!(store.get_or_initial(label, &registry), "none");
        assert_eq!(
            store.get_or_initial_erased(width.id(), &registry),
            Some(ErasedValue::new(10.0_f64))
        );
        assert_eq!(store.get_or_initial_erased(PropertyId::new(9), &registry), None);
    }

    #[test]
    fn set_returns_previous_value() {
        let (_, width, _) = registry();
        let mut store = ShadowStore::new();
        assert_eq!(store.set(width, 1.0), None);
        assert_eq!(store.set(width, 2.0), Some(1.0));
        assert_eq!(store.get(width), Some(&2.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn slots_stay_sorted() {
        let (_, width, label) = registry();
        let mut store = ShadowStore::new();
        store.set(label, String::from("x"));
        store.set(width, 3.0);
        let ids: Vec<_> = store.property_ids().collect();
        assert_eq!(ids, [width.id(), label.id()]);
    }

    #[test]
    fn replace_and_remove_erased() {
        let (_, width, _) = registry();
        let mut store = ShadowStore::new();
        assert!(store.replace(width.id(), ErasedValue::new(4.0_f64)).is_none());
        assert_eq!(
            store.replace(width.id(), ErasedValue::new(5.0_f64)),
            Some(ErasedValue::new(4.0_f64))
        );
        assert_eq!(store.remove(width.id()), Some(ErasedValue::new(5.0_f64)));
        assert!(store.remove(width.id()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn clear_removes_everything() {
        let (_, width, label) = registry();
        let mut store = ShadowStore::new();
        store.set(width, 1.0);
        store.set(label, String::new());
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    #[should_panic(expected = "is not declared")]
    fn get_or_initial_panics_on_foreign_handle() {
        let (registry, _, _) = registry();
        let foreign: Property<u8> = Property::from_id(PropertyId::new(0));
        let _ = ShadowStore::new().get_or_initial(foreign, &registry);
    }
}
