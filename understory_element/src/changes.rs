// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change tracking.
//!
//! Every write that passes the property's change predicate is recorded in the
//! pending batch with the value it replaced. Only the first old value per
//! property is kept, so a batch always reports the value from before the
//! batch started, however many writes it absorbed.

use smallvec::SmallVec;
use understory_property::{ErasedValue, Property, PropertyEntry, PropertyId, PropertyValue};

/// Properties changed in one batch, with their old values.
///
/// Iteration follows the order in which properties first changed.
///
/// # Example
///
/// ```rust
/// use understory_element::ChangedProperties;
/// use understory_property::{ErasedValue, PropertyId};
///
/// let mut changed = ChangedProperties::new();
/// let count = PropertyId::new(0);
/// assert!(changed.record(count, ErasedValue::new(1_i32)));
/// // The first old value wins.
/// assert!(!changed.record(count, ErasedValue::new(2_i32)));
/// assert_eq!(changed.get(count), Some(&ErasedValue::new(1_i32)));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangedProperties {
    entries: SmallVec<[(PropertyId, ErasedValue); 4]>,
}

impl ChangedProperties {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of changed properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `id` changed.
    #[must_use]
    pub fn contains(&self, id: impl Into<PropertyId>) -> bool {
        let id = id.into();
        self.entries.iter().any(|(changed, _)| *changed == id)
    }

    /// Returns the old value of a changed property.
    #[must_use]
    pub fn get(&self, id: impl Into<PropertyId>) -> Option<&ErasedValue> {
        let id = id.into();
        self.entries
            .iter()
            .find(|(changed, _)| *changed == id)
            .map(|(_, old)| old)
    }

    /// Returns the typed old value of a changed property.
    #[must_use]
    pub fn old<T: PropertyValue>(&self, property: Property<T>) -> Option<&T> {
        self.get(property).and_then(ErasedValue::downcast_ref)
    }

    /// Iterates over `(id, old value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, &ErasedValue)> {
        self.entries.iter().map(|(id, old)| (*id, old))
    }

    /// Iterates over the changed ids.
    pub fn ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// Records `old` for `id` unless `id` is already present.
    ///
    /// Returns `true` if the value was recorded.
    pub fn record(&mut self, id: PropertyId, old: ErasedValue) -> bool {
        if self.contains(id) {
            return false;
        }
        self.entries.push((id, old));
        true
    }
}

/// Pending changes and pending reflections of one element.
#[derive(Clone, Debug, Default)]
pub struct ChangeTracker {
    changed: ChangedProperties,
    reflecting: SmallVec<[PropertyId; 4]>,
}

impl ChangeTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes a write of `new` over `old`.
    ///
    /// If the declaration's change predicate rejects the write, nothing is
    /// recorded and `false` is returned. Otherwise `old` is recorded unless the
    /// batch already holds an old value for `id`, and a reflecting property is
    /// queued for reflection unless the write happens while an attribute is
    /// being applied (`applying_attribute`).
    pub fn note_change(
        &mut self,
        id: PropertyId,
        old: ErasedValue,
        new: &ErasedValue,
        entry: &PropertyEntry,
        applying_attribute: bool,
    ) -> bool {
        if !entry.has_changed(new, &old) {
            return false;
        }
        self.changed.record(id, old);
        if entry.reflect() && !applying_attribute && !self.reflecting.contains(&id) {
            self.reflecting.push(id);
        }
        true
    }

    /// Returns the pending batch.
    #[must_use]
    pub fn changed(&self) -> &ChangedProperties {
        &self.changed
    }

    /// Returns the properties waiting to be reflected.
    #[must_use]
    pub fn reflecting(&self) -> &[PropertyId] {
        &self.reflecting
    }

    /// Takes the pending batch, leaving an empty one for later writes.
    pub fn take_changed(&mut self) -> ChangedProperties {
        core::mem::take(&mut self.changed)
    }

    /// Takes the properties waiting to be reflected.
    pub fn take_reflecting(&mut self) -> SmallVec<[PropertyId; 4]> {
        core::mem::take(&mut self.reflecting)
    }
}
