// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property identification types.
//!
//! [`PropertyId`] is the slot index of a property inside a
//! [`PropertyRegistry`](crate::PropertyRegistry). [`Property<T>`] is the typed
//! handle returned by
//! [`PropertyRegistryBuilder::declare`](crate::PropertyRegistryBuilder::declare);
//! it is the key of the generated accessor pair.
//!
//! Ids are stable across inheritance: a registry built with
//! [`PropertyRegistryBuilder::extending`](crate::PropertyRegistryBuilder::extending)
//! keeps every id of its supertype, so a handle declared on a base type reads
//! and writes the same property on every derived type.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// Slot index of a declared property within its registry.
///
/// # Example
///
/// ```rust
/// use understory_property::PropertyId;
///
/// let id = PropertyId::new(3);
/// assert_eq!(id.index(), 3);
/// assert_eq!(id.to_string(), "#3");
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(u16);

impl PropertyId {
    /// Creates a property id from a slot index.
    #[must_use]
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the slot index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }

    #[inline]
    pub(crate) const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyId").field(&self.0).finish()
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed handle to a declared property.
///
/// The phantom type ties the handle to the declaration's value type, so the
/// generated accessors can only read and write values of that type.
pub struct Property<T> {
    id: PropertyId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Property<T> {
    /// Wraps a property id.
    ///
    /// Registries hand these out; building one by hand is only meaningful when
    /// the id is known to have been declared with value type `T`. Accessors
    /// panic on a mismatch.
    #[must_use]
    #[inline]
    pub const fn from_id(id: PropertyId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Returns the untyped id.
    #[must_use]
    #[inline]
    pub const fn id(self) -> PropertyId {
        self.id
    }
}

impl<T> Copy for Property<T> {}

impl<T> Clone for Property<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Property<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Property<T> {}

impl<T> Hash for Property<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.id)
            .field("type", &core::any::type_name::<T>())
            .finish()
    }
}

impl<T> From<Property<T>> for PropertyId {
    fn from(property: Property<T>) -> Self {
        property.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn property_id_orders_by_slot() {
        assert!(PropertyId::new(1) < PropertyId::new(2));
        assert_eq!(PropertyId::new(7).slot(), 7);
    }

    #[test]
    fn property_id_formatting() {
        let id = PropertyId::new(42);
        assert_eq!(format!("{id:?}"), "PropertyId(42)");
        assert_eq!(format!("{id}"), "#42");
    }

    #[test]
    fn typed_handles_share_untyped_id() {
        let id = PropertyId::new(1);
        let count: Property<i32> = Property::from_id(id);
        let label: Property<&str> = Property::from_id(id);
        assert_eq!(count.id(), label.id());
        assert_eq!(PropertyId::from(count), id);
    }

    #[test]
    fn property_debug_names_value_type() {
        let count: Property<i32> = Property::from_id(PropertyId::new(0));
        let debug = format!("{count:?}");
        assert!(debug.contains("i32"));
    }

    #[test]
    fn property_is_two_bytes() {
        assert_eq!(core::mem::size_of::<Property<f64>>(), 2);
    }
}
