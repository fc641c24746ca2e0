// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Values assigned to an element before it was upgraded.

use tracing::trace;
use understory_property::{ErasedValue, PropertyId, PropertyRegistry, PropertyValue};

use crate::error::PropertyError;

/// Property values that were set on an instance before its element type was
/// known, keyed by property name.
///
/// [`Element::upgrade`](crate::Element::upgrade) moves them aside and
/// re-applies them through the accessors at the start of the first update
/// cycle, so they are tracked, reflected, and reported like any other write.
///
/// ```rust
/// use understory_element::InstanceProperties;
///
/// let mut early = InstanceProperties::new();
/// early.insert("count", 3_i32).insert("label", String::from("hi"));
/// early.insert("count", 4_i32);
/// assert_eq!(early.len(), 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InstanceProperties {
    entries: Vec<(String, ErasedValue)>,
}

impl InstanceProperties {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a value, replacing an earlier one with the same key.
    pub fn insert<T: PropertyValue>(&mut self, key: impl Into<String>, value: T) -> &mut Self {
        self.insert_erased(key, ErasedValue::new(value))
    }

    /// Records an erased value, replacing an earlier one with the same key.
    pub fn insert_erased(&mut self, key: impl Into<String>, value: ErasedValue) -> &mut Self {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with<T: PropertyValue>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the number of recorded values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ErasedValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Resolves keys against `registry`.
    ///
    /// Keys the registry does not declare are plain data on the instance and
    /// are dropped.
    pub(crate) fn resolve(
        self,
        registry: &PropertyRegistry,
    ) -> Result<Vec<(PropertyId, ErasedValue)>, PropertyError> {
        let mut resolved = Vec::with_capacity(self.entries.len());
        for (key, value) in self.entries {
            let Some(id) = registry.by_name(&key) else {
                trace!(element = registry.type_name(), key = %key, "ignoring undeclared instance value");
                continue;
            };
            let Some(entry) = registry.get(id) else {
                continue;
            };
            if !entry.accepts(&value) {
                return Err(PropertyError::TypeMismatch {
                    key: entry.key(),
                    expected: entry.value_type_name(),
                    found: value.type_name(),
                });
            }
            resolved.push((id, value));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use understory_property::{PropertyDeclarationBuilder, PropertyRegistryBuilder};

    #[test]
    fn resolve_drops_undeclared_keys() {
        let mut builder = PropertyRegistryBuilder::new("Early");
        let count = builder
            .declare("count", PropertyDeclarationBuilder::new(0_i32))
            .unwrap();
        let registry = builder.finalize();

        let early = InstanceProperties::new()
            .with("count", 3_i32)
            .with("stray", true);
        let resolved = early.resolve(&registry).unwrap();
        assert_eq!(resolved, [(count.id(), ErasedValue::new(3_i32))]);
    }

    #[test]
    fn resolve_rejects_wrong_types() {
        let mut builder = PropertyRegistryBuilder::new("Early");
        builder
            .declare("count", PropertyDeclarationBuilder::new(0_i32))
            .unwrap();
        let registry = builder.finalize();

        let err = InstanceProperties::new()
            .with("count", "three")
            .resolve(&registry)
            .unwrap_err();
        assert!(matches!(err, PropertyError::TypeMismatch { key: "count", .. }));
    }

    #[test]
    fn later_insert_replaces() {
        let mut early = InstanceProperties::new();
        early.insert("count", 1_i32);
        early.insert("count", 2_i32);
        let values: Vec<_> = early.iter().map(|(key, _)| key).collect();
        assert_eq!(values, ["count"]);
        assert_eq!(
            early.iter().next().map(|(_, value)| value.clone()),
            Some(ErasedValue::new(2_i32))
        );
    }
}
