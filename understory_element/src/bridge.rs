// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Synchronization between properties and attributes.
//!
//! Both directions set a [`ReflectionGuard`](crate::ReflectionGuards) while
//! they run so that each direction ignores the echo of the other: an attribute
//! written by reflection is not converted back into its property, and a
//! property assigned from its attribute is not reflected again.

use std::sync::Arc;

use tracing::trace;
use understory_property::{
    AttributeUpdate, ConversionError, ErasedValue, PropertyEntry, PropertyId, PropertyRegistry,
};

use crate::attributes::AttributeMap;
use crate::error::PropertyError;
use crate::hooks::UpdateHooks;
use crate::lifecycle::ReflectionGuards;
use crate::state::ElementState;

/// Maps an attribute change to the property it should be applied to.
///
/// Returns `None` if nothing should happen: the value did not change, the
/// change is the echo of a reflection, or no property observes `name`.
pub(crate) fn route_attribute_change(
    registry: &PropertyRegistry,
    guards: ReflectionGuards,
    name: &str,
    old: Option<&str>,
    new: Option<&str>,
) -> Option<PropertyId> {
    if old == new {
        return None;
    }
    if let Some(reflecting) = guards.to_attribute() {
        trace!(
            element = registry.type_name(),
            attribute = name,
            property = %reflecting,
            "ignoring attribute change made by reflection"
        );
        return None;
    }
    registry.property_for_attribute(name)
}

/// Writes `value` to the attribute of `entry`.
pub(crate) fn property_to_attribute(
    registry: &PropertyRegistry,
    attributes: &mut AttributeMap,
    guards: &mut ReflectionGuards,
    entry: &PropertyEntry,
    id: PropertyId,
    value: &ErasedValue,
) -> Result<(), PropertyError> {
    let Some(name) = registry.attribute_name(id) else {
        return Ok(());
    };
    let update = entry
        .to_attribute(value)
        .map_err(|source| PropertyError::Conversion {
            key: entry.key(),
            source,
        })?;

    guards.enter_to_attribute(id);
    let mutation = match &update {
        AttributeUpdate::Set(text) => attributes.set(name, text.clone()),
        AttributeUpdate::Remove => attributes.remove(name),
        AttributeUpdate::Unchanged => None,
    };
    if let Some(mutation) = mutation {
        trace!(
            element = registry.type_name(),
            attribute = name,
            property = entry.key(),
            "reflected property to attribute"
        );
        // The host observes its own write; the guard routes it nowhere.
        let routed = route_attribute_change(
            registry,
            *guards,
            name,
            mutation.old.as_deref(),
            attributes.get(name),
        );
        debug_assert!(routed.is_none(), "reflection echoed back into a property");
    }
    guards.exit_to_attribute();
    Ok(())
}

/// Applies an observed attribute change to its property.
pub(crate) fn attribute_to_property<H: UpdateHooks + ?Sized>(
    hooks: &mut H,
    state: &mut ElementState,
    name: &str,
    old: Option<&str>,
    new: Option<&str>,
) -> Result<(), PropertyError> {
    let registry = Arc::clone(state.registry());
    let Some(id) = route_attribute_change(&registry, state.guards, name, old, new) else {
        return Ok(());
    };
    let entry = state.entry(id)?.clone();

    state.guards.enter_to_property(id);
    let result = apply(hooks, state, &entry, id, new);
    state.guards.exit_to_property();
    result
}

fn apply<H: UpdateHooks + ?Sized>(
    hooks: &mut H,
    state: &mut ElementState,
    entry: &PropertyEntry,
    id: PropertyId,
    raw: Option<&str>,
) -> Result<(), PropertyError> {
    let value = match entry.from_attribute(raw) {
        Ok(value) => value,
        // A removed attribute that the value type can't represent resets it.
        Err(ConversionError::Incompatible { .. }) if raw.is_none() => entry.initial(),
        Err(source) => {
            return Err(PropertyError::Conversion {
                key: entry.key(),
                source,
            });
        }
    };
    trace!(
        element = state.type_name(),
        attribute = ?raw,
        property = entry.key(),
        "applying attribute to property"
    );
    if entry.no_accessor() {
        hooks.assign_custom_property(state, id, value)
    } else {
        state.set_erased(id, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use understory_property::{PropertyDeclarationBuilder, PropertyRegistryBuilder, TypeHint};

    fn registry() -> (Arc<PropertyRegistry>, PropertyId, PropertyId) {
        let mut builder = PropertyRegistryBuilder::new("Bridged");
        let count = builder
            .declare(
                "count",
                PropertyDeclarationBuilder::new(0_i32)
                    .type_hint(TypeHint::Number)
                    .reflect(true),
            )
            .unwrap();
        let open = builder
            .declare(
                "open",
                PropertyDeclarationBuilder::new(false).type_hint(TypeHint::Boolean),
            )
            .unwrap();
        (builder.finalize(), count.id(), open.id())
    }

    #[test]
    fn route_ignores_unchanged_and_unknown_attributes() {
        let (registry, count, _) = registry();
        let guards = ReflectionGuards::default();
        assert_eq!(
            route_attribute_change(&registry, guards, "count", Some("1"), Some("1")),
            None
        );
        assert_eq!(
            route_attribute_change(&registry, guards, "missing", None, Some("1")),
            None
        );
        assert_eq!(
            route_attribute_change(&registry, guards, "count", None, Some("1")),
            Some(count)
        );
    }

    #[test]
    fn route_ignores_changes_during_reflection() {
        let (registry, count, _) = registry();
        let mut guards = ReflectionGuards::default();
        guards.enter_to_attribute(count);
        assert_eq!(
            route_attribute_change(&registry, guards, "open", None, Some("")),
            None
        );
        guards.exit_to_attribute();
        assert!(guards.is_clear());
    }

    #[test]
    fn reflection_sets_and_removes() {
        let (registry, count, open) = registry();
        let mut attributes = AttributeMap::new();
        let mut guards = ReflectionGuards::default();

        let entry = registry.get(count).unwrap();
        property_to_attribute(
            &registry,
            &mut attributes,
            &mut guards,
            entry,
            count,
            &ErasedValue::new(5_i32),
        )
        .unwrap();
        assert_eq!(attributes.get("count"), Some("5"));

        let entry = registry.get(open).unwrap();
        property_to_attribute(
            &registry,
            &mut attributes,
            &mut guards,
            entry,
            open,
            &ErasedValue::new(true),
        )
        .unwrap();
        assert_eq!(attributes.get("open"), Some(""));
        property_to_attribute(
            &registry,
            &mut attributes,
            &mut guards,
            entry,
            open,
            &ErasedValue::new(false),
        )
        .unwrap();
        assert!(!attributes.contains("open"));
        assert_eq!(attributes.mutations(), 3);
        assert!(guards.is_clear());
    }

    #[test]
    fn reflecting_the_same_value_is_not_a_mutation() {
        let (registry, count, _) = registry();
        let mut attributes = AttributeMap::new();
        let mut guards = ReflectionGuards::default();
        let entry = registry.get(count).unwrap();
        for _ in 0..2 {
            property_to_attribute(
                &registry,
                &mut attributes,
                &mut guards,
                entry,
                count,
                &ErasedValue::new(7_i32),
            )
            .unwrap();
        }
        assert_eq!(attributes.mutations(), 1);
    }
}
