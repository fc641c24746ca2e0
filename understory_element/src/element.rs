// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The element: state plus hooks, driven by its host.

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use understory_property::{ErasedValue, Property, PropertyId, PropertyRegistry, PropertyValue};

use crate::attributes::AttributeMap;
use crate::bridge;
use crate::completion::UpdateCompletion;
use crate::error::PropertyError;
use crate::hooks::UpdateHooks;
use crate::instance::InstanceProperties;
use crate::lifecycle::LifecycleFlags;
use crate::scheduler::{self, CycleStep};
use crate::state::ElementState;

/// A reactive element.
///
/// The host drives an element through three kinds of calls:
///
/// - lifecycle: [`connected`](Self::connected) and
///   [`disconnected`](Self::disconnected),
/// - attributes: [`set_attribute`](Self::set_attribute),
///   [`remove_attribute`](Self::remove_attribute), or
///   [`attribute_changed`](Self::attribute_changed) for hosts that keep their
///   own attribute storage,
/// - scheduling: [`run_pending`](Self::run_pending) or
///   [`flush`](Self::flush), called from the host's microtask or frame loop.
///
/// Property writes through [`set`](Self::set) record the change and request a
/// cycle; nothing renders until the host runs it.
///
/// ```rust
/// use understory_element::Element;
/// use understory_property::{PropertyDeclarationBuilder, PropertyRegistryBuilder, TypeHint};
///
/// let mut builder = PropertyRegistryBuilder::new("Counter");
/// let count = builder
///     .declare(
///         "count",
///         PropertyDeclarationBuilder::new(0_i32)
///             .type_hint(TypeHint::Number)
///             .reflect(true),
///     )
///     .unwrap();
/// let mut element = Element::new(builder.finalize(), ());
/// element.connected();
///
/// assert!(element.set(count, 5));
/// let done = element.update_complete();
/// element.flush();
/// assert_eq!(element.attribute("count"), Some("5"));
/// assert!(matches!(done.peek(), Some(Ok(true))));
///
/// element.set_attribute("count", "9").unwrap();
/// assert_eq!(*element.get(count), 9);
/// ```
pub struct Element<H: UpdateHooks> {
    state: ElementState,
    hooks: H,
}

impl<H: UpdateHooks> Element<H> {
    /// Creates an element and requests its first update cycle.
    pub fn new(registry: Arc<PropertyRegistry>, hooks: H) -> Self {
        Self::with_instance_properties(registry, hooks, None)
    }

    /// Creates an element for an instance that already carried property
    /// values.
    ///
    /// The values are applied through the accessors when the first cycle
    /// runs, and are part of that cycle's changed properties. Keys that the
    /// registry does not declare are ignored.
    pub fn upgrade(
        registry: Arc<PropertyRegistry>,
        hooks: H,
        instance: InstanceProperties,
    ) -> Result<Self, PropertyError> {
        let resolved = instance.resolve(&registry)?;
        Ok(Self::with_instance_properties(
            registry,
            hooks,
            (!resolved.is_empty()).then_some(resolved),
        ))
    }

    fn with_instance_properties(
        registry: Arc<PropertyRegistry>,
        hooks: H,
        instance: Option<Vec<(PropertyId, ErasedValue)>>,
    ) -> Self {
        let mut state = ElementState::new(registry, instance);
        state.request_update();
        Self { state, hooks }
    }

    /// The host attached the element.
    pub fn connected(&mut self) {
        self.state
            .lifecycle
            .insert(LifecycleFlags::HAS_CONNECTED | LifecycleFlags::CONNECTED);
        debug!(element = self.state.type_name(), "connected");
    }

    /// The host detached the element. Queued cycles still run.
    pub fn disconnected(&mut self) {
        self.state.lifecycle.remove(LifecycleFlags::CONNECTED);
        debug!(element = self.state.type_name(), "disconnected");
    }

    /// Attribute names this element type reacts to.
    #[must_use]
    pub fn observed_attributes(&self) -> &[String] {
        self.state.registry().observed_attributes()
    }

    /// Notifies the element that an observed attribute changed.
    ///
    /// Hosts that store attributes themselves call this; hosts that use the
    /// element's own [`AttributeMap`] call
    /// [`set_attribute`](Self::set_attribute) instead.
    pub fn attribute_changed(
        &mut self,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Result<(), PropertyError> {
        bridge::attribute_to_property(&mut self.hooks, &mut self.state, name, old, new)
    }

    /// Sets an attribute on the element, as a host or user would.
    pub fn set_attribute(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), PropertyError> {
        let value = value.into();
        let Some(mutation) = self.state.attributes.set(name, value.clone()) else {
            return Ok(());
        };
        self.attribute_changed(name, mutation.old.as_deref(), Some(&value))
    }

    /// Removes an attribute from the element, as a host or user would.
    pub fn remove_attribute(&mut self, name: &str) -> Result<(), PropertyError> {
        let Some(mutation) = self.state.attributes.remove(name) else {
            return Ok(());
        };
        self.attribute_changed(name, mutation.old.as_deref(), None)
    }

    /// Returns the value of an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.state.attribute(name)
    }

    /// Returns the attribute map.
    #[must_use]
    pub fn attributes(&self) -> &AttributeMap {
        self.state.attributes()
    }

    /// Reads a property. See [`ElementState::get`].
    #[must_use]
    pub fn get<T: PropertyValue>(&self, property: Property<T>) -> &T {
        self.state.get(property)
    }

    /// Writes a property. See [`ElementState::set`].
    pub fn set<T: PropertyValue>(&mut self, property: Property<T>, value: T) -> bool {
        self.state.set(property, value)
    }

    /// Requests an update cycle without recording a change.
    pub fn request_update(&mut self) -> UpdateCompletion {
        self.state.request_update()
    }

    /// Reports that a property changed outside its generated accessor.
    ///
    /// The current value is read from the shadow slot, or from
    /// [`UpdateHooks::custom_property_value`] for properties with a
    /// user-defined accessor.
    pub fn request_property_update(
        &mut self,
        id: PropertyId,
        old: ErasedValue,
    ) -> Result<UpdateCompletion, PropertyError> {
        let entry = self.state.entry(id)?.clone();
        if !entry.no_accessor() {
            return self.state.request_property_update(id, old);
        }
        let new = self
            .hooks
            .custom_property_value(id)
            .ok_or(PropertyError::NoAccessor { key: entry.key() })?;
        self.state.note_write(&entry, id, old, &new)
    }

    /// Returns the completion callers should wait on.
    ///
    /// This goes through [`UpdateHooks::update_complete`], so it may cover more
    /// than the element's own cycle.
    #[must_use]
    pub fn update_complete(&self) -> UpdateCompletion {
        self.hooks.update_complete(&self.state)
    }

    /// Runs the queued cycle if its preconditions hold.
    pub fn run_pending(&mut self) -> CycleStep {
        scheduler::run_pending(&mut self.hooks, &mut self.state)
    }

    /// Runs cycles until none is ready; returns how many settled.
    ///
    /// A hook that requests an update from every cycle keeps this looping.
    pub fn flush(&mut self) -> usize {
        let mut settled = 0;
        while self.run_pending().ran() {
            settled += 1;
        }
        settled
    }

    /// Returns the element state.
    #[must_use]
    pub fn state(&self) -> &ElementState {
        &self.state
    }

    /// Returns the element state mutably.
    pub fn state_mut(&mut self) -> &mut ElementState {
        &mut self.state
    }

    /// Returns the hooks.
    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Returns the hooks mutably.
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Returns state and hooks together, as hooks receive them.
    pub fn parts_mut(&mut self) -> (&mut ElementState, &mut H) {
        (&mut self.state, &mut self.hooks)
    }
}

impl<H: UpdateHooks> fmt::Debug for Element<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::UpdatePhase;
    use crate::scheduler::Precondition;
    use understory_property::{PropertyDeclarationBuilder, PropertyRegistryBuilder, TypeHint};

    fn counter() -> (Arc<PropertyRegistry>, Property<i32>) {
        let mut builder = PropertyRegistryBuilder::new("Counter");
        let count = builder
            .declare(
                "count",
                PropertyDeclarationBuilder::new(0_i32)
                    .type_hint(TypeHint::Number)
                    .reflect(true),
            )
            .unwrap();
        (builder.finalize(), count)
    }

    #[test]
    fn new_element_waits_for_connection() {
        let (registry, _) = counter();
        let mut element = Element::new(registry, ());
        assert_eq!(element.state().phase(), UpdatePhase::Requested);
        assert!(matches!(
            element.run_pending(),
            CycleStep::Blocked(Precondition::Connected)
        ));
        element.connected();
        assert!(element.state().is_connected());
        assert_eq!(element.flush(), 1);
        assert!(element.state().has_updated());
        assert_eq!(element.state().phase(), UpdatePhase::Idle);
    }

    #[test]
    fn disconnect_keeps_cycles_running() {
        let (registry, count) = counter();
        let mut element = Element::new(registry, ());
        element.connected();
        element.flush();
        element.disconnected();
        assert!(!element.state().is_connected());
        element.set(count, 2);
        assert_eq!(element.flush(), 1);
        assert_eq!(element.attribute("count"), Some("2"));
    }

    #[test]
    fn removing_an_attribute_resets_to_initial() {
        let (registry, count) = counter();
        let mut element = Element::new(registry, ());
        element.connected();
        element.set_attribute("count", "4").unwrap();
        assert_eq!(*element.get(count), 4);
        element.remove_attribute("count").unwrap();
        assert_eq!(*element.get(count), 0);
    }

    #[test]
    fn invalid_attribute_is_a_conversion_error() {
        let (registry, count) = counter();
        let mut element = Element::new(registry, ());
        let err = element.set_attribute("count", "many").unwrap_err();
        assert!(matches!(err, PropertyError::Conversion { key: "count", .. }));
        assert_eq!(*element.get(count), 0);
        assert!(element.state().guards().is_clear());
    }
}
