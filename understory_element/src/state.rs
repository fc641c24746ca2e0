// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-instance element state.

use std::any::TypeId;
use std::sync::Arc;

use tracing::trace;
use understory_property::{
    ErasedValue, Property, PropertyEntry, PropertyId, PropertyRegistry, PropertyValue,
    ShadowStore,
};

use crate::attributes::AttributeMap;
use crate::bridge;
use crate::changes::{ChangeTracker, ChangedProperties};
use crate::completion::UpdateCompletion;
use crate::error::PropertyError;
use crate::hooks::UpdateHooks;
use crate::lifecycle::{LifecycleFlags, ReflectionGuards, UpdatePhase};
use crate::scheduler::UpdateScheduler;

/// Everything one element instance owns, apart from its hooks.
///
/// Hooks receive `&mut ElementState`; it is also reachable through
/// [`Element::state_mut`](crate::Element::state_mut).
///
/// # Panics
///
/// The typed accessors ([`get`](Self::get), [`set`](Self::set),
/// [`property_changed`](Self::property_changed)) panic when given a handle
/// that was not declared in this element's registry with the same value type,
/// and `get`/`set` panic for properties with a user-defined accessor.
#[derive(Debug)]
pub struct ElementState {
    registry: Arc<PropertyRegistry>,
    store: ShadowStore,
    tracker: ChangeTracker,
    pub(crate) attributes: AttributeMap,
    pub(crate) lifecycle: LifecycleFlags,
    pub(crate) guards: ReflectionGuards,
    pub(crate) scheduler: UpdateScheduler,
    instance_properties: Option<Vec<(PropertyId, ErasedValue)>>,
}

impl ElementState {
    pub(crate) fn new(
        registry: Arc<PropertyRegistry>,
        instance_properties: Option<Vec<(PropertyId, ErasedValue)>>,
    ) -> Self {
        Self {
            registry,
            store: ShadowStore::new(),
            tracker: ChangeTracker::new(),
            attributes: AttributeMap::new(),
            lifecycle: LifecycleFlags::empty(),
            guards: ReflectionGuards::default(),
            scheduler: UpdateScheduler::new(),
            instance_properties,
        }
    }

    /// Returns the element type's registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<PropertyRegistry> {
        &self.registry
    }

    /// Returns the element type's name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.registry.type_name()
    }

    /// Reads a property through its generated accessor.
    #[must_use]
    pub fn get<T: PropertyValue>(&self, property: Property<T>) -> &T {
        accessor_entry(&self.registry, property);
        self.store.get_or_initial(property, &self.registry)
    }

    /// Writes a property through its generated accessor.
    ///
    /// Returns `true` if the write counted as a change, in which case an
    /// update has been requested.
    pub fn set<T: PropertyValue>(&mut self, property: Property<T>, value: T) -> bool {
        let registry = Arc::clone(&self.registry);
        let entry = accessor_entry(&registry, property);
        let old = self
            .store
            .replace(property.id(), ErasedValue::new(value))
            .unwrap_or_else(|| entry.initial());
        self.track_slot_write(entry, property.id(), old)
    }

    /// Reads a property with a generated accessor as an erased value.
    pub fn value(&self, id: PropertyId) -> Result<ErasedValue, PropertyError> {
        let entry = self.entry(id)?;
        if entry.no_accessor() {
            return Err(PropertyError::NoAccessor { key: entry.key() });
        }
        Ok(self
            .store
            .get_erased(id)
            .cloned()
            .unwrap_or_else(|| entry.initial()))
    }

    /// Writes a property with a generated accessor from an erased value.
    ///
    /// Returns whether the write counted as a change.
    pub fn set_erased(&mut self, id: PropertyId, value: ErasedValue) -> Result<bool, PropertyError> {
        let registry = Arc::clone(&self.registry);
        let entry = registry.get(id).ok_or(PropertyError::Unknown { id })?;
        if entry.no_accessor() {
            return Err(PropertyError::NoAccessor { key: entry.key() });
        }
        check_type(entry, &value)?;
        let old = self
            .store
            .replace(id, value)
            .unwrap_or_else(|| entry.initial());
        Ok(self.track_slot_write(entry, id, old))
    }

    /// Requests an update cycle without recording a change.
    pub fn request_update(&mut self) -> UpdateCompletion {
        self.scheduler.request(self.registry.type_name())
    }

    /// Reports that a property was changed in place, with its previous value.
    ///
    /// The current value is read from the shadow slot. For properties with a
    /// user-defined accessor use [`property_changed`](Self::property_changed)
    /// or [`Element::request_property_update`](crate::Element::request_property_update).
    pub fn request_property_update(
        &mut self,
        id: PropertyId,
        old: ErasedValue,
    ) -> Result<UpdateCompletion, PropertyError> {
        let registry = Arc::clone(&self.registry);
        let entry = registry.get(id).ok_or(PropertyError::Unknown { id })?;
        if entry.no_accessor() {
            return Err(PropertyError::NoAccessor { key: entry.key() });
        }
        let new = self
            .store
            .get_erased(id)
            .cloned()
            .unwrap_or_else(|| entry.initial());
        self.note_write(entry, id, old, &new)
    }

    /// Reports a write made by a user-defined accessor.
    pub fn property_changed<T: PropertyValue>(
        &mut self,
        property: Property<T>,
        old: T,
        new: &T,
    ) -> UpdateCompletion {
        let registry = Arc::clone(&self.registry);
        let entry = declared_entry(&registry, property);
        self.note(entry, property.id(), ErasedValue::new(old), &ErasedValue::new(new.clone()));
        self.scheduler.latest().clone()
    }

    pub(crate) fn note_write(
        &mut self,
        entry: &PropertyEntry,
        id: PropertyId,
        old: ErasedValue,
        new: &ErasedValue,
    ) -> Result<UpdateCompletion, PropertyError> {
        check_type(entry, &old)?;
        check_type(entry, new)?;
        self.note(entry, id, old, new);
        Ok(self.scheduler.latest().clone())
    }

    fn note(&mut self, entry: &PropertyEntry, id: PropertyId, old: ErasedValue, new: &ErasedValue) {
        if self
            .tracker
            .note_change(id, old, new, entry, self.guards.to_property().is_some())
        {
            self.scheduler.request(self.registry.type_name());
        }
    }

    fn track_slot_write(&mut self, entry: &PropertyEntry, id: PropertyId, old: ErasedValue) -> bool {
        let changed = match self.store.get_erased(id) {
            Some(new) => self
                .tracker
                .note_change(id, old, new, entry, self.guards.to_property().is_some()),
            None => false,
        };
        if changed {
            self.scheduler.request(self.registry.type_name());
        }
        changed
    }

    /// Writes every pending reflection to the attribute map.
    ///
    /// The default [`UpdateHooks::update`] calls this; `hooks` supplies the
    /// values of properties with user-defined accessors.
    pub fn reflect_properties<H: UpdateHooks + ?Sized>(
        &mut self,
        hooks: &H,
    ) -> Result<(), PropertyError> {
        let registry = Arc::clone(&self.registry);
        for id in self.tracker.take_reflecting() {
            let entry = registry.get(id).ok_or(PropertyError::Unknown { id })?;
            if entry.no_accessor() {
                let value = hooks
                    .custom_property_value(id)
                    .ok_or(PropertyError::NoAccessor { key: entry.key() })?;
                bridge::property_to_attribute(
                    &registry,
                    &mut self.attributes,
                    &mut self.guards,
                    entry,
                    id,
                    &value,
                )?;
                continue;
            }
            match self.store.get_erased(id) {
                Some(value) => bridge::property_to_attribute(
                    &registry,
                    &mut self.attributes,
                    &mut self.guards,
                    entry,
                    id,
                    value,
                )?,
                None => bridge::property_to_attribute(
                    &registry,
                    &mut self.attributes,
                    &mut self.guards,
                    entry,
                    id,
                    &entry.initial(),
                )?,
            }
        }
        Ok(())
    }

    /// Applies pre-upgrade values, once.
    pub(crate) fn apply_instance_properties<H: UpdateHooks + ?Sized>(
        &mut self,
        hooks: &mut H,
    ) -> Result<(), PropertyError> {
        let Some(pending) = self.instance_properties.take() else {
            return Ok(());
        };
        for (id, value) in pending {
            let no_accessor = self.entry(id)?.no_accessor();
            trace!(element = self.type_name(), property = %id, "applying instance property");
            if no_accessor {
                hooks.assign_custom_property(self, id, value)?;
            } else {
                self.set_erased(id, value)?;
            }
        }
        Ok(())
    }

    /// Takes the change batch for the running cycle.
    pub(crate) fn take_changes(&mut self) -> ChangedProperties {
        self.scheduler.stop_accepting();
        self.tracker.take_changed()
    }

    pub(crate) fn entry(&self, id: PropertyId) -> Result<&PropertyEntry, PropertyError> {
        self.registry.get(id).ok_or(PropertyError::Unknown { id })
    }

    /// Builds the error for a user-defined accessor that can't take a write.
    #[must_use]
    pub fn no_accessor_error(&self, id: PropertyId) -> PropertyError {
        match self.registry.get(id) {
            Some(entry) => PropertyError::NoAccessor { key: entry.key() },
            None => PropertyError::Unknown { id },
        }
    }

    /// Returns the value of an attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name)
    }

    /// Returns the attribute map.
    #[must_use]
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Returns the lifecycle flags.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleFlags {
        self.lifecycle
    }

    /// Returns `true` while the element is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lifecycle.contains(LifecycleFlags::CONNECTED)
    }

    /// Returns `true` once a cycle has completed its `update` hook.
    #[must_use]
    pub fn has_updated(&self) -> bool {
        self.lifecycle.contains(LifecycleFlags::HAS_UPDATED)
    }

    /// Returns the update phase.
    #[must_use]
    pub fn phase(&self) -> UpdatePhase {
        self.scheduler.phase()
    }

    /// Returns `true` if a cycle is queued or running and not yet settled.
    #[must_use]
    pub fn is_update_pending(&self) -> bool {
        self.scheduler.is_update_pending()
    }

    /// Returns the completion of the most recently requested cycle.
    #[must_use]
    pub fn update_complete(&self) -> UpdateCompletion {
        self.scheduler.latest().clone()
    }

    /// Returns the changes waiting for the next cycle.
    #[must_use]
    pub fn changed_properties(&self) -> &ChangedProperties {
        self.tracker.changed()
    }

    /// Returns the properties waiting to be reflected.
    #[must_use]
    pub fn reflecting_properties(&self) -> &[PropertyId] {
        self.tracker.reflecting()
    }

    /// Returns the reflection guards.
    #[must_use]
    pub fn guards(&self) -> ReflectionGuards {
        self.guards
    }
}

fn check_type(entry: &PropertyEntry, value: &ErasedValue) -> Result<(), PropertyError> {
    if entry.accepts(value) {
        Ok(())
    } else {
        Err(PropertyError::TypeMismatch {
            key: entry.key(),
            expected: entry.value_type_name(),
            found: value.type_name(),
        })
    }
}

fn declared_entry<T: PropertyValue>(
    registry: &PropertyRegistry,
    property: Property<T>,
) -> &PropertyEntry {
    let Some(entry) = registry.get(property.id()) else {
        panic!(
            "Property {} is not declared in {}",
            property.id(),
            registry.type_name()
        );
    };
    assert!(
        entry.type_id() == TypeId::of::<T>(),
        "Property '{}' holds {}, not {}",
        entry.key(),
        entry.value_type_name(),
        std::any::type_name::<T>()
    );
    entry
}

fn accessor_entry<T: PropertyValue>(
    registry: &PropertyRegistry,
    property: Property<T>,
) -> &PropertyEntry {
    let entry = declared_entry(registry, property);
    assert!(
        !entry.no_accessor(),
        "Property '{}' has a user-defined accessor",
        entry.key()
    );
    entry
}
