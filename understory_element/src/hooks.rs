// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overridable update hooks.

use understory_property::{ErasedValue, PropertyId};

use crate::changes::ChangedProperties;
use crate::completion::{UpdateCompletion, UpdateGate};
use crate::error::{HookError, PropertyError, UpdateError, UpdateStage};
use crate::lifecycle::LifecycleFlags;
use crate::state::ElementState;

/// Behavior an element type layers over the update cycle.
///
/// Every method has a default, so an element that only needs reflection can
/// use `()`. Hooks receive the element state separately from `self`, which
/// lets them read and write properties while keeping their own data.
///
/// A cycle calls, in order: [`should_update`](Self::should_update), then (if
/// it returned `true`) [`will_update`](Self::will_update) and
/// [`update`](Self::update); the cycle then settles, and finally
/// [`first_updated`](Self::first_updated) (first successful cycle only) and
/// [`updated`](Self::updated) run. Property writes made from any hook land in
/// the next cycle's batch.
///
/// # Example
///
/// ```rust
/// use understory_element::{ChangedProperties, Element, ElementState, HookError, UpdateHooks};
/// use understory_property::{PropertyDeclarationBuilder, PropertyRegistryBuilder};
///
/// #[derive(Default)]
/// struct Renders(usize);
///
/// impl UpdateHooks for Renders {
///     fn updated(
///         &mut self,
///         _element: &mut ElementState,
///         _changed: &ChangedProperties,
///     ) -> Result<(), HookError> {
///         self.0 += 1;
///         Ok(())
///     }
/// }
///
/// let mut builder = PropertyRegistryBuilder::new("Greeting");
/// let name = builder
///     .declare("name", PropertyDeclarationBuilder::new(String::from("world")))
///     .unwrap();
/// let mut element = Element::new(builder.finalize(), Renders::default());
/// element.connected();
/// element.set(name, String::from("there"));
/// element.set(name, String::from("you"));
/// element.flush();
/// assert_eq!(element.hooks().0, 1);
/// ```
pub trait UpdateHooks {
    /// Decides whether the cycle renders.
    ///
    /// Returning `false` still settles the cycle and discards the batch.
    fn should_update(
        &mut self,
        element: &ElementState,
        changed: &ChangedProperties,
    ) -> Result<bool, HookError> {
        let _ = (element, changed);
        Ok(true)
    }

    /// Runs before [`update`](Self::update); a place to compute derived state.
    fn will_update(
        &mut self,
        element: &mut ElementState,
        changed: &ChangedProperties,
    ) -> Result<(), HookError> {
        let _ = (element, changed);
        Ok(())
    }

    /// Renders the element.
    ///
    /// The default reflects pending properties to their attributes.
    /// Overrides should call [`ElementState::reflect_properties`] too.
    fn update(
        &mut self,
        element: &mut ElementState,
        changed: &ChangedProperties,
    ) -> Result<(), HookError> {
        let _ = changed;
        element.reflect_properties(&*self)?;
        Ok(())
    }

    /// Runs after the first successful cycle, before [`updated`](Self::updated).
    fn first_updated(
        &mut self,
        element: &mut ElementState,
        changed: &ChangedProperties,
    ) -> Result<(), HookError> {
        let _ = (element, changed);
        Ok(())
    }

    /// Runs after every cycle whose [`should_update`](Self::should_update)
    /// returned `true`.
    fn updated(
        &mut self,
        element: &mut ElementState,
        changed: &ChangedProperties,
    ) -> Result<(), HookError> {
        let _ = (element, changed);
        Ok(())
    }

    /// Performs the cycle. The default is [`perform_update`].
    ///
    /// Overrides that wrap the default should call [`perform_update`]; the
    /// scheduler settles a cycle that forgot to.
    fn perform_update(&mut self, element: &mut ElementState) -> Result<(), UpdateError> {
        perform_update(self, element)
    }

    /// Returns a gate that holds the queued cycle back until it opens.
    ///
    /// Called once per queued cycle, after the previous cycle has settled and
    /// the element has connected.
    fn perform_gate(&mut self, element: &ElementState) -> Option<UpdateGate> {
        let _ = element;
        None
    }

    /// Returns the completion callers of
    /// [`Element::update_complete`](crate::Element::update_complete) wait on.
    ///
    /// Overrides can hand out a completion that also covers other work, such
    /// as a child element's cycle.
    fn update_complete(&self, element: &ElementState) -> UpdateCompletion {
        element.update_complete()
    }

    /// Reads a property whose accessor is user-defined.
    fn custom_property_value(&self, id: PropertyId) -> Option<ErasedValue> {
        let _ = id;
        None
    }

    /// Writes a property whose accessor is user-defined.
    ///
    /// Implementations store `value` and report the write with
    /// [`ElementState::request_property_update`] or
    /// [`ElementState::property_changed`].
    fn assign_custom_property(
        &mut self,
        element: &mut ElementState,
        id: PropertyId,
        value: ErasedValue,
    ) -> Result<(), PropertyError> {
        let _ = value;
        Err(element.no_accessor_error(id))
    }
}

impl UpdateHooks for () {}

/// The default body of [`UpdateHooks::perform_update`].
///
/// Applies pre-upgrade instance properties on the first run, takes the change
/// batch, runs the hooks, and settles the cycle whether or not they succeed.
/// Does nothing unless a cycle is running.
pub fn perform_update<H: UpdateHooks + ?Sized>(
    hooks: &mut H,
    element: &mut ElementState,
) -> Result<(), UpdateError> {
    if !element.scheduler.is_performing() {
        return Ok(());
    }

    if let Err(err) = element.apply_instance_properties(hooks) {
        element.scheduler.mark_settled();
        return Err(err.into());
    }

    let changed = element.take_changes();
    let rendered = render(hooks, element, &changed);
    element.scheduler.mark_settled();
    if !rendered? {
        return Ok(());
    }

    let first = !element.lifecycle.contains(LifecycleFlags::HAS_UPDATED);
    element.lifecycle.insert(LifecycleFlags::HAS_UPDATED);
    if first {
        hooks
            .first_updated(element, &changed)
            .map_err(|err| UpdateError::hook(UpdateStage::FirstUpdated, err))?;
    }
    hooks
        .updated(element, &changed)
        .map_err(|err| UpdateError::hook(UpdateStage::Updated, err))
}

/// Runs the hooks up to and including `update`; returns whether they rendered.
fn render<H: UpdateHooks + ?Sized>(
    hooks: &mut H,
    element: &mut ElementState,
    changed: &ChangedProperties,
) -> Result<bool, UpdateError> {
    let should_update = hooks
        .should_update(element, changed)
        .map_err(|err| UpdateError::hook(UpdateStage::ShouldUpdate, err))?;
    if !should_update {
        return Ok(false);
    }
    hooks
        .will_update(element, changed)
        .map_err(|err| UpdateError::hook(UpdateStage::WillUpdate, err))?;
    hooks
        .update(element, changed)
        .map_err(|err| UpdateError::hook(UpdateStage::Update, err))?;
    Ok(true)
}
