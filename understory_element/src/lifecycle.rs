// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lifecycle flags, update phases, and reflection guards.

use understory_property::PropertyId;

bitflags::bitflags! {
    /// Connection and update history of an element.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct LifecycleFlags: u8 {
        /// The element has been connected at least once. Update cycles only
        /// run after this is set.
        const HAS_CONNECTED = 0b0000_0001;
        /// The element is currently connected.
        const CONNECTED     = 0b0000_0010;
        /// At least one cycle has run its `update` hook to completion.
        const HAS_UPDATED   = 0b0000_0100;
    }
}

/// Where the element is in its update cycle.
///
/// ```text
/// Idle ──request──▶ Requested ──run──▶ Performing ──settle──▶ Settled
///   ▲                   ▲                                         │
///   └───────────────────┴──────── (follow-up queued?) ────────────┘
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum UpdatePhase {
    /// No cycle is queued or running.
    #[default]
    Idle,
    /// A cycle is queued and waiting for its preconditions.
    Requested,
    /// A cycle is running and has not taken its change batch or settled yet.
    Performing,
    /// The running cycle has settled; post-update hooks are running.
    Settled,
}

/// The two attribute/property reflection guards.
///
/// Each guard names the property whose value is crossing over. At most one
/// guard is set at a time.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReflectionGuards {
    to_attribute: Option<PropertyId>,
    to_property: Option<PropertyId>,
}

impl ReflectionGuards {
    /// Returns the property currently being written to its attribute.
    #[must_use]
    pub fn to_attribute(&self) -> Option<PropertyId> {
        self.to_attribute
    }

    /// Returns the property currently being assigned from its attribute.
    #[must_use]
    pub fn to_property(&self) -> Option<PropertyId> {
        self.to_property
    }

    /// Returns `true` if neither guard is set.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.to_attribute.is_none() && self.to_property.is_none()
    }

    pub(crate) fn enter_to_attribute(&mut self, id: PropertyId) {
        debug_assert!(
            self.to_property.is_none(),
            "reflecting {id} to its attribute while an attribute is being applied"
        );
        self.to_attribute = Some(id);
    }

    pub(crate) fn exit_to_attribute(&mut self) {
        self.to_attribute = None;
    }

    pub(crate) fn enter_to_property(&mut self, id: PropertyId) {
        debug_assert!(
            self.to_attribute.is_none(),
            "applying an attribute to {id} while a property is being reflected"
        );
        self.to_property = Some(id);
    }

    pub(crate) fn exit_to_property(&mut self) {
        self.to_property = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_enter_and_exit() {
        let id = PropertyId::new(1);
        let mut guards = ReflectionGuards::default();
        assert!(guards.is_clear());

        guards.enter_to_attribute(id);
        assert_eq!(guards.to_attribute(), Some(id));
        assert_eq!(guards.to_property(), None);
        guards.exit_to_attribute();
        assert!(guards.is_clear());

        guards.enter_to_property(id);
        assert_eq!(guards.to_property(), Some(id));
        guards.exit_to_property();
        assert!(guards.is_clear());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "while a property is being reflected")]
    fn guards_are_mutually_exclusive() {
        let mut guards = ReflectionGuards::default();
        guards.enter_to_attribute(PropertyId::new(0));
        guards.enter_to_property(PropertyId::new(1));
    }

    #[test]
    fn lifecycle_starts_empty() {
        let flags = LifecycleFlags::default();
        assert!(!flags.contains(LifecycleFlags::HAS_CONNECTED));
        assert_eq!(UpdatePhase::default(), UpdatePhase::Idle);
    }
}
