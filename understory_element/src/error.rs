// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use understory_property::{ConversionError, PropertyId};

/// Error returned by a user hook.
pub type HookError = Box<dyn Error + Send + Sync>;

/// Error reading, writing, or converting a property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyError {
    /// The id is not declared in the element's registry.
    Unknown {
        /// The offending id.
        id: PropertyId,
    },
    /// A value does not have the property's declared type.
    TypeMismatch {
        /// The property key.
        key: &'static str,
        /// The declared value type.
        expected: &'static str,
        /// The type of the supplied value.
        found: &'static str,
    },
    /// The property has a user-defined accessor that did not handle the
    /// operation.
    NoAccessor {
        /// The property key.
        key: &'static str,
    },
    /// Converting between the attribute and the property value failed.
    Conversion {
        /// The property key.
        key: &'static str,
        /// The conversion failure.
        source: ConversionError,
    },
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown { id } => write!(f, "property {id} is not declared"),
            Self::TypeMismatch {
                key,
                expected,
                found,
            } => write!(f, "property '{key}' holds {expected}, not {found}"),
            Self::NoAccessor { key } => {
                write!(f, "property '{key}' has a user-defined accessor that did not handle the write")
            }
            Self::Conversion { key, source } => {
                write!(f, "property '{key}' could not be converted: {source}")
            }
        }
    }
}

impl Error for PropertyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Conversion { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// The hook that failed during an update cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UpdateStage {
    /// [`UpdateHooks::should_update`](crate::UpdateHooks::should_update).
    ShouldUpdate,
    /// [`UpdateHooks::will_update`](crate::UpdateHooks::will_update).
    WillUpdate,
    /// [`UpdateHooks::update`](crate::UpdateHooks::update).
    Update,
    /// [`UpdateHooks::first_updated`](crate::UpdateHooks::first_updated).
    FirstUpdated,
    /// [`UpdateHooks::updated`](crate::UpdateHooks::updated).
    Updated,
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ShouldUpdate => "should_update",
            Self::WillUpdate => "will_update",
            Self::Update => "update",
            Self::FirstUpdated => "first_updated",
            Self::Updated => "updated",
        })
    }
}

/// Error rejecting an update cycle's completion.
///
/// Every clone of a completion observes the same error, so the hook error is
/// shared behind an [`Arc`].
#[derive(Clone, Debug)]
pub enum UpdateError {
    /// A hook returned an error.
    Hook {
        /// The failing hook.
        stage: UpdateStage,
        /// The hook's error.
        source: Arc<dyn Error + Send + Sync>,
    },
    /// Applying a pre-upgrade property value failed.
    Property(PropertyError),
    /// The gate returned by
    /// [`UpdateHooks::perform_gate`](crate::UpdateHooks::perform_gate) was
    /// dropped without opening.
    GateDropped,
    /// The element was dropped before the cycle ran.
    Abandoned,
}

impl UpdateError {
    pub(crate) fn hook(stage: UpdateStage, source: HookError) -> Self {
        Self::Hook {
            stage,
            source: Arc::from(source),
        }
    }

    /// Returns the failing hook, if a hook failed.
    #[must_use]
    pub fn stage(&self) -> Option<UpdateStage> {
        match self {
            Self::Hook { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hook { stage, source } => write!(f, "{stage} hook failed: {source}"),
            Self::Property(err) => write!(f, "instance property could not be applied: {err}"),
            Self::GateDropped => f.write_str("update gate was dropped before opening"),
            Self::Abandoned => f.write_str("element was dropped before the update ran"),
        }
    }
}

impl Error for UpdateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Hook { source, .. } => Some(&**source),
            Self::Property(err) => Some(err),
            Self::GateDropped | Self::Abandoned => None,
        }
    }
}

impl From<PropertyError> for UpdateError {
    fn from(err: PropertyError) -> Self {
        Self::Property(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_error_keeps_source() {
        let err = UpdateError::hook(UpdateStage::Updated, "boom".into());
        assert_eq!(err.stage(), Some(UpdateStage::Updated));
        assert_eq!(err.to_string(), "updated hook failed: boom");
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("boom"));

        let cloned = err.clone();
        assert_eq!(cloned.to_string(), err.to_string());
    }

    #[test]
    fn conversion_error_is_the_source() {
        let err = PropertyError::Conversion {
            key: "count",
            source: ConversionError::InvalidNumber { raw: "x".into() },
        };
        assert!(err.to_string().contains("'count'"));
        assert!(err.source().is_some());
        assert_eq!(UpdateError::from(err).stage(), None);
    }

    #[test]
    fn unit_variants_display() {
        assert!(UpdateError::GateDropped.to_string().contains("gate"));
        assert!(UpdateError::Abandoned.to_string().contains("dropped"));
        assert_eq!(
            PropertyError::Unknown {
                id: PropertyId::new(4)
            }
            .to_string(),
            "property #4 is not declared"
        );
    }
}
