// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property declarations.
//!
//! A [`PropertyDeclaration`] describes one declared property: its initial
//! value, how it maps to an attribute, how values are converted, whether
//! changes are reflected back to the attribute, and which writes count as
//! changes. [`PropertyDeclarationBuilder`] constructs one.

use alloc::borrow::Cow;
use alloc::sync::Arc;
use core::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::converter::{
    AttributeUpdate, ConversionError, Converter, FromAttributeFn, TypeHint,
    pass_through_from_attribute,
};
use crate::value::PropertyValue;

/// Change predicate: `(new, old) -> changed`.
pub type HasChangedFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Default change predicate: inequality that treats two NaN-like values (values
/// not equal to themselves) as unchanged.
///
/// ```rust
/// use understory_property::not_equal;
///
/// assert!(not_equal(&1, &2));
/// assert!(!not_equal(&1, &1));
/// assert!(!not_equal(&f64::NAN, &f64::NAN));
/// assert!(not_equal(&f64::NAN, &1.0));
/// ```
#[allow(clippy::eq_op, reason = "self-comparison detects NaN-like values")]
pub fn not_equal<T: PartialEq + ?Sized>(new: &T, old: &T) -> bool {
    old != new && (old == old || new == new)
}

/// How a property's attribute name is chosen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum AttributeName {
    /// The property has no attribute.
    Off,
    /// The attribute name is the lowercased property key.
    #[default]
    Derived,
    /// The attribute name is used verbatim.
    Named(Cow<'static, str>),
}

impl AttributeName {
    /// Resolves the attribute name for the property `key`.
    ///
    /// ```rust
    /// use understory_property::AttributeName;
    ///
    /// assert_eq!(AttributeName::Derived.resolve("maxCount").as_deref(), Some("maxcount"));
    /// assert_eq!(
    ///     AttributeName::Named("max-count".into()).resolve("maxCount").as_deref(),
    ///     Some("max-count")
    /// );
    /// assert_eq!(AttributeName::Off.resolve("maxCount"), None);
    /// ```
    #[must_use]
    pub fn resolve<'a>(&'a self, key: &str) -> Option<Cow<'a, str>> {
        match self {
            Self::Off => None,
            Self::Derived => Some(Cow::Owned(key.to_lowercase())),
            Self::Named(name) => Some(Cow::Borrowed(name.as_ref())),
        }
    }
}

/// Declaration of one property.
///
/// # Example
///
/// ```rust
/// use understory_property::{AttributeUpdate, PropertyDeclarationBuilder, TypeHint};
///
/// let count = PropertyDeclarationBuilder::new(0_i32)
///     .type_hint(TypeHint::Number)
///     .reflect(true)
///     .build();
///
/// assert!(count.reflect());
/// assert_eq!(count.attribute_name("count").as_deref(), Some("count"));
/// assert_eq!(count.from_attribute(Some("9")), Ok(9));
/// assert_eq!(count.to_attribute(&5), Ok(AttributeUpdate::Set("5".into())));
/// ```
pub struct PropertyDeclaration<T> {
    initial: T,
    attribute: AttributeName,
    type_hint: TypeHint,
    converter: Option<Converter<T>>,
    fallback: Converter<T>,
    pass_through: Option<FromAttributeFn<T>>,
    reflect: bool,
    has_changed: Option<HasChangedFn<T>>,
    no_accessor: bool,
}

impl<T: PropertyValue> PropertyDeclaration<T> {
    /// Returns the value a shadow slot holds before it is first written.
    #[must_use]
    #[inline]
    pub fn initial(&self) -> &T {
        &self.initial
    }

    /// Returns the attribute naming rule.
    #[must_use]
    #[inline]
    pub fn attribute(&self) -> &AttributeName {
        &self.attribute
    }

    /// Resolves the attribute name for this declaration under `key`.
    #[must_use]
    pub fn attribute_name<'a>(&'a self, key: &str) -> Option<Cow<'a, str>> {
        self.attribute.resolve(key)
    }

    /// Returns the type hint passed to converters.
    #[must_use]
    #[inline]
    pub fn type_hint(&self) -> &TypeHint {
        &self.type_hint
    }

    /// Returns whether changes are reflected to the attribute.
    #[must_use]
    #[inline]
    pub fn reflect(&self) -> bool {
        self.reflect
    }

    /// Returns whether the element core leaves the accessor to user code.
    #[must_use]
    #[inline]
    pub fn no_accessor(&self) -> bool {
        self.no_accessor
    }

    /// Returns the user-supplied converter, if any.
    #[must_use]
    pub fn converter(&self) -> Option<&Converter<T>> {
        self.converter.as_ref()
    }

    /// Evaluates the change predicate for a write of `new` over `old`.
    #[must_use]
    pub fn has_changed(&self, new: &T, old: &T) -> bool {
        match &self.has_changed {
            Some(predicate) => predicate(new, old),
            None => not_equal(new, old),
        }
    }

    /// Converts an attribute into a property value.
    ///
    /// Without a user converter the default converter is used. A user
    /// converter without a `from_attribute` half passes the raw string
    /// through.
    pub fn from_attribute(&self, raw: Option<&str>) -> Result<T, ConversionError> {
        let parse = match &self.converter {
            None => self.fallback.from_half(),
            Some(converter) => converter.from_half().or(self.pass_through.as_ref()),
        };
        match parse {
            Some(parse) => parse(raw, &self.type_hint),
            None => Err(self.missing_converter()),
        }
    }

    /// Converts a property value into an attribute update.
    ///
    /// A user converter without a `to_attribute` half falls back to the
    /// default converter.
    pub fn to_attribute(&self, value: &T) -> Result<AttributeUpdate, ConversionError> {
        let format = self
            .converter
            .as_ref()
            .and_then(Converter::to_half)
            .or(self.fallback.to_half());
        match format {
            Some(format) => format(value, &self.type_hint),
            None => Err(self.missing_converter()),
        }
    }

    fn missing_converter(&self) -> ConversionError {
        ConversionError::MissingConverter {
            type_name: core::any::type_name::<T>(),
        }
    }
}

// Manual Debug impl since the callbacks aren't Debug
impl<T: fmt::Debug> fmt::Debug for PropertyDeclaration<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDeclaration")
            .field("initial", &self.initial)
            .field("attribute", &self.attribute)
            .field("type_hint", &self.type_hint)
            .field("converter", &self.converter)
            .field("reflect", &self.reflect)
            .field("has_custom_has_changed", &self.has_changed.is_some())
            .field("no_accessor", &self.no_accessor)
            .finish_non_exhaustive()
    }
}

/// Builder for [`PropertyDeclaration`].
///
/// [`new`](Self::new) is for serde-compatible value types and installs the
/// default converter. [`opaque`](Self::opaque) accepts any value type; such
/// properties have no attribute unless one is requested together with a
/// converter.
///
/// # Example
///
/// ```rust
/// use understory_property::{PropertyDeclarationBuilder, TypeHint};
///
/// let open = PropertyDeclarationBuilder::new(false)
///     .type_hint(TypeHint::Boolean)
///     .attribute("is-open")
///     .reflect(true)
///     .build();
/// assert_eq!(open.attribute_name("open").as_deref(), Some("is-open"));
///
/// let hidden = PropertyDeclarationBuilder::new(0_u32)
///     .no_attribute()
///     .has_changed(|new: &u32, old: &u32| new / 10 != old / 10)
///     .build();
/// assert_eq!(hidden.attribute_name("hidden"), None);
/// assert!(!hidden.has_changed(&12, &15));
/// ```
pub struct PropertyDeclarationBuilder<T> {
    declaration: PropertyDeclaration<T>,
}

impl<T: PropertyValue + Serialize + DeserializeOwned> PropertyDeclarationBuilder<T> {
    /// Starts a declaration whose converter defaults to the serde-backed
    /// default converter.
    #[must_use]
    pub fn new(initial: T) -> Self {
        let pass_through: FromAttributeFn<T> =
            Arc::new(|raw: Option<&str>, _: &TypeHint| pass_through_from_attribute::<T>(raw));
        Self {
            declaration: PropertyDeclaration {
                fallback: Converter::serde_default(),
                pass_through: Some(pass_through),
                ..Self::bare(initial)
            },
        }
    }
}

impl<T: PropertyValue> PropertyDeclarationBuilder<T> {
    /// Starts a declaration for a value type without serde support.
    ///
    /// The attribute is off by default. Turning it on requires a converter;
    /// conversions without one fail with
    /// [`ConversionError::MissingConverter`].
    #[must_use]
    pub fn opaque(initial: T) -> Self {
        Self {
            declaration: PropertyDeclaration {
                attribute: AttributeName::Off,
                ..Self::bare(initial)
            },
        }
    }

    fn bare(initial: T) -> PropertyDeclaration<T> {
        PropertyDeclaration {
            initial,
            attribute: AttributeName::Derived,
            type_hint: TypeHint::Unspecified,
            converter: None,
            fallback: Converter::new(),
            pass_through: None,
            reflect: false,
            has_changed: None,
            no_accessor: false,
        }
    }

    /// Uses `name` verbatim as the attribute name.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.declaration.attribute = AttributeName::Named(name.into());
        self
    }

    /// Derives the attribute name by lowercasing the property key.
    #[must_use]
    pub fn derived_attribute(mut self) -> Self {
        self.declaration.attribute = AttributeName::Derived;
        self
    }

    /// Disables the attribute.
    #[must_use]
    pub fn no_attribute(mut self) -> Self {
        self.declaration.attribute = AttributeName::Off;
        self
    }

    /// Sets the type hint passed to converters.
    #[must_use]
    pub fn type_hint(mut self, hint: TypeHint) -> Self {
        self.declaration.type_hint = hint;
        self
    }

    /// Sets a custom converter.
    #[must_use]
    pub fn converter(mut self, converter: Converter<T>) -> Self {
        self.declaration.converter = Some(converter);
        self
    }

    /// Sets whether changes are reflected to the attribute.
    #[must_use]
    pub fn reflect(mut self, reflect: bool) -> Self {
        self.declaration.reflect = reflect;
        self
    }

    /// Sets a custom change predicate `(new, old) -> changed`.
    #[must_use]
    pub fn has_changed<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.declaration.has_changed = Some(Arc::new(predicate));
        self
    }

    /// Leaves the accessor to user code.
    ///
    /// The element core then holds no shadow slot for the property; the user
    /// accessor stores the value and reports writes.
    #[must_use]
    pub fn no_accessor(mut self, no_accessor: bool) -> Self {
        self.declaration.no_accessor = no_accessor;
        self
    }

    /// Builds the declaration.
    #[must_use]
    pub fn build(self) -> PropertyDeclaration<T> {
        self.declaration
    }
}

impl<T: fmt::Debug> fmt::Debug for PropertyDeclarationBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyDeclarationBuilder")
            .field(&self.declaration)
            .finish()
    }
}

impl<T: PropertyValue> From<PropertyDeclarationBuilder<T>> for PropertyDeclaration<T> {
    fn from(builder: PropertyDeclarationBuilder<T>) -> Self {
        builder.build()
    }
}
