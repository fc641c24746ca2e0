// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversion between attribute strings and typed property values.
//!
//! An attribute is either absent (`None`) or a string. A property value is any
//! [`PropertyValue`]. A [`Converter`] bridges the two with an optional
//! `from_attribute` function and an optional `to_attribute` function.
//!
//! The default converter routes values through [`serde_json::Value`] and is
//! steered by the declaration's [`TypeHint`]:
//!
//! | Hint | `to_attribute` | `from_attribute` |
//! |------|----------------|------------------|
//! | `Boolean` | `""` if truthy, remove if falsy | present → `true`, absent → `false` |
//! | `Number` | pass-through | absent → `null`, else numeric parse |
//! | `Object` / `Array` | JSON text, `null` removes | JSON parse, absent → `null` |
//! | anything else | pass-through | raw string, absent → `null` |
//!
//! "Pass-through" writes strings verbatim, numbers in their shortest form
//! (`5.0` becomes `"5"`), booleans as `true`/`false`, and removes the attribute
//! for `null`.
//!
//! Numeric parsing trims whitespace and treats empty text as `0`. Integral
//! values in any notation (`"5.0"`, `"1e3"`) parse as integers, so integer
//! properties accept them. Text that is not a finite number fails with
//! [`ConversionError::InvalidNumber`] instead of producing NaN, because a JSON
//! number cannot hold NaN. A fractional value for an integer property fails
//! with [`ConversionError::Incompatible`].

use alloc::borrow::Cow;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use core::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};

use crate::value::PropertyValue;

/// Opaque hint describing how a property's value maps to its attribute.
///
/// The hint is handed to every converter call; the default converter uses it
/// to choose a representation, custom converters may ignore it or interpret
/// [`TypeHint::Custom`] however they like.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TypeHint {
    /// No hint; attributes are treated as raw strings.
    #[default]
    Unspecified,
    /// String-valued property.
    String,
    /// Numeric property.
    Number,
    /// Boolean property; presence of the attribute means `true`.
    Boolean,
    /// Object property serialized as JSON.
    Object,
    /// Array property serialized as JSON.
    Array,
    /// Application-defined hint.
    Custom(Cow<'static, str>),
}

/// What a `to_attribute` conversion asks the bridge to do with the attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttributeUpdate {
    /// Set the attribute to this string.
    Set(String),
    /// Remove the attribute.
    Remove,
    /// Leave the attribute untouched.
    ///
    /// This lets a converter opt a particular value out of reflection without
    /// turning reflection off for the property.
    Unchanged,
}

/// Error converting between an attribute string and a property value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConversionError {
    /// The attribute was expected to hold a number.
    InvalidNumber {
        /// The attribute text.
        raw: String,
    },
    /// The attribute was expected to hold JSON.
    InvalidJson {
        /// The attribute text.
        raw: String,
        /// Parser message.
        message: String,
    },
    /// The converted representation does not fit the property's value type.
    Incompatible {
        /// Name of the property value type.
        type_name: &'static str,
        /// Deserializer message.
        message: String,
    },
    /// The property value could not be serialized for reflection.
    Serialize {
        /// Serializer message.
        message: String,
    },
    /// The property needs a converter but none is available for its type.
    MissingConverter {
        /// Name of the property value type.
        type_name: &'static str,
    },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNumber { raw } => write!(f, "attribute value {raw:?} is not a number"),
            Self::InvalidJson { raw, message } => {
                write!(f, "attribute value {raw:?} is not valid JSON: {message}")
            }
            Self::Incompatible { type_name, message } => {
                write!(f, "attribute value does not convert to {type_name}: {message}")
            }
            Self::Serialize { message } => {
                write!(f, "property value cannot be serialized: {message}")
            }
            Self::MissingConverter { type_name } => {
                write!(f, "no attribute converter available for {type_name}")
            }
        }
    }
}

impl core::error::Error for ConversionError {}

/// Converts an attribute (absent or string) into a property value.
pub type FromAttributeFn<T> =
    Arc<dyn Fn(Option<&str>, &TypeHint) -> Result<T, ConversionError> + Send + Sync>;

/// Converts a property value into an attribute update.
pub type ToAttributeFn<T> =
    Arc<dyn Fn(&T, &TypeHint) -> Result<AttributeUpdate, ConversionError> + Send + Sync>;

/// A user-supplied converter.
///
/// Either half may be missing. When a declaration carries a converter:
///
/// - a missing `to_attribute` falls back to the default converter's
///   `to_attribute`;
/// - a missing `from_attribute` passes the raw attribute string through.
///
/// # Example
///
/// ```rust
/// use understory_property::{AttributeUpdate, Converter, TypeHint};
///
/// // Single-function form: only parsing is customized.
/// let upper = Converter::from_fn(|raw: Option<&str>, _hint: &TypeHint| {
///     Ok(raw.unwrap_or_default().to_uppercase())
/// });
/// assert!(upper.has_from_attribute());
/// assert!(!upper.has_to_attribute());
///
/// // Pair form.
/// let flag = Converter::new()
///     .from_attribute(|raw: Option<&str>, _: &TypeHint| Ok(raw == Some("on")))
///     .to_attribute(|value: &bool, _: &TypeHint| {
///         Ok(AttributeUpdate::Set(if *value { "on" } else { "off" }.into()))
///     });
/// assert!(flag.has_from_attribute() && flag.has_to_attribute());
/// ```
pub struct Converter<T> {
    from_attribute: Option<FromAttributeFn<T>>,
    to_attribute: Option<ToAttributeFn<T>>,
}

impl<T> Converter<T> {
    /// Creates a converter with neither half set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            from_attribute: None,
            to_attribute: None,
        }
    }

    /// Creates a converter from a single parsing function.
    #[must_use]
    pub fn from_fn<F>(from_attribute: F) -> Self
    where
        F: Fn(Option<&str>, &TypeHint) -> Result<T, ConversionError> + Send + Sync + 'static,
    {
        Self::new().from_attribute(from_attribute)
    }

    /// Sets the attribute → property half.
    #[must_use]
    pub fn from_attribute<F>(mut self, from_attribute: F) -> Self
    where
        F: Fn(Option<&str>, &TypeHint) -> Result<T, ConversionError> + Send + Sync + 'static,
    {
        self.from_attribute = Some(Arc::new(from_attribute));
        self
    }

    /// Sets the property → attribute half.
    #[must_use]
    pub fn to_attribute<F>(mut self, to_attribute: F) -> Self
    where
        F: Fn(&T, &TypeHint) -> Result<AttributeUpdate, ConversionError> + Send + Sync + 'static,
    {
        self.to_attribute = Some(Arc::new(to_attribute));
        self
    }

    /// Returns whether the attribute → property half is set.
    #[must_use]
    pub fn has_from_attribute(&self) -> bool {
        self.from_attribute.is_some()
    }

    /// Returns whether the property → attribute half is set.
    #[must_use]
    pub fn has_to_attribute(&self) -> bool {
        self.to_attribute.is_some()
    }

    pub(crate) fn from_half(&self) -> Option<&FromAttributeFn<T>> {
        self.from_attribute.as_ref()
    }

    pub(crate) fn to_half(&self) -> Option<&ToAttributeFn<T>> {
        self.to_attribute.as_ref()
    }
}

impl<T: Serialize + DeserializeOwned + PropertyValue> Converter<T> {
    /// The default converter for serde-compatible value types.
    #[must_use]
    pub fn serde_default() -> Self {
        Self::new()
            .from_attribute(default_from_attribute::<T>)
            .to_attribute(|value: &T, hint: &TypeHint| default_to_attribute(value, hint))
    }
}

impl<T> Default for Converter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Converter<T> {
    fn clone(&self) -> Self {
        Self {
            from_attribute: self.from_attribute.clone(),
            to_attribute: self.to_attribute.clone(),
        }
    }
}

// Manual Debug impl since the functions aren't Debug
impl<T> fmt::Debug for Converter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("from_attribute", &self.from_attribute.is_some())
            .field("to_attribute", &self.to_attribute.is_some())
            .finish()
    }
}

/// Default `to_attribute` conversion.
///
/// # Example
///
/// ```rust
/// use understory_property::{AttributeUpdate, TypeHint, default_to_attribute};
///
/// assert_eq!(
///     default_to_attribute(&5_i32, &TypeHint::Number),
///     Ok(AttributeUpdate::Set("5".into()))
/// );
/// assert_eq!(
///     default_to_attribute(&true, &TypeHint::Boolean),
///     Ok(AttributeUpdate::Set(String::new()))
/// );
/// assert_eq!(
///     default_to_attribute(&false, &TypeHint::Boolean),
///     Ok(AttributeUpdate::Remove)
/// );
/// assert_eq!(
///     default_to_attribute(&vec![1, 2], &TypeHint::Array),
///     Ok(AttributeUpdate::Set("[1,2]".into()))
/// );
/// ```
pub fn default_to_attribute<T: Serialize + ?Sized>(
    value: &T,
    hint: &TypeHint,
) -> Result<AttributeUpdate, ConversionError> {
    let value = serde_json::to_value(value).map_err(|err| ConversionError::Serialize {
        message: err.to_string(),
    })?;
    Ok(match hint {
        TypeHint::Boolean => {
            if is_truthy(&value) {
                AttributeUpdate::Set(String::new())
            } else {
                AttributeUpdate::Remove
            }
        }
        TypeHint::Object | TypeHint::Array => match value {
            Value::Null => AttributeUpdate::Remove,
            other => AttributeUpdate::Set(other.to_string()),
        },
        _ => pass_through(value),
    })
}

/// Default `from_attribute` conversion.
///
/// # Example
///
/// ```rust
/// use understory_property::{TypeHint, default_from_attribute};
///
/// assert_eq!(default_from_attribute::<i32>(Some("9"), &TypeHint::Number), Ok(9));
/// assert_eq!(default_from_attribute::<Option<f64>>(None, &TypeHint::Number), Ok(None));
/// assert_eq!(default_from_attribute::<bool>(Some(""), &TypeHint::Boolean), Ok(true));
/// assert_eq!(default_from_attribute::<bool>(None, &TypeHint::Boolean), Ok(false));
/// assert_eq!(
///     default_from_attribute::<Vec<u8>>(Some("[1,2]"), &TypeHint::Array),
///     Ok(vec![1, 2])
/// );
/// ```
pub fn default_from_attribute<T: DeserializeOwned>(
    raw: Option<&str>,
    hint: &TypeHint,
) -> Result<T, ConversionError> {
    let value = match (hint, raw) {
        (TypeHint::Boolean, raw) => Value::Bool(raw.is_some()),
        (_, None) => Value::Null,
        (TypeHint::Number, Some(raw)) => Value::Number(parse_number(raw)?),
        (TypeHint::Object | TypeHint::Array, Some(raw)) => {
            serde_json::from_str(raw).map_err(|err| ConversionError::InvalidJson {
                raw: raw.to_string(),
                message: err.to_string(),
            })?
        }
        (_, Some(raw)) => Value::String(raw.to_string()),
    };
    serde_json::from_value(value).map_err(|err| ConversionError::Incompatible {
        type_name: core::any::type_name::<T>(),
        message: err.to_string(),
    })
}

/// Raw pass-through used when a converter has no `from_attribute` half.
pub(crate) fn pass_through_from_attribute<T: DeserializeOwned>(
    raw: Option<&str>,
) -> Result<T, ConversionError> {
    default_from_attribute(raw, &TypeHint::Unspecified)
}

fn pass_through(value: Value) -> AttributeUpdate {
    match value {
        Value::Null => AttributeUpdate::Remove,
        Value::String(text) => AttributeUpdate::Set(text),
        Value::Bool(flag) => AttributeUpdate::Set(flag.to_string()),
        Value::Number(number) => AttributeUpdate::Set(number_to_attribute(&number)),
        other => AttributeUpdate::Set(other.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Largest magnitude below which every integral `f64` is an exact `i64`.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Returns the integer value of an integral float within 2^53.
fn exact_integer(float: f64) -> Option<i64> {
    if -EXACT_INTEGER_LIMIT < float && float < EXACT_INTEGER_LIMIT {
        #[expect(clippy::cast_possible_truncation, reason = "magnitude below 2^53")]
        let int = float as i64;
        return (int as f64 == float).then_some(int);
    }
    None
}

/// Formats a number the way a script host prints it: integral floats lose
/// their fraction.
fn number_to_attribute(number: &Number) -> String {
    if number.is_f64()
        && let Some(int) = number.as_f64().and_then(exact_integer)
    {
        return int.to_string();
    }
    number.to_string()
}

/// Parses a numeric attribute.
///
/// Integral values (`"5"`, `"5.0"`, `"1e3"`) become integers so integer
/// properties accept them. Text that is not a finite number is an error
/// rather than NaN, since `serde_json` numbers cannot hold NaN.
fn parse_number(raw: &str) -> Result<Number, ConversionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Number::from(0));
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Ok(Number::from(int));
    }
    if let Ok(uint) = trimmed.parse::<u64>() {
        return Ok(Number::from(uint));
    }
    let float = trimmed
        .parse::<f64>()
        .map_err(|_| ConversionError::InvalidNumber {
            raw: raw.to_string(),
        })?;
    if let Some(int) = exact_integer(float) {
        return Ok(Number::from(int));
    }
    Number::from_f64(float).ok_or_else(|| ConversionError::InvalidNumber {
        raw: raw.to_string(),
    })
}
