// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-type property registries.
//!
//! A [`PropertyRegistryBuilder`] collects the declarations of one element type,
//! optionally on top of a supertype's finalized registry, and
//! [`finalize`](PropertyRegistryBuilder::finalize)s into an immutable
//! [`PropertyRegistry`] shared by every instance of the type.

use alloc::borrow::{Cow, ToOwned};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use core::fmt;
use hashbrown::HashMap;

use crate::converter::{AttributeUpdate, ConversionError, TypeHint};
use crate::declaration::{AttributeName, PropertyDeclaration};
use crate::id::{Property, PropertyId};
use crate::value::{ErasedValue, PropertyValue};

/// Error raised while declaring a property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// A declaration that wants a generated accessor overrides a key whose
    /// accessor is user-defined.
    AccessorConflict {
        /// The property key.
        key: &'static str,
        /// The type that declared the user-defined accessor.
        declared_by: &'static str,
    },
    /// An override declares a different value type than the existing
    /// declaration.
    TypeMismatch {
        /// The property key.
        key: &'static str,
        /// Value type of the existing declaration.
        expected: &'static str,
        /// Value type of the new declaration.
        found: &'static str,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessorConflict { key, declared_by } => write!(
                f,
                "property '{key}' has a user-defined accessor on {declared_by} and cannot be given a generated one"
            ),
            Self::TypeMismatch {
                key,
                expected,
                found,
            } => write!(
                f,
                "property '{key}' is declared as {expected}; cannot redeclare it as {found}"
            ),
        }
    }
}

impl core::error::Error for RegistryError {}

/// A declared property as seen through the registry.
///
/// Entries give type-erased access to a declaration, which is what the
/// per-instance machinery needs when it only knows a [`PropertyId`].
#[derive(Clone)]
pub struct PropertyEntry {
    key: &'static str,
    declared_by: &'static str,
    type_id: TypeId,
    type_name: &'static str,
    declaration: Arc<dyn ErasedDeclaration>,
}

impl PropertyEntry {
    /// Returns the property key.
    #[must_use]
    #[inline]
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Returns the name of the type whose declaration is in effect.
    #[must_use]
    #[inline]
    pub fn declared_by(&self) -> &'static str {
        self.declared_by
    }

    /// Returns the [`TypeId`] of the property's value type.
    #[must_use]
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the name of the property's value type.
    #[must_use]
    #[inline]
    pub fn value_type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the attribute naming rule.
    #[must_use]
    pub fn attribute(&self) -> &AttributeName {
        self.declaration.attribute()
    }

    /// Returns the type hint.
    #[must_use]
    pub fn type_hint(&self) -> &TypeHint {
        self.declaration.type_hint()
    }

    /// Returns whether changes are reflected to the attribute.
    #[must_use]
    pub fn reflect(&self) -> bool {
        self.declaration.reflect()
    }

    /// Returns whether the accessor is user-defined.
    #[must_use]
    pub fn no_accessor(&self) -> bool {
        self.declaration.no_accessor()
    }

    /// Returns a copy of the declared initial value.
    #[must_use]
    pub fn initial(&self) -> ErasedValue {
        self.declaration.initial_erased()
    }

    /// Returns `true` if `value` has this property's value type.
    #[must_use]
    pub fn accepts(&self, value: &ErasedValue) -> bool {
        value.type_id() == self.type_id
    }

    /// Evaluates the change predicate on erased values.
    ///
    /// A value of another type always counts as a change.
    #[must_use]
    pub fn has_changed(&self, new: &ErasedValue, old: &ErasedValue) -> bool {
        self.declaration.has_changed_erased(new, old)
    }

    /// Converts an attribute into an erased property value.
    pub fn from_attribute(&self, raw: Option<&str>) -> Result<ErasedValue, ConversionError> {
        self.declaration.from_attribute_erased(raw)
    }

    /// Converts an erased property value into an attribute update.
    pub fn to_attribute(&self, value: &ErasedValue) -> Result<AttributeUpdate, ConversionError> {
        self.declaration.to_attribute_erased(value)
    }

    /// Returns the typed declaration, or `None` if `T` is not the value type.
    #[must_use]
    pub fn declaration<T: PropertyValue>(&self) -> Option<&PropertyDeclaration<T>> {
        self.declaration.as_any().downcast_ref()
    }
}

impl fmt::Debug for PropertyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyEntry")
            .field("key", &self.key)
            .field("declared_by", &self.declared_by)
            .field("type", &self.type_name)
            .field("attribute", self.attribute())
            .field("reflect", &self.reflect())
            .field("no_accessor", &self.no_accessor())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`PropertyRegistry`].
///
/// # Example
///
/// ```rust
/// use understory_property::{PropertyDeclarationBuilder, PropertyRegistryBuilder, TypeHint};
///
/// let mut base = PropertyRegistryBuilder::new("BaseCounter");
/// let count = base
///     .declare(
///         "count",
///         PropertyDeclarationBuilder::new(0_i32)
///             .type_hint(TypeHint::Number)
///             .reflect(true),
///     )
///     .unwrap();
/// let base = base.finalize();
///
/// let mut fancy = PropertyRegistryBuilder::extending("FancyCounter", &base);
/// let label = fancy
///     .declare("label", PropertyDeclarationBuilder::new(String::new()))
///     .unwrap();
/// let fancy = fancy.finalize();
///
/// // Ids declared on the base type stay valid on the derived type.
/// assert_eq!(fancy.by_name("count"), Some(count.id()));
/// assert_eq!(fancy.by_name("label"), Some(label.id()));
/// assert_eq!(fancy.observed_attributes(), ["count", "label"]);
/// ```
pub struct PropertyRegistryBuilder {
    type_name: &'static str,
    supertype: Option<Arc<PropertyRegistry>>,
    entries: Vec<PropertyEntry>,
    by_key: HashMap<&'static str, PropertyId>,
}

impl PropertyRegistryBuilder {
    /// Starts a registry for a type without a supertype.
    #[must_use]
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            supertype: None,
            entries: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    /// Starts a registry whose base is the supertype's finalized registry.
    ///
    /// Every supertype declaration is carried over with its id.
    #[must_use]
    pub fn extending(type_name: &'static str, supertype: &Arc<PropertyRegistry>) -> Self {
        Self {
            type_name,
            supertype: Some(Arc::clone(supertype)),
            entries: supertype.entries.clone(),
            by_key: supertype.by_key.clone(),
        }
    }

    /// Declares a property, or overrides the declaration of an existing key.
    ///
    /// Overriding keeps the key's id.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::AccessorConflict`] if a declaration with a generated
    ///   accessor overrides a key whose accessor is user-defined.
    /// - [`RegistryError::TypeMismatch`] if an override changes the value type.
    ///
    /// # Panics
    ///
    /// Panics if more than 65,535 properties are declared.
    pub fn declare<T: PropertyValue>(
        &mut self,
        key: &'static str,
        declaration: impl Into<PropertyDeclaration<T>>,
    ) -> Result<Property<T>, RegistryError> {
        let declaration = declaration.into();
        let entry = PropertyEntry {
            key,
            declared_by: self.type_name,
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            declaration: Arc::new(declaration),
        };

        if let Some(&id) = self.by_key.get(key) {
            let existing = &self.entries[id.slot()];
            if existing.no_accessor() && !entry.no_accessor() {
                return Err(RegistryError::AccessorConflict {
                    key,
                    declared_by: existing.declared_by,
                });
            }
            if existing.type_id != entry.type_id {
                return Err(RegistryError::TypeMismatch {
                    key,
                    expected: existing.type_name,
                    found: entry.type_name,
                });
            }
            self.entries[id.slot()] = entry;
            return Ok(Property::from_id(id));
        }

        assert!(
            self.entries.len() < u16::MAX as usize,
            "Too many properties declared (max {})",
            u16::MAX
        );

        #[expect(clippy::cast_possible_truncation, reason = "checked above")]
        let id = PropertyId::new(self.entries.len() as u16);
        self.entries.push(entry);
        self.by_key.insert(key, id);
        Ok(Property::from_id(id))
    }

    /// Returns the number of properties declared so far, supertype included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finishes the registry.
    ///
    /// This resolves every attribute name and builds the attribute → property
    /// map. When two properties resolve to the same attribute name, the one
    /// declared later wins.
    #[must_use]
    pub fn finalize(self) -> Arc<PropertyRegistry> {
        let mut attribute_names = Vec::with_capacity(self.entries.len());
        let mut by_attribute = HashMap::new();
        let mut observed: Vec<String> = Vec::new();

        for (slot, entry) in self.entries.iter().enumerate() {
            #[expect(clippy::cast_possible_truncation, reason = "slot < len <= u16::MAX")]
            let id = PropertyId::new(slot as u16);
            let name = entry
                .attribute()
                .resolve(entry.key)
                .map(Cow::into_owned);
            if let Some(name) = &name
                && by_attribute.insert(name.clone(), id).is_none()
            {
                observed.push(name.clone());
            }
            attribute_names.push(name);
        }

        Arc::new(PropertyRegistry {
            type_name: self.type_name,
            supertype: self.supertype,
            entries: self.entries,
            by_key: self.by_key,
            attribute_names,
            by_attribute,
            observed,
        })
    }
}

impl fmt::Debug for PropertyRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRegistryBuilder")
            .field("type_name", &self.type_name)
            .field("count", &self.entries.len())
            .finish_non_exhaustive()
    }
}

/// The finalized property declarations of one element type.
///
/// Registries are immutable and shared through [`Arc`]. Lookups by
/// [`PropertyId`] index directly into a vector.
pub struct PropertyRegistry {
    type_name: &'static str,
    supertype: Option<Arc<Self>>,
    entries: Vec<PropertyEntry>,
    by_key: HashMap<&'static str, PropertyId>,
    attribute_names: Vec<Option<String>>,
    by_attribute: HashMap<String, PropertyId>,
    observed: Vec<String>,
}

impl PropertyRegistry {
    /// Returns the name of the type this registry belongs to.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the supertype's registry, if any.
    #[must_use]
    pub fn supertype(&self) -> Option<&Arc<Self>> {
        self.supertype.as_ref()
    }

    /// Returns the number of declared properties.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no properties are declared.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a property by key.
    #[must_use]
    pub fn by_name(&self, key: &str) -> Option<PropertyId> {
        self.by_key.get(key).copied()
    }

    /// Looks up a typed property handle by key.
    ///
    /// Returns `None` if the key is undeclared or `T` is not its value type.
    #[must_use]
    pub fn property<T: PropertyValue>(&self, key: &str) -> Option<Property<T>> {
        let id = self.by_name(key)?;
        (self.entries[id.slot()].type_id == TypeId::of::<T>()).then(|| Property::from_id(id))
    }

    /// Returns the entry for a property.
    #[must_use]
    pub fn get(&self, id: PropertyId) -> Option<&PropertyEntry> {
        self.entries.get(id.slot())
    }

    /// Returns the typed declaration for a property.
    ///
    /// Returns `None` if the property is not declared here or the type doesn't
    /// match.
    #[must_use]
    pub fn declaration<T: PropertyValue>(
        &self,
        property: Property<T>,
    ) -> Option<&PropertyDeclaration<T>> {
        self.get(property.id())
            .and_then(PropertyEntry::declaration::<T>)
    }

    /// Returns the resolved attribute name of a property.
    #[must_use]
    pub fn attribute_name(&self, id: PropertyId) -> Option<&str> {
        self.attribute_names.get(id.slot())?.as_deref()
    }

    /// Returns the property an attribute name maps to.
    #[must_use]
    pub fn property_for_attribute(&self, name: &str) -> Option<PropertyId> {
        self.by_attribute.get(name).copied()
    }

    /// Returns the attribute names the host should report changes for.
    ///
    /// Each name appears once, in declaration order.
    #[must_use]
    pub fn observed_attributes(&self) -> &[String] {
        &self.observed
    }

    /// Returns an iterator over all declared properties in id order.
    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, &PropertyEntry)> {
        self.entries.iter().enumerate().map(|(i, entry)| {
            #[expect(clippy::cast_possible_truncation, reason = "index < len <= u16::MAX")]
            (PropertyId::new(i as u16), entry)
        })
    }
}

impl fmt::Debug for PropertyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRegistry")
            .field("type_name", &self.type_name)
            .field(
                "supertype",
                &self.supertype.as_ref().map(|supertype| supertype.type_name),
            )
            .field(
                "properties",
                &self.entries.iter().map(|entry| entry.key).collect::<Vec<_>>(),
            )
            .field("observed", &self.observed)
            .finish_non_exhaustive()
    }
}

/// Type-erased declaration for heterogeneous storage.
trait ErasedDeclaration: Any {
    fn as_any(&self) -> &dyn Any;
    fn attribute(&self) -> &AttributeName;
    fn type_hint(&self) -> &TypeHint;
    fn reflect(&self) -> bool;
    fn no_accessor(&self) -> bool;
    fn initial_erased(&self) -> ErasedValue;
    fn has_changed_erased(&self, new: &ErasedValue, old: &ErasedValue) -> bool;
    fn from_attribute_erased(&self, raw: Option<&str>) -> Result<ErasedValue, ConversionError>;
    fn to_attribute_erased(&self, value: &ErasedValue)
    -> Result<AttributeUpdate, ConversionError>;
}

impl<T: PropertyValue> ErasedDeclaration for PropertyDeclaration<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn attribute(&self) -> &AttributeName {
        Self::attribute(self)
    }

    fn type_hint(&self) -> &TypeHint {
        Self::type_hint(self)
    }

    fn reflect(&self) -> bool {
        Self::reflect(self)
    }

    fn no_accessor(&self) -> bool {
        Self::no_accessor(self)
    }

    fn initial_erased(&self) -> ErasedValue {
        ErasedValue::new(self.initial().clone())
    }

    fn has_changed_erased(&self, new: &ErasedValue, old: &ErasedValue) -> bool {
        match (new.downcast_ref::<T>(), old.downcast_ref::<T>()) {
            (Some(new), Some(old)) => Self::has_changed(self, new, old),
            _ => true,
        }
    }

    fn from_attribute_erased(&self, raw: Option<&str>) -> Result<ErasedValue, ConversionError> {
        Self::from_attribute(self, raw).map(ErasedValue::new)
    }

    fn to_attribute_erased(
        &self,
        value: &ErasedValue,
    ) -> Result<AttributeUpdate, ConversionError> {
        match value.downcast_ref::<T>() {
            Some(value) => Self::to_attribute(self, value),
            None => Err(ConversionError::Incompatible {
                type_name: core::any::type_name::<T>(),
                message: "value of type ".to_owned() + value.type_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::PropertyDeclarationBuilder;
    use alloc::{format, vec, vec::Vec};

    fn counter_registry() -> (Arc<PropertyRegistry>, Property<i32>, Property<bool>) {
        let mut builder = PropertyRegistryBuilder::new("Counter");
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
                "isOpen",
                PropertyDeclarationBuilder::new(false).type_hint(TypeHint::Boolean),
            )
            .unwrap();
        (builder.finalize(), count, open)
    }

    #[test]
    fn registry_empty() {
        let registry = PropertyRegistryBuilder::new("Empty").finalize();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.observed_attributes().is_empty());
        assert_eq!(registry.type_name(), "Empty");
        assert!(registry.supertype().is_none());
    }

    #[test]
    fn registry_declare_assigns_sequential_ids() {
        let (registry, count, open) = counter_registry();
        assert_eq!(count.id().index(), 0);
        assert_eq!(open.id().index(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn registry_lookups() {
        let (registry, count, open) = counter_registry();
        assert_eq!(registry.by_name("count"), Some(count.id()));
        assert_eq!(registry.by_name("missing"), None);
        assert_eq!(registry.property::<i32>("count"), Some(count));
        assert_eq!(registry.property::<bool>("count"), None);
        assert_eq!(registry.get(open.id()).unwrap().key(), "isOpen");
        assert_eq!(registry.declaration(count).unwrap().initial(), &0);
        assert!(registry.get(PropertyId::new(99)).is_none());
    }

    #[test]
    fn derived_attribute_names_are_lowercased() {
        let (registry, count, open) = counter_registry();
        assert_eq!(registry.attribute_name(count.id()), Some("count"));
        assert_eq!(registry.attribute_name(open.id()), Some("isopen"));
        assert_eq!(registry.property_for_attribute("isopen"), Some(open.id()));
        assert_eq!(registry.property_for_attribute("isOpen"), None);
    }

    #[test]
    fn attribute_off_is_not_observed() {
        let mut builder = PropertyRegistryBuilder::new("Widget");
        let secret = builder
            .declare("secret", PropertyDeclarationBuilder::new(0_u8).no_attribute())
            .unwrap();
        let registry = builder.finalize();
        assert_eq!(registry.attribute_name(secret.id()), None);
        assert!(registry.observed_attributes().is_empty());
    }

    #[test]
    fn attribute_collision_last_declaration_wins() {
        let mut builder = PropertyRegistryBuilder::new("Widget");
        builder
            .declare("first", PropertyDeclarationBuilder::new(0_u8).attribute("shared"))
            .unwrap();
        let second = builder
            .declare("second", PropertyDeclarationBuilder::new(0_u8).attribute("shared"))
            .unwrap();
        let registry = builder.finalize();
        assert_eq!(registry.property_for_attribute("shared"), Some(second.id()));
        assert_eq!(registry.observed_attributes(), ["shared"]);
    }

    #[test]
    fn extending_preserves_ids_and_overrides_in_place() {
        let (base, count, _) = counter_registry();
        let mut builder = PropertyRegistryBuilder::extending("FancyCounter", &base);
        let overridden = builder
            .declare(
                "count",
                PropertyDeclarationBuilder::new(10_i32).attribute("data-count"),
            )
            .unwrap();
        let extra = builder
            .declare("extra", PropertyDeclarationBuilder::new(0.5_f64))
            .unwrap();
        let fancy = builder.finalize();

        assert_eq!(overridden, count);
        assert_eq!(extra.id().index(), 2);
        assert_eq!(fancy.declaration(count).unwrap().initial(), &10);
        assert_eq!(fancy.get(count.id()).unwrap().declared_by(), "FancyCounter");
        assert_eq!(fancy.attribute_name(count.id()), Some("data-count"));
        assert_eq!(fancy.observed_attributes(), ["data-count", "isopen", "extra"]);
        assert_eq!(fancy.supertype().unwrap().type_name(), "Counter");

        // The supertype is unaffected.
        assert_eq!(base.declaration(count).unwrap().initial(), &0);
        assert_eq!(base.attribute_name(count.id()), Some("count"));
    }

    #[test]
    fn override_with_other_type_is_rejected() {
        let (base, _, _) = counter_registry();
        let mut builder = PropertyRegistryBuilder::extending("Broken", &base);
        let err = builder
            .declare("count", PropertyDeclarationBuilder::new(String::new()))
            .unwrap_err();
        assert!(matches!(err, RegistryError::TypeMismatch { key: "count", .. }));
    }

    #[test]
    fn generated_accessor_cannot_replace_user_accessor() {
        let mut builder = PropertyRegistryBuilder::new("Base");
        builder
            .declare("custom", PropertyDeclarationBuilder::new(0_i32).no_accessor(true))
            .unwrap();
        let base = builder.finalize();

        let mut builder = PropertyRegistryBuilder::extending("Derived", &base);
        let err = builder
            .declare("custom", PropertyDeclarationBuilder::new(1_i32))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::AccessorConflict {
                key: "custom",
                declared_by: "Base"
            }
        );
        assert!(format!("{err}").contains("user-defined accessor"));

        // Redeclaring with a user accessor again is fine.
        builder
            .declare("custom", PropertyDeclarationBuilder::new(1_i32).no_accessor(true))
            .unwrap();
    }

    #[test]
    fn entry_erased_operations() {
        let (registry, count, _) = counter_registry();
        let entry = registry.get(count.id()).unwrap();
        assert_eq!(entry.initial(), ErasedValue::new(0_i32));
        assert!(entry.accepts(&ErasedValue::new(3_i32)));
        assert!(!entry.accepts(&ErasedValue::new(3_i64)));
        assert!(entry.has_changed(&ErasedValue::new(1_i32), &ErasedValue::new(0_i32)));
        assert!(!entry.has_changed(&ErasedValue::new(1_i32), &ErasedValue::new(1_i32)));
        assert!(entry.has_changed(&ErasedValue::new(1_i64), &ErasedValue::new(1_i32)));
        assert_eq!(entry.from_attribute(Some("9")), Ok(ErasedValue::new(9_i32)));
        assert_eq!(
            entry.to_attribute(&ErasedValue::new(5_i32)),
            Ok(AttributeUpdate::Set("5".into()))
        );
        assert!(matches!(
            entry.to_attribute(&ErasedValue::new("5")),
            Err(ConversionError::Incompatible { .. })
        ));
    }

    #[test]
    fn registry_iter_in_id_order() {
        let (registry, _, _) = counter_registry();
        let keys: Vec<_> = registry.iter().map(|(_, entry)| entry.key()).collect();
        assert_eq!(keys, vec!["count", "isOpen"]);
    }

    #[test]
    fn registry_debug() {
        let (registry, _, _) = counter_registry();
        let debug = format!("{registry:?}");
        assert!(debug.contains("PropertyRegistry"));
        assert!(debug.contains("Counter"));
        assert!(debug.contains("isOpen"));
    }
}
