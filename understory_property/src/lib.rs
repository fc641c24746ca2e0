// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Property: declarative, attribute-backed element properties.
//!
//! This crate describes *what* properties an element type has and how each
//! maps to a string attribute. The per-instance update machinery lives in
//! `understory_element`.
//!
//! ## Core Concepts
//!
//! ### Declarations
//!
//! A [`PropertyDeclaration`] carries everything about one property:
//!
//! - **initial** - the value an unwritten slot reads as
//! - **attribute** - off, derived (lowercased key), or an explicit name
//! - **type hint** - steers the default [`Converter`]
//! - **converter** - custom attribute ↔ value conversion
//! - **reflect** - push value changes back to the attribute
//! - **has changed** - predicate deciding whether a write is a change
//! - **no accessor** - the value is owned by user code, not a shadow slot
//!
//! ### Registries
//!
//! A [`PropertyRegistryBuilder`] collects declarations for one element type,
//! optionally on top of a supertype's registry, and finalizes into an immutable
//! [`PropertyRegistry`]. Finalizing resolves attribute names and the list of
//! [observed attributes](PropertyRegistry::observed_attributes).
//!
//! ### Shadow slots
//!
//! [`ShadowStore`] holds one instance's written values. Unwritten slots read
//! as the declared initial value.
//!
//! ## Quick Start
//!
//! ```rust
//! use understory_property::{
//!     AttributeUpdate, PropertyDeclarationBuilder, PropertyRegistryBuilder, ShadowStore,
//!     TypeHint,
//! };
//!
//! // Declare the properties of a type.
//! let mut builder = PropertyRegistryBuilder::new("MyCounter");
//! let count = builder
//!     .declare(
//!         "count",
//!         PropertyDeclarationBuilder::new(0_i32)
//!             .type_hint(TypeHint::Number)
//!             .reflect(true),
//!     )
//!     .unwrap();
//! let registry = builder.finalize();
//! assert_eq!(registry.observed_attributes(), ["count"]);
//!
//! // Store values for one instance.
//! let mut store = ShadowStore::new();
//! assert_eq!(store.get_or_initial(count, &registry), &0);
//! store.set(count, 5);
//!
//! // Convert to and from the attribute representation.
//! let declaration = registry.declaration(count).unwrap();
//! assert_eq!(
//!     declaration.to_attribute(&5),
//!     Ok(AttributeUpdate::Set("5".into()))
//! );
//! assert_eq!(declaration.from_attribute(Some("9")), Ok(9));
//! ```
//!
//! ## Memory Optimizations
//!
//! | Optimization | Description |
//! |--------------|-------------|
//! | **Sparse storage** | `ShadowStore` only allocates for written properties |
//! | **Shared declarations** | Initial values and converters live in the registry, not per instance |
//! | **Inline storage** | `SmallVec` for small property counts |
//! | **`PropertyId` as u16** | Compact property identification |
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.

#![no_std]

extern crate alloc;

mod converter;
mod declaration;
mod id;
mod registry;
mod store;
mod value;

pub use converter::{
    AttributeUpdate, ConversionError, Converter, FromAttributeFn, ToAttributeFn, TypeHint,
    default_from_attribute, default_to_attribute,
};
pub use declaration::{
    AttributeName, HasChangedFn, PropertyDeclaration, PropertyDeclarationBuilder, not_equal,
};
pub use id::{Property, PropertyId};
pub use registry::{PropertyEntry, PropertyRegistry, PropertyRegistryBuilder, RegistryError};
pub use store::ShadowStore;
pub use value::{ErasedValue, PropertyValue};
