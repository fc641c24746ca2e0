// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Element: reactive element state with batched update cycles.
//!
//! An element type declares its properties once in an
//! [`understory_property::PropertyRegistry`]. Each [`Element`] instance then
//! tracks writes to those properties, keeps them in sync with string
//! attributes, and coalesces everything that happened since the last render
//! into one update cycle.
//!
//! ## Core Concepts
//!
//! ### Change tracking
//!
//! A write counts as a change when the declaration's `has_changed` predicate
//! says so. The first old value per property is kept until the batch is taken,
//! so [`ChangedProperties`] always reports what the property held before the
//! batch started.
//!
//! ### Reflection
//!
//! Properties declared with `reflect` push their value to their attribute
//! during the cycle; observed attributes set by the host are converted back
//! into their property immediately. [`ReflectionGuards`] stop either direction
//! from echoing into the other.
//!
//! ### Update cycles
//!
//! Requests queue at most one cycle. A queued cycle runs when the host calls
//! [`Element::run_pending`] or [`Element::flush`] and:
//!
//! 1. the previous cycle has settled,
//! 2. the element has connected at least once,
//! 3. the optional [`UpdateGate`] has opened.
//!
//! Every cycle resolves an [`UpdateCompletion`] with `Ok(true)` when nothing
//! else is pending, `Ok(false)` when another cycle was requested meanwhile, or
//! an [`UpdateError`] when a hook failed. A failed cycle still settles, so
//! later cycles run normally.
//!
//! ## Quick Start
//!
//! ```rust
//! use understory_element::{ChangedProperties, Element, ElementState, HookError, UpdateHooks};
//! use understory_property::{PropertyDeclarationBuilder, PropertyRegistryBuilder, TypeHint};
//!
//! #[derive(Default)]
//! struct Log(Vec<String>);
//!
//! impl UpdateHooks for Log {
//!     fn updated(
//!         &mut self,
//!         element: &mut ElementState,
//!         changed: &ChangedProperties,
//!     ) -> Result<(), HookError> {
//!         self.0.push(format!("{} changed", changed.len()));
//!         let _ = element;
//!         Ok(())
//!     }
//! }
//!
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
//!
//! let mut element = Element::new(registry, Log::default());
//! element.connected();
//! element.set(count, 1);
//! element.set(count, 5);
//! let done = element.update_complete();
//! assert_eq!(element.flush(), 1);
//!
//! assert_eq!(element.attribute("count"), Some("5"));
//! assert_eq!(element.hooks().0, ["1 changed"]);
//! assert_eq!(pollster::block_on(done).ok(), Some(true));
//!
//! // The host sets the attribute; the property follows without reflecting.
//! element.set_attribute("count", "9").unwrap();
//! assert_eq!(*element.get(count), 9);
//! element.flush();
//! assert_eq!(element.attributes().mutations(), 2);
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and spans; it never installs a
//! subscriber. Each performed cycle runs inside an `update_cycle` span.

mod attributes;
mod bridge;
mod changes;
mod completion;
mod element;
mod error;
mod hooks;
mod instance;
mod lifecycle;
mod scheduler;
mod state;

pub use attributes::AttributeMap;
pub use changes::{ChangeTracker, ChangedProperties};
pub use completion::{GateOpener, UpdateCompletion, UpdateGate};
pub use element::Element;
pub use error::{HookError, PropertyError, UpdateError, UpdateStage};
pub use hooks::{UpdateHooks, perform_update};
pub use instance::InstanceProperties;
pub use lifecycle::{LifecycleFlags, ReflectionGuards, UpdatePhase};
pub use scheduler::{CycleStep, Precondition};
pub use state::ElementState;
