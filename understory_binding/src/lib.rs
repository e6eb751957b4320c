// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Binding: prioritized property bindings with deferred activation.
//!
//! A UI object's properties can be driven by several *bindings* at once: a
//! style setter, a template, a local value, a running animation. Each binding
//! is a push-based [`ValueSource`] installed at a [`BindingPriority`] tier. This
//! crate stores those bindings per object and decides which of them are
//! subscribed.
//!
//! ## Core Concepts
//!
//! ### Resolution
//!
//! Each property holds at most one binding per tier. The binding at the
//! highest-precedence tier present is the *effective* binding, and its last
//! pushed value is the property's value:
//!
//! | Tier | Rank |
//! |------|------|
//! | [`Animation`](BindingPriority::Animation) | 0 (wins) |
//! | [`LocalValue`](BindingPriority::LocalValue) | 1 |
//! | [`StyleTrigger`](BindingPriority::StyleTrigger) | 2 |
//! | [`Template`](BindingPriority::Template) | 3 |
//! | [`Style`](BindingPriority::Style) | 4 |
//!
//! ### Activation
//!
//! Only the effective binding of a property is subscribed to its source. When a
//! new binding takes over, the one it supersedes is unsubscribed before the new
//! one is subscribed.
//!
//! ### Deferred activation
//!
//! Objects are usually built by applying many bindings in a row, and most of
//! them are replaced before construction finishes. Bracketing construction
//! with [`ValueStore::begin_init`] and [`ValueStore::end_init`] defers every
//! subscription to the end of the bracket, so a source is only ever subscribed
//! if its binding survives construction.
//!
//! ### Completion
//!
//! A source that completes (or fails) stops its binding. The binding keeps its
//! last value and is never subscribed again. [`ValueStore::set_value`] uses
//! this: a local value is a [`Constant`] source that pushes once and completes.
//!
//! ## Quick Start
//!
//! ```rust
//! use understory_binding::{BindingPriority, Property, Subject, ValueStore};
//!
//! let opacity: Property<f32> = Property::new(0);
//! let style = Subject::new();
//! let local = Subject::new();
//!
//! let mut store = ValueStore::new(1_u32);
//!
//! // Build with activation deferred.
//! store.begin_init();
//! store.add_binding(opacity, style.clone(), BindingPriority::Style);
//! store.add_binding(opacity, local.clone(), BindingPriority::LocalValue);
//! store.end_init().unwrap();
//!
//! // Only the effective binding was subscribed.
//! assert_eq!(style.subscribe_count(), 0);
//! assert_eq!(local.subscribe_count(), 1);
//!
//! local.next(0.5);
//! assert_eq!(store.value(opacity), Some(0.5));
//!
//! // Animation outranks everything else.
//! let fade = store.set_value(opacity, 0.0, BindingPriority::Animation);
//! assert_eq!(local.observer_count(), 0);
//! assert_eq!(store.value(opacity), Some(0.0));
//!
//! // Removing it brings the local binding back.
//! store.remove_binding(fade);
//! assert_eq!(local.subscribe_count(), 2);
//! ```
//!
//! ## Change notifications
//!
//! [`ValueStore::set_change_handler`] registers a callback that sees every
//! value or error pushed by a subscribed binding, as a [`PropertyChange`].
//! When a removal uncovers a completed binding, its held value is reported
//! again; when a property's reported value disappears without a replacement,
//! the handler sees [`ValueChange::Cleared`]. Source errors never surface as
//! `Err` from store operations.
//!
//! ## Memory layout
//!
//! | Optimization | Description |
//! |--------------|-------------|
//! | **Sorted slots** | One slot per bound property, binary-searched by [`PropertyId`] |
//! | **Inline storage** | `SmallVec` for slots and for tiers within a slot |
//! | **`PropertyId` as u16** | Compact property identification |
//!
//! ## Features
//!
//! - `tracing`: emits `trace`/`debug`/`warn` events for activation,
//!   deactivation, replacement, completion, source errors, and the
//!   construction window.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.
//!
//! ## Threading
//!
//! Stores, sources, and observers are single-threaded (`Rc`-based).

#![no_std]

extern crate alloc;

mod entry;
mod error;
mod id;
mod object;
mod priority;
mod slot;
mod source;
mod store;
mod value;

pub use error::{BindingError, ValueStoreError};
pub use id::{BindingHandle, BindingId, Property, PropertyId};
pub use object::{BindingObject, BindingObjectExt};
pub use priority::BindingPriority;
pub use source::{BindingObserver, Constant, Subject, Subscription, ValueSource};
pub use store::{InitScope, PropertyChange, ValueChange, ValueStore};
pub use value::ErasedValue;
