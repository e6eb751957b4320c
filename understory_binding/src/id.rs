// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identity types.
//!
//! Properties are identified by [`PropertyId`], a compact handle issued by
//! whatever registration system the embedder uses, and wrapped in a typed
//! [`Property<T>`] key. Installed bindings are identified by [`BindingHandle`].

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

use crate::priority::BindingPriority;

/// A runtime property identifier.
///
/// The store treats this as an opaque, ordered map key. Slots are kept sorted
/// by `PropertyId`, which also fixes the order in which
/// [`ValueStore::end_init`](crate::ValueStore::end_init) visits them.
///
/// ```rust
/// use understory_binding::PropertyId;
///
/// let id = PropertyId::new(7);
/// assert_eq!(id.index(), 7);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyId(u16);

impl PropertyId {
    /// Creates a property ID from a registration index.
    #[must_use]
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the registration index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyId").field(&self.0).finish()
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A typed property key.
///
/// The phantom `T` ties bindings and reads to the property's value type, so a
/// `Property<f64>` only accepts `ValueSource<f64>` bindings.
///
/// `Property<T>` is the same size as [`PropertyId`].
pub struct Property<T> {
    id: PropertyId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Property<T> {
    /// Wraps a property ID with its value type.
    ///
    /// The caller must use one value type per ID. Reading a property back with
    /// a different `T` yields `None` rather than a value.
    #[must_use]
    #[inline]
    pub const fn from_id(id: PropertyId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Shorthand for `Property::from_id(PropertyId::new(index))`.
    #[must_use]
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self::from_id(PropertyId::new(index))
    }

    /// Returns the untyped property ID.
    #[must_use]
    #[inline]
    pub const fn id(self) -> PropertyId {
        self.id
    }
}

impl<T> Copy for Property<T> {}

impl<T> Clone for Property<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Property<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Property<T> {}

impl<T> Hash for Property<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.id)
            .field("type", &core::any::type_name::<T>())
            .finish()
    }
}

/// Store-unique identifier of one installed binding entry.
///
/// Replacing a binding at the same tier yields a new `BindingId`, so a stale
/// [`BindingHandle`] never matches the replacement. Ids come from a 64-bit
/// counter and would repeat only after 2^64 bindings on one store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(u64);

impl BindingId {
    #[inline]
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw counter value.
    #[must_use]
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Names one binding installed by [`ValueStore::add_binding`](crate::ValueStore::add_binding).
///
/// Pass it to [`ValueStore::remove_binding`](crate::ValueStore::remove_binding)
/// to take that binding out again.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindingHandle {
    property: PropertyId,
    priority: BindingPriority,
    id: BindingId,
}

impl BindingHandle {
    pub(crate) const fn new(
        property: PropertyId,
        priority: BindingPriority,
        id: BindingId,
    ) -> Self {
        Self {
            property,
            priority,
            id,
        }
    }

    /// The property the binding was added to.
    #[must_use]
    #[inline]
    pub const fn property(self) -> PropertyId {
        self.property
    }

    /// The tier the binding was added at.
    #[must_use]
    #[inline]
    pub const fn priority(self) -> BindingPriority {
        self.priority
    }

    /// The entry identifier.
    #[must_use]
    #[inline]
    pub const fn id(self) -> BindingId {
        self.id
    }
}
