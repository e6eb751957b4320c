// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Type-erased delivered values.

use alloc::boxed::Box;
use core::any::{Any, TypeId};
use core::fmt;

/// A value delivered by a binding, with its concrete type erased.
///
/// Binding entries for different properties live side by side in one store, so
/// the last delivered value is kept behind `dyn Any` and downcast on read.
///
/// ```rust
/// use understory_binding::ErasedValue;
///
/// let value = ErasedValue::new(42_i32);
/// assert!(value.is::<i32>());
/// assert_eq!(value.downcast_ref::<i32>(), Some(&42));
/// assert_eq!(value.downcast_ref::<u8>(), None);
/// ```
pub struct ErasedValue {
    inner: Box<dyn Any>,
    type_name: &'static str,
}

impl ErasedValue {
    /// Erases a concrete value.
    #[must_use]
    pub fn new<T: 'static>(value: T) -> Self {
        Self {
            inner: Box::new(value),
            type_name: core::any::type_name::<T>(),
        }
    }

    /// Returns the [`TypeId`] of the contained value.
    #[must_use]
    #[inline]
    pub fn value_type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// Returns the name of the contained type, for diagnostics.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the contained value is a `T`.
    #[must_use]
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Borrows the contained value as a `T`, if it is one.
    #[must_use]
    #[inline]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Recovers the contained value as a `T`.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged if the value is not a `T`.
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        self.inner
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|inner| Self { inner, type_name })
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedValue")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}
