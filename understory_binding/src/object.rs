// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding object traits.
//!
//! This module provides the [`BindingObject`] trait for objects that own a
//! [`ValueStore`], and [`BindingObjectExt`] for binding and reading properties
//! directly on the object.

use crate::error::ValueStoreError;
use crate::id::{BindingHandle, Property};
use crate::priority::BindingPriority;
use crate::source::ValueSource;
use crate::store::ValueStore;

/// A trait for objects whose properties are driven by bindings.
///
/// # Example
///
/// ```rust
/// use understory_binding::{BindingObject, ValueStore};
///
/// struct Button {
///     bindings: ValueStore<u32>,
/// }
///
/// impl BindingObject<u32> for Button {
///     fn binding_store(&self) -> &ValueStore<u32> {
///         &self.bindings
///     }
///
///     fn binding_store_mut(&mut self) -> &mut ValueStore<u32> {
///         &mut self.bindings
///     }
/// }
/// ```
pub trait BindingObject<K: Copy + Eq + 'static> {
    /// Returns a reference to the object's binding store.
    fn binding_store(&self) -> &ValueStore<K>;

    /// Returns a mutable reference to the object's binding store.
    fn binding_store_mut(&mut self) -> &mut ValueStore<K>;

    /// Returns the key that identifies this object.
    fn key(&self) -> K {
        self.binding_store().owner()
    }
}

/// Extension methods for [`BindingObject`].
pub trait BindingObjectExt<K: Copy + Eq + 'static>: BindingObject<K> {
    /// Binds `property` to `source` at `priority`.
    ///
    /// See [`ValueStore::add_binding`].
    fn bind<T, S>(
        &mut self,
        property: Property<T>,
        source: S,
        priority: BindingPriority,
    ) -> BindingHandle
    where
        T: 'static,
        S: ValueSource<T> + 'static,
    {
        self.binding_store_mut()
            .add_binding(property, source, priority)
    }

    /// Sets a local value.
    fn set_local<T: Clone + 'static>(&mut self, property: Property<T>, value: T) -> BindingHandle {
        self.binding_store_mut()
            .set_value(property, value, BindingPriority::LocalValue)
    }

    /// Gets the effective value of `property`.
    ///
    /// Returns `None` until the effective binding has delivered a value.
    fn get<T: Clone + 'static>(&self, property: Property<T>) -> Option<T> {
        self.binding_store().value(property)
    }

    /// Enters the construction window.
    fn begin_init(&mut self) {
        self.binding_store_mut().begin_init();
    }

    /// Leaves the construction window.
    ///
    /// # Errors
    ///
    /// Returns [`ValueStoreError::UnmatchedEndInit`] if no window is open.
    fn end_init(&mut self) -> Result<(), ValueStoreError> {
        self.binding_store_mut().end_init()
    }

    /// Runs `build` inside one construction window.
    ///
    /// Bindings made by `build` are activated once it returns. If `build`
    /// already closed the window with [`end_init`](Self::end_init), nothing
    /// more happens; a `warn!` is emitted with the `tracing` feature.
    ///
    /// ```rust
    /// use understory_binding::{
    ///     BindingObject, BindingObjectExt, BindingPriority, Property, Subject, ValueStore,
    /// };
    ///
    /// struct Label { bindings: ValueStore<u32> }
    /// impl BindingObject<u32> for Label {
    ///     fn binding_store(&self) -> &ValueStore<u32> { &self.bindings }
    ///     fn binding_store_mut(&mut self) -> &mut ValueStore<u32> { &mut self.bindings }
    /// }
    ///
    /// let text: Property<String> = Property::new(0);
    /// let themed = Subject::new();
    /// let mut label = Label { bindings: ValueStore::new(4) };
    ///
    /// label.with_init(|label| {
    ///     label.bind(text, themed.clone(), BindingPriority::Style);
    ///     label.set_local(text, String::from("OK"));
    /// });
    ///
    /// assert_eq!(label.get(text).as_deref(), Some("OK"));
    /// assert_eq!(themed.subscribe_count(), 0);
    /// ```
    fn with_init<R>(&mut self, build: impl FnOnce(&mut Self) -> R) -> R {
        self.binding_store_mut().begin_init();
        let result = build(self);
        if let Err(_err) = self.binding_store_mut().end_init() {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_err, "construction window closed inside with_init");
        }
        result
    }
}

impl<K: Copy + Eq + 'static, O: BindingObject<K> + ?Sized> BindingObjectExt<K> for O {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Subject;

    const WIDTH: Property<f64> = Property::new(0);
    const HEIGHT: Property<f64> = Property::new(1);

    struct Element {
        bindings: ValueStore<u32>,
    }

    impl Element {
        fn new(key: u32) -> Self {
            Self {
                bindings: ValueStore::new(key),
            }
        }
    }

    impl BindingObject<u32> for Element {
        fn binding_store(&self) -> &ValueStore<u32> {
            &self.bindings
        }

        fn binding_store_mut(&mut self) -> &mut ValueStore<u32> {
            &mut self.bindings
        }
    }

    #[test]
    fn key_comes_from_the_store() {
        let element = Element::new(11);
        assert_eq!(element.key(), 11);
    }

    #[test]
    fn bind_and_get() {
        let mut element = Element::new(1);
        let animated = Subject::new();
        element.set_local(WIDTH, 10.0);
        element.bind(WIDTH, animated.clone(), BindingPriority::Animation);

        assert_eq!(element.get(WIDTH), None);
        animated.next(12.5);
        assert_eq!(element.get(WIDTH), Some(12.5));
        assert_eq!(element.get(HEIGHT), None);
    }

    #[test]
    fn with_init_defers_activation() {
        let mut element = Element::new(1);
        let first = Subject::new();
        let second = Subject::new();

        let handle = element.with_init(|element| {
            element.bind(HEIGHT, first.clone(), BindingPriority::Template);
            let handle = element.bind(HEIGHT, second.clone(), BindingPriority::Template);
            assert!(element.binding_store().is_initializing());
            assert_eq!(second.subscribe_count(), 0);
            handle
        });

        assert!(!element.binding_store().is_initializing());
        assert_eq!(first.subscribe_count(), 0);
        assert_eq!(second.subscribe_count(), 1);
        assert!(element.binding_store_mut().remove_binding(handle));
        assert_eq!(second.observer_count(), 0);
    }

    #[test]
    fn with_init_survives_an_early_end_init() {
        let mut element = Element::new(1);
        let width = element.with_init(|element| {
            element.set_local(WIDTH, 2.0);
            element.end_init().unwrap();
            element.get(WIDTH)
        });
        assert_eq!(width, Some(2.0));
        assert!(!element.binding_store().is_initializing());
    }

    #[test]
    fn explicit_init_window() {
        let mut element = Element::new(1);
        element.begin_init();
        element.set_local(WIDTH, 3.0);
        assert_eq!(element.get(WIDTH), None);
        assert_eq!(element.end_init(), Ok(()));
        assert_eq!(element.get(WIDTH), Some(3.0));
        assert_eq!(element.end_init(), Err(ValueStoreError::UnmatchedEndInit));
    }
}
