// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding entries and their activation state.
//!
//! A [`BindingEntry`] owns one value source at one tier. While the entry is
//! active it holds an [`ActivationState`], shared with the observer handed to
//! the source. The state records the last delivered value, whether the source
//! has completed, and the live subscription. Each activation gets a fresh
//! state, so an observer left over from an earlier activation is inert.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use core::fmt;
use core::marker::PhantomData;

use crate::error::BindingError;
use crate::id::{BindingId, PropertyId};
use crate::priority::BindingPriority;
use crate::source::{BindingObserver, Subscription, ValueSource};
use crate::store::ValueChange;
use crate::value::ErasedValue;

/// Where an active entry reports pushed values and errors.
pub(crate) trait ChangeSink {
    fn deliver(&self, property: PropertyId, priority: BindingPriority, change: ValueChange<'_>);
}

/// State shared between an active entry and its observer.
pub(crate) struct ActivationState {
    property: PropertyId,
    priority: BindingPriority,
    binding: BindingId,
    sink: Option<Rc<dyn ChangeSink>>,
    live: Cell<bool>,
    completed: Cell<bool>,
    last_value: RefCell<Option<Rc<ErasedValue>>>,
    subscription: RefCell<Option<Subscription>>,
}

impl ActivationState {
    fn new(
        property: PropertyId,
        priority: BindingPriority,
        binding: BindingId,
        sink: Option<Rc<dyn ChangeSink>>,
    ) -> Self {
        Self {
            property,
            priority,
            binding,
            sink,
            live: Cell::new(true),
            completed: Cell::new(false),
            last_value: RefCell::new(None),
            subscription: RefCell::new(None),
        }
    }

    /// A live state with nowhere to report to.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self::new(
            PropertyId::new(0),
            BindingPriority::LocalValue,
            BindingId::new(0),
            None,
        )
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.live.get() && !self.completed.get()
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.completed.get()
    }

    pub(crate) fn last_value(&self) -> Option<Rc<ErasedValue>> {
        self.last_value.borrow().clone()
    }

    #[cfg(test)]
    pub(crate) fn last_value_as<T: Clone + 'static>(&self) -> Option<T> {
        self.last_value
            .borrow()
            .as_deref()
            .and_then(ErasedValue::downcast_ref::<T>)
            .cloned()
    }

    pub(crate) fn deliver_value(&self, value: ErasedValue) {
        if !self.is_accepting() {
            return;
        }
        let value = Rc::new(value);
        // The borrow ends before the sink runs; a handler may push again.
        *self.last_value.borrow_mut() = Some(Rc::clone(&value));
        if let Some(sink) = &self.sink {
            sink.deliver(self.property, self.priority, ValueChange::Value(&value));
        }
    }

    pub(crate) fn deliver_error(&self, error: BindingError) {
        if !self.is_accepting() {
            return;
        }
        self.completed.set(true);
        #[cfg(feature = "tracing")]
        tracing::warn!(
            property = %self.property,
            priority = %self.priority,
            binding = self.binding.get(),
            error = %error,
            "binding source failed"
        );
        if let Some(sink) = &self.sink {
            sink.deliver(self.property, self.priority, ValueChange::Error(&error));
        }
        self.release();
    }

    pub(crate) fn complete(&self) {
        if !self.is_accepting() {
            return;
        }
        self.completed.set(true);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            property = %self.property,
            priority = %self.priority,
            binding = self.binding.get(),
            "binding source completed"
        );
        self.release();
    }

    /// Keeps `subscription` unless the source already finished during subscribe.
    fn attach(&self, subscription: Subscription) {
        if self.is_accepting() {
            *self.subscription.borrow_mut() = Some(subscription);
        }
        // Otherwise `subscription` drops here, which disposes it.
    }

    fn shut_down(&self) {
        self.live.set(false);
        self.release();
    }

    fn release(&self) {
        // Dispose outside the borrow: a source may call back while tearing down.
        let subscription = self.subscription.borrow_mut().take();
        drop(subscription);
    }
}

impl fmt::Debug for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationState")
            .field("property", &self.property)
            .field("priority", &self.priority)
            .field("binding", &self.binding)
            .field("live", &self.live.get())
            .field("completed", &self.completed.get())
            .field("has_value", &self.last_value.borrow().is_some())
            .finish_non_exhaustive()
    }
}

/// A value source with its value type erased.
trait ErasedSource {
    fn subscribe(&mut self, state: Rc<ActivationState>) -> Subscription;
}

struct TypedSource<T, S> {
    source: S,
    _marker: PhantomData<fn(T)>,
}

impl<T: 'static, S: ValueSource<T>> ErasedSource for TypedSource<T, S> {
    fn subscribe(&mut self, state: Rc<ActivationState>) -> Subscription {
        self.source.subscribe(BindingObserver::new(state))
    }
}

/// One value source installed at one tier of a property.
pub(crate) struct BindingEntry {
    id: BindingId,
    property: PropertyId,
    priority: BindingPriority,
    source: Box<dyn ErasedSource>,
    activation: Option<Rc<ActivationState>>,
}

impl BindingEntry {
    pub(crate) fn new<T, S>(
        property: PropertyId,
        priority: BindingPriority,
        id: BindingId,
        source: S,
    ) -> Self
    where
        T: 'static,
        S: ValueSource<T> + 'static,
    {
        Self {
            id,
            property,
            priority,
            source: Box::new(TypedSource {
                source,
                _marker: PhantomData,
            }),
            activation: None,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> BindingId {
        self.id
    }

    #[inline]
    pub(crate) fn priority(&self) -> BindingPriority {
        self.priority
    }

    /// `true` while the store holds a live subscription to the source.
    pub(crate) fn is_subscribed(&self) -> bool {
        self.activation
            .as_ref()
            .is_some_and(|state| state.is_accepting())
    }

    /// `true` once the source has completed or failed.
    pub(crate) fn is_completed(&self) -> bool {
        self.activation
            .as_ref()
            .is_some_and(|state| state.is_completed())
    }

    pub(crate) fn last_value(&self) -> Option<Rc<ErasedValue>> {
        self.activation.as_ref().and_then(|state| state.last_value())
    }

    /// Subscribes to the source unless already subscribed or completed.
    ///
    /// Returns `true` if a subscription was made.
    pub(crate) fn activate(&mut self, sink: &Rc<dyn ChangeSink>) -> bool {
        if self.activation.is_some() {
            return false;
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(
            property = %self.property,
            priority = %self.priority,
            binding = self.id.get(),
            "activating binding"
        );
        let state = Rc::new(ActivationState::new(
            self.property,
            self.priority,
            self.id,
            Some(Rc::clone(sink)),
        ));
        self.activation = Some(Rc::clone(&state));
        let subscription = self.source.subscribe(Rc::clone(&state));
        state.attach(subscription);
        true
    }

    /// Drops the live subscription and its last value.
    ///
    /// Completed entries hold no subscription and keep their final value.
    /// Returns `true` if a subscription was released.
    pub(crate) fn deactivate(&mut self) -> bool {
        if !self.is_subscribed() {
            return false;
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(
            property = %self.property,
            priority = %self.priority,
            binding = self.id.get(),
            "deactivating binding"
        );
        if let Some(state) = self.activation.take() {
            state.shut_down();
        }
        true
    }
}

impl Drop for BindingEntry {
    fn drop(&mut self) {
        if let Some(state) = self.activation.take() {
            state.shut_down();
        }
    }
}

impl fmt::Debug for BindingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingEntry")
            .field("id", &self.id)
            .field("property", &self.property)
            .field("priority", &self.priority)
            .field("subscribed", &self.is_subscribed())
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}
