// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value sources and their subscription plumbing.
//!
//! A [`ValueSource<T>`] is a lazy, push-based sequence of values. Nothing
//! happens until the store subscribes to it; from then on the source pushes
//! into the [`BindingObserver<T>`] it was handed, and the store cancels by
//! disposing the returned [`Subscription`].
//!
//! Two ready-made sources are provided:
//!
//! - [`Constant`] delivers one value and completes.
//! - [`Subject`] is a hot, shared source that forwards whatever is pushed into
//!   it to every current subscriber.
//!
//! Closures of the form `FnMut(BindingObserver<T>) -> Subscription` are sources
//! too, which is the easiest way to adapt an existing observable.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::marker::PhantomData;

use crate::entry::ActivationState;
use crate::error::BindingError;
use crate::value::ErasedValue;

/// A push-based sequence of values for one property.
///
/// `subscribe` may push values (or complete) synchronously before it returns;
/// those are handled exactly like later pushes.
///
/// ```rust
/// use understory_binding::{BindingObserver, Subscription, ValueSource};
///
/// struct Countdown(u32);
///
/// impl ValueSource<u32> for Countdown {
///     fn subscribe(&mut self, observer: BindingObserver<u32>) -> Subscription {
///         for n in (0..=self.0).rev() {
///             observer.next(n);
///         }
///         observer.complete();
///         Subscription::empty()
///     }
/// }
/// ```
pub trait ValueSource<T> {
    /// Starts delivering values to `observer`.
    ///
    /// Dropping or disposing the returned subscription must stop delivery.
    fn subscribe(&mut self, observer: BindingObserver<T>) -> Subscription;
}

impl<T, F> ValueSource<T> for F
where
    F: FnMut(BindingObserver<T>) -> Subscription,
{
    #[inline]
    fn subscribe(&mut self, observer: BindingObserver<T>) -> Subscription {
        self(observer)
    }
}

/// The receiving end handed to [`ValueSource::subscribe`].
///
/// Pushes are ignored once the binding has been deactivated, replaced, or has
/// completed, so a source that outlives its subscription cannot leak values
/// into the property.
pub struct BindingObserver<T> {
    state: Rc<ActivationState>,
    _marker: PhantomData<fn(T)>,
}

impl<T: 'static> BindingObserver<T> {
    pub(crate) fn new(state: Rc<ActivationState>) -> Self {
        Self {
            state,
            _marker: PhantomData,
        }
    }

    /// Delivers the next value.
    pub fn next(&self, value: T) {
        self.state.deliver_value(ErasedValue::new(value));
    }

    /// Reports a failure. The binding stops, keeping its last value.
    pub fn error(&self, error: BindingError) {
        self.state.deliver_error(error);
    }

    /// Signals that no more values will follow. The binding keeps its last value.
    pub fn complete(&self) {
        self.state.complete();
    }

    /// Returns `true` while pushes will still be accepted.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state.is_accepting()
    }
}

impl<T> Clone for BindingObserver<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for BindingObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingObserver")
            .field("type", &core::any::type_name::<T>())
            .field("live", &self.state.is_accepting())
            .finish()
    }
}

/// Cancellation handle returned by [`ValueSource::subscribe`].
///
/// Disposing is idempotent, and dropping a subscription disposes it.
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Creates a subscription that runs `dispose` when cancelled.
    #[must_use]
    pub fn new(dispose: impl FnOnce() + 'static) -> Self {
        Self {
            dispose: Some(Box::new(dispose)),
        }
    }

    /// A subscription with nothing to release.
    #[must_use]
    pub fn empty() -> Self {
        Self { dispose: None }
    }

    /// Releases the subscription. Later calls do nothing.
    pub fn dispose(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }

    /// Returns `true` once there is nothing left to release.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.dispose.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A source that delivers a single value and completes.
///
/// [`ValueStore::set_value`](crate::ValueStore::set_value) installs one of these.
#[derive(Clone, Debug, PartialEq)]
pub struct Constant<T>(T);

impl<T> Constant<T> {
    /// Wraps `value`.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    /// Returns the wrapped value.
    #[must_use]
    pub const fn get(&self) -> &T {
        &self.0
    }
}

impl<T: Clone + 'static> ValueSource<T> for Constant<T> {
    fn subscribe(&mut self, observer: BindingObserver<T>) -> Subscription {
        observer.next(self.0.clone());
        observer.complete();
        Subscription::empty()
    }
}

struct SubjectInner<T> {
    observers: Vec<(u64, BindingObserver<T>)>,
    next_token: u64,
    subscribe_count: usize,
}

/// A hot source that forwards pushed values to all current subscribers.
///
/// Clones share the same subscriber list, so one handle can be installed in a
/// store while another keeps pushing.
///
/// ```rust
/// use understory_binding::{BindingPriority, Property, Subject, ValueStore};
///
/// let title: Property<&'static str> = Property::new(0);
/// let subject = Subject::new();
///
/// let mut store = ValueStore::new(1_u32);
/// store.add_binding(title, subject.clone(), BindingPriority::LocalValue);
///
/// subject.next("hello");
/// assert_eq!(store.value(title), Some("hello"));
/// ```
pub struct Subject<T> {
    inner: Rc<RefCell<SubjectInner<T>>>,
}

impl<T: Clone + 'static> Subject<T> {
    /// Creates a subject with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SubjectInner {
                observers: Vec::new(),
                next_token: 0,
                subscribe_count: 0,
            })),
        }
    }

    /// Pushes `value` to every current subscriber.
    pub fn next(&self, value: T) {
        for observer in self.snapshot() {
            observer.next(value.clone());
        }
    }

    /// Pushes `error` to every current subscriber and drops them.
    pub fn error(&self, error: BindingError) {
        for observer in self.take_all() {
            observer.error(error.clone());
        }
    }

    /// Completes every current subscriber and drops them.
    pub fn complete(&self) {
        for observer in self.take_all() {
            observer.complete();
        }
    }

    /// Number of subscribers currently attached.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }

    /// Number of times this subject has been subscribed to, in total.
    #[must_use]
    pub fn subscribe_count(&self) -> usize {
        self.inner.borrow().subscribe_count
    }

    // Observers are called outside the borrow so they may push back into the
    // subject or subscribe to it.
    fn snapshot(&self) -> Vec<BindingObserver<T>> {
        self.inner
            .borrow()
            .observers
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect()
    }

    fn take_all(&self) -> Vec<BindingObserver<T>> {
        let drained = core::mem::take(&mut self.inner.borrow_mut().observers);
        drained.into_iter().map(|(_, observer)| observer).collect()
    }
}

impl<T: Clone + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Subject")
            .field("type", &core::any::type_name::<T>())
            .field("observer_count", &inner.observers.len())
            .field("subscribe_count", &inner.subscribe_count)
            .finish()
    }
}

impl<T: Clone + 'static> ValueSource<T> for Subject<T> {
    fn subscribe(&mut self, observer: BindingObserver<T>) -> Subscription {
        let token = {
            let mut inner = self.inner.borrow_mut();
            let token = inner.next_token;
            inner.next_token += 1;
            inner.subscribe_count += 1;
            inner.observers.push((token, observer));
            token
        };
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .borrow_mut()
                    .observers
                    .retain(|(existing, _)| *existing != token);
            }
        })
    }
}
