// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-object binding storage and activation policy.
//!
//! [`ValueStore`] owns one slot per bound property and decides when each
//! binding is subscribed:
//!
//! - While the store is live, a binding is subscribed as soon as it becomes
//!   the effective binding for its property, and whatever it supersedes is
//!   unsubscribed first.
//! - Between [`begin_init`](ValueStore::begin_init) and the matching
//!   [`end_init`](ValueStore::end_init), nothing is subscribed. When the
//!   outermost `end_init` runs, each property's effective binding is
//!   subscribed exactly once.
//!
//! # Implementation
//!
//! Slots live in a `SmallVec` sorted by [`PropertyId`] and are found by binary
//! search, the same `vector_map` layout `WinUI` uses for its property storage.
//! Objects typically bind a handful of properties, so the common case stays
//! inline.

use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use smallvec::SmallVec;

use crate::entry::{BindingEntry, ChangeSink};
use crate::error::{BindingError, ValueStoreError};
use crate::id::{BindingHandle, BindingId, Property, PropertyId};
use crate::priority::BindingPriority;
use crate::slot::PropertySlot;
use crate::source::{Constant, ValueSource};
use crate::value::ErasedValue;

/// Inline capacity for property slots.
const INLINE_SLOTS: usize = 8;

/// What changed about a property's effective value.
#[derive(Copy, Clone, Debug)]
pub enum ValueChange<'a> {
    /// A new value, pushed by the effective binding or held by a completed
    /// binding that became effective again.
    Value(&'a ErasedValue),
    /// The source failed. The property keeps its last value.
    Error(&'a BindingError),
    /// The value last reported is gone and the property shows none until the
    /// effective binding pushes.
    Cleared,
}

impl<'a> ValueChange<'a> {
    /// The pushed value as a `T`, if this is a value of that type.
    #[must_use]
    pub fn value<T: 'static>(&self) -> Option<&'a T> {
        match *self {
            Self::Value(value) => value.downcast_ref(),
            Self::Error(_) | Self::Cleared => None,
        }
    }

    /// The reported error, if this is one.
    #[must_use]
    pub fn error(&self) -> Option<&'a BindingError> {
        match *self {
            Self::Value(_) | Self::Cleared => None,
            Self::Error(error) => Some(error),
        }
    }
}

/// Notification that a property's effective value changed or its effective
/// binding failed.
#[derive(Copy, Clone, Debug)]
pub struct PropertyChange<'a, K> {
    /// The object that owns the store.
    pub owner: K,
    /// The property whose effective value changed.
    pub property: PropertyId,
    /// The tier of the binding that pushed, or for
    /// [`Cleared`](ValueChange::Cleared), the tier whose value went away.
    pub priority: BindingPriority,
    /// What changed.
    pub change: ValueChange<'a>,
}

type ChangeHandler<K> = Rc<dyn Fn(&PropertyChange<'_, K>)>;

/// The notification channel shared by all active bindings of one store.
struct ChangeChannel<K> {
    owner: K,
    handler: RefCell<Option<ChangeHandler<K>>>,
}

impl<K: Copy> ChangeSink for ChangeChannel<K> {
    fn deliver(&self, property: PropertyId, priority: BindingPriority, change: ValueChange<'_>) {
        // Clone the handler out so it may replace itself while running.
        let handler = self.handler.borrow().clone();
        if let Some(handler) = handler {
            handler(&PropertyChange {
                owner: self.owner,
                property,
                priority,
                change,
            });
        }
    }
}

/// Per-object prioritized binding storage.
///
/// Each property can have one binding per [`BindingPriority`] tier. The
/// binding at the highest-precedence tier present is the *effective* binding;
/// it alone is subscribed, and its last pushed value is the property's value.
///
/// # Deferred activation
///
/// Bulk construction is bracketed with [`begin_init`](Self::begin_init) and
/// [`end_init`](Self::end_init) (or [`init_scope`](Self::init_scope)). Bindings
/// added inside the bracket are not subscribed until the outermost `end_init`,
/// so a binding replaced during construction is never subscribed at all.
/// Brackets nest.
///
/// # Teardown
///
/// Dropping the store, or calling [`dispose`](Self::dispose), releases every
/// subscription it holds.
///
/// # Threading
///
/// The store, its sources, and its change handler belong to one thread. It is
/// neither `Send` nor `Sync`.
///
/// # Example
///
/// ```rust
/// use understory_binding::{BindingPriority, Property, Subject, ValueStore};
///
/// let width: Property<f64> = Property::new(0);
/// let style = Subject::new();
/// let local = Subject::new();
///
/// let mut store = ValueStore::new(1_u32);
/// store.begin_init();
/// store.add_binding(width, style.clone(), BindingPriority::Style);
/// store.add_binding(width, local.clone(), BindingPriority::LocalValue);
/// assert_eq!(local.subscribe_count(), 0);
/// store.end_init().unwrap();
///
/// // Only the local binding was subscribed.
/// assert_eq!(local.subscribe_count(), 1);
/// assert_eq!(style.subscribe_count(), 0);
///
/// local.next(120.0);
/// assert_eq!(store.value(width), Some(120.0));
/// ```
pub struct ValueStore<K: Copy + Eq + 'static> {
    /// Slots sorted by [`PropertyId`].
    slots: SmallVec<[PropertySlot; INLINE_SLOTS]>,
    /// Nesting depth of `begin_init`/`end_init`. Zero means live.
    init_depth: u32,
    /// Wraps only after 2^64 bindings, so handles never alias in practice.
    next_binding: u64,
    channel: Rc<ChangeChannel<K>>,
}

impl<K: Copy + Eq + 'static> ValueStore<K> {
    /// Creates an empty, live store for the given owner key.
    #[must_use]
    pub fn new(owner: K) -> Self {
        Self {
            slots: SmallVec::new(),
            init_depth: 0,
            next_binding: 0,
            channel: Rc::new(ChangeChannel {
                owner,
                handler: RefCell::new(None),
            }),
        }
    }

    /// Returns the owner key.
    #[must_use]
    #[inline]
    pub fn owner(&self) -> K {
        self.channel.owner
    }

    /// Returns `true` if no property has a binding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the number of properties with at least one binding.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns the bound properties in ascending ID order.
    pub fn property_ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.slots.iter().map(PropertySlot::property)
    }

    /// Sets the handler called whenever a property's effective value changes.
    ///
    /// The handler sees every value or error the effective binding pushes. When
    /// a removal or supersede changes the effective binding, it also sees the
    /// value a completed binding holds, or [`ValueChange::Cleared`] if the
    /// property no longer has one. Changes made inside a construction window
    /// are reported when the outermost window closes. [`dispose`](Self::dispose)
    /// reports nothing.
    pub fn set_change_handler(&mut self, handler: impl Fn(&PropertyChange<'_, K>) + 'static) {
        *self.channel.handler.borrow_mut() = Some(Rc::new(handler));
    }

    /// Removes the change handler.
    pub fn clear_change_handler(&mut self) {
        self.channel.handler.borrow_mut().take();
    }

    #[inline]
    fn find_slot(&self, id: PropertyId) -> Result<usize, usize> {
        self.slots.binary_search_by_key(&id, PropertySlot::property)
    }

    fn slot(&self, id: PropertyId) -> Option<&PropertySlot> {
        self.find_slot(id).ok().map(|idx| &self.slots[idx])
    }

    fn slot_index_or_insert(&mut self, id: PropertyId) -> usize {
        match self.find_slot(id) {
            Ok(idx) => idx,
            Err(idx) => {
                self.slots.insert(idx, PropertySlot::new(id));
                idx
            }
        }
    }

    fn sink(&self) -> Rc<dyn ChangeSink> {
        self.channel.clone()
    }

    fn allocate_id(&mut self) -> BindingId {
        let id = BindingId::new(self.next_binding);
        self.next_binding = self.next_binding.wrapping_add(1);
        id
    }

    // =========================================================================
    // Bindings
    // =========================================================================

    /// Adds a binding for `property` at `priority`.
    ///
    /// A binding already at that tier is discarded first, releasing its
    /// subscription. If the store is live and the new binding is now the
    /// effective one, whatever was subscribed for the property is unsubscribed
    /// and the new binding is subscribed; a binding that is not effective stays
    /// dormant. While initializing, nothing is subscribed.
    ///
    /// The returned handle can be passed to [`remove_binding`](Self::remove_binding).
    pub fn add_binding<T, S>(
        &mut self,
        property: Property<T>,
        source: S,
        priority: BindingPriority,
    ) -> BindingHandle
    where
        T: 'static,
        S: ValueSource<T> + 'static,
    {
        let id = self.allocate_id();
        let entry = BindingEntry::new(property.id(), priority, id, source);
        let deferred = self.is_initializing();
        let sink = self.sink();
        let idx = self.slot_index_or_insert(property.id());
        let slot = &mut self.slots[idx];
        let is_effective = slot.install(entry);

        #[cfg(feature = "tracing")]
        tracing::trace!(
            property = %property.id(),
            priority = %priority,
            binding = id.get(),
            is_effective,
            deferred,
            "binding added"
        );

        if is_effective && !deferred {
            slot.settle(&sink);
        }
        BindingHandle::new(property.id(), priority, id)
    }

    /// Binds `property` to a constant at `priority`.
    ///
    /// The value becomes visible the way any binding's would: immediately if
    /// live and effective, at `end_init` if initializing.
    pub fn set_value<T: Clone + 'static>(
        &mut self,
        property: Property<T>,
        value: T,
        priority: BindingPriority,
    ) -> BindingHandle {
        self.add_binding(property, Constant::new(value), priority)
    }

    /// Removes the binding `handle` names, if it is still installed.
    ///
    /// Returns `false` if the binding was already replaced or removed. When the
    /// removed binding was effective and the store is live, the next binding in
    /// precedence order is subscribed. Removing a property's last binding
    /// reports [`ValueChange::Cleared`] if its value had been reported.
    pub fn remove_binding(&mut self, handle: BindingHandle) -> bool {
        let Ok(idx) = self.find_slot(handle.property()) else {
            return false;
        };
        let Some(removed) = self.slots[idx].remove(handle.priority(), handle.id()) else {
            return false;
        };
        drop(removed);

        #[cfg(feature = "tracing")]
        tracing::trace!(
            property = %handle.property(),
            priority = %handle.priority(),
            binding = handle.id().get(),
            "binding removed"
        );

        if self.slots[idx].is_empty() {
            let slot = self.slots.remove(idx);
            self.report_cleared(slot);
        } else if !self.is_initializing() {
            let sink = self.sink();
            self.slots[idx].settle(&sink);
        }
        true
    }

    /// Removes every binding of `property`.
    ///
    /// Returns `true` if there was anything to remove. Reports
    /// [`ValueChange::Cleared`] if the property's value had been reported.
    pub fn clear_property<T>(&mut self, property: Property<T>) -> bool {
        match self.find_slot(property.id()) {
            Ok(idx) => {
                let slot = self.slots.remove(idx);
                self.report_cleared(slot);
                true
            }
            Err(_) => false,
        }
    }

    /// Drops a removed slot, then reports its shown value as gone.
    fn report_cleared(&self, slot: PropertySlot) {
        let property = slot.property();
        let shown = slot.shown_tier();
        drop(slot);
        if let Some(priority) = shown {
            self.channel.deliver(property, priority, ValueChange::Cleared);
        }
    }

    /// Releases every binding and subscription. Idempotent.
    ///
    /// No change notifications are sent.
    pub fn dispose(&mut self) {
        #[cfg(feature = "tracing")]
        if !self.slots.is_empty() {
            tracing::debug!(slots = self.slots.len(), "disposing value store");
        }
        self.slots.clear();
    }

    // =========================================================================
    // Initialization gate
    // =========================================================================

    /// Enters the construction window. Calls nest.
    pub fn begin_init(&mut self) {
        self.init_depth = self.init_depth.saturating_add(1);
        #[cfg(feature = "tracing")]
        tracing::trace!(depth = self.init_depth, "begin_init");
    }

    /// Leaves the construction window.
    ///
    /// When the outermost window closes, every property's effective binding is
    /// subscribed if it is not already, and any other binding still subscribed
    /// is unsubscribed before that. Properties are visited in ID order.
    ///
    /// # Errors
    ///
    /// Returns [`ValueStoreError::UnmatchedEndInit`] if there is no open window.
    /// The store is left unchanged.
    pub fn end_init(&mut self) -> Result<(), ValueStoreError> {
        if self.init_depth == 0 {
            #[cfg(feature = "tracing")]
            tracing::warn!("end_init called without a matching begin_init");
            return Err(ValueStoreError::UnmatchedEndInit);
        }
        self.init_depth -= 1;
        #[cfg(feature = "tracing")]
        tracing::trace!(depth = self.init_depth, "end_init");

        if self.init_depth == 0 {
            let sink = self.sink();
            for slot in &mut self.slots {
                slot.settle(&sink);
            }
        }
        Ok(())
    }

    /// Returns `true` inside a construction window.
    #[must_use]
    #[inline]
    pub fn is_initializing(&self) -> bool {
        self.init_depth > 0
    }

    /// Opens a construction window that closes when the returned guard drops.
    ///
    /// ```rust
    /// use understory_binding::{BindingPriority, Property, ValueStore};
    ///
    /// let title: Property<&'static str> = Property::new(3);
    /// let mut store = ValueStore::new(0_u32);
    /// {
    ///     let mut init = store.init_scope();
    ///     init.set_value(title, "draft", BindingPriority::LocalValue);
    ///     init.set_value(title, "final", BindingPriority::LocalValue);
    ///     assert_eq!(init.value(title), None);
    /// }
    /// assert_eq!(store.value(title), Some("final"));
    /// ```
    ///
    /// If the window was already closed with an explicit
    /// [`end_init`](Self::end_init) inside the scope, dropping the guard does
    /// nothing further and emits a `warn!` with the `tracing` feature.
    #[must_use = "the window closes when the scope is dropped"]
    pub fn init_scope(&mut self) -> InitScope<'_, K> {
        self.begin_init();
        InitScope { store: self }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns the last value pushed by the effective binding of `property`.
    ///
    /// `None` if the property has no binding, or its effective binding has not
    /// been subscribed or has not pushed yet.
    #[must_use]
    pub fn value<T: Clone + 'static>(&self, property: Property<T>) -> Option<T> {
        self.slot(property.id())?
            .effective_entry()?
            .last_value()?
            .downcast_ref::<T>()
            .cloned()
    }

    /// Returns the tier of the effective binding of `property`.
    #[must_use]
    pub fn effective_priority<T>(&self, property: Property<T>) -> Option<BindingPriority> {
        self.slot(property.id())?
            .effective_entry()
            .map(BindingEntry::priority)
    }

    /// Returns `true` if `property` has a binding at `priority`.
    #[must_use]
    pub fn has_binding<T>(&self, property: Property<T>, priority: BindingPriority) -> bool {
        self.slot(property.id())
            .is_some_and(|slot| slot.entry(priority).is_some())
    }

    /// Returns `true` if the binding of `property` at `priority` is subscribed.
    #[must_use]
    pub fn is_active<T>(&self, property: Property<T>, priority: BindingPriority) -> bool {
        self.slot(property.id())
            .and_then(|slot| slot.entry(priority))
            .is_some_and(BindingEntry::is_subscribed)
    }

    /// Returns the number of bindings installed for `property`.
    #[must_use]
    pub fn binding_count<T>(&self, property: Property<T>) -> usize {
        self.slot(property.id()).map_or(0, PropertySlot::len)
    }

    /// Returns the number of live subscriptions across all properties.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.slots.iter().map(PropertySlot::subscribed_count).sum()
    }
}

impl<K: Copy + Eq + fmt::Debug + 'static> fmt::Debug for ValueStore<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueStore")
            .field("owner", &self.channel.owner)
            .field("slots", &self.slots)
            .field("init_depth", &self.init_depth)
            .field("next_binding", &self.next_binding)
            .field(
                "has_change_handler",
                &self.channel.handler.borrow().is_some(),
            )
            .finish()
    }
}

/// An open construction window on a [`ValueStore`].
///
/// Created by [`ValueStore::init_scope`]. Dereferences to the store; dropping
/// the guard calls [`ValueStore::end_init`].
pub struct InitScope<'a, K: Copy + Eq + 'static> {
    store: &'a mut ValueStore<K>,
}

impl<K: Copy + Eq + 'static> Deref for InitScope<'_, K> {
    type Target = ValueStore<K>;

    fn deref(&self) -> &Self::Target {
        self.store
    }
}

impl<K: Copy + Eq + 'static> DerefMut for InitScope<'_, K> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.store
    }
}

impl<K: Copy + Eq + 'static> Drop for InitScope<'_, K> {
    fn drop(&mut self) {
        if let Err(_err) = self.store.end_init() {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_err, "init scope dropped after its window was closed");
        }
    }
}

impl<K: Copy + Eq + fmt::Debug + 'static> fmt::Debug for InitScope<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InitScope").field(&self.store).finish()
    }
}
