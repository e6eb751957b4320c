// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-property binding slots.
//!
//! A [`PropertySlot`] keeps at most one [`BindingEntry`] per tier, sorted by
//! tier. The effective entry is therefore always the first one, and
//! resolution is a lookup rather than a scan.

use alloc::rc::Rc;
use smallvec::SmallVec;

use crate::entry::{BindingEntry, ChangeSink};
use crate::id::{BindingId, PropertyId};
use crate::priority::BindingPriority;
use crate::store::ValueChange;

/// Inline capacity for entries per slot.
///
/// Most properties are bound at one or two tiers.
const INLINE_TIERS: usize = 2;

/// All bindings of one property.
#[derive(Debug)]
pub(crate) struct PropertySlot {
    property: PropertyId,
    entries: SmallVec<[BindingEntry; INLINE_TIERS]>,
    /// The effective entry as of the last settle. Its pushes are what the
    /// change handler has seen.
    tracked: Option<BindingId>,
    /// Tier of the tracked entry if it was dropped while holding a value.
    dropped_shown: Option<BindingPriority>,
}

impl PropertySlot {
    pub(crate) fn new(property: PropertyId) -> Self {
        Self {
            property,
            entries: SmallVec::new(),
            tracked: None,
            dropped_shown: None,
        }
    }

    #[inline]
    pub(crate) fn property(&self) -> PropertyId {
        self.property
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    fn find(&self, priority: BindingPriority) -> Result<usize, usize> {
        self.entries
            .binary_search_by_key(&priority, BindingEntry::priority)
    }

    /// Installs `entry` at its tier.
    ///
    /// An entry already at that tier is dropped first, which releases its
    /// subscription whether or not the new entry is activated later.
    ///
    /// Returns `true` if the new entry is now the effective entry.
    pub(crate) fn install(&mut self, entry: BindingEntry) -> bool {
        let idx = match self.find(entry.priority()) {
            Ok(idx) => {
                let old = core::mem::replace(&mut self.entries[idx], entry);
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    property = %self.property,
                    priority = %old.priority(),
                    binding = old.id().get(),
                    was_subscribed = old.is_subscribed(),
                    "replacing binding"
                );
                self.retire(&old);
                drop(old);
                idx
            }
            Err(idx) => {
                self.entries.insert(idx, entry);
                idx
            }
        };
        idx == 0
    }

    /// Removes the entry at `priority` if it is the binding `id`.
    pub(crate) fn remove(
        &mut self,
        priority: BindingPriority,
        id: BindingId,
    ) -> Option<BindingEntry> {
        let idx = self.find(priority).ok()?;
        if self.entries[idx].id() != id {
            return None;
        }
        let removed = self.entries.remove(idx);
        self.retire(&removed);
        Some(removed)
    }

    fn retire(&mut self, entry: &BindingEntry) {
        if self.tracked == Some(entry.id()) && entry.last_value().is_some() {
            self.dropped_shown = Some(entry.priority());
        }
    }

    /// The entry at the highest-precedence tier present.
    #[inline]
    pub(crate) fn effective_entry(&self) -> Option<&BindingEntry> {
        self.entries.first()
    }

    pub(crate) fn entry(&self, priority: BindingPriority) -> Option<&BindingEntry> {
        self.find(priority).ok().map(|idx| &self.entries[idx])
    }

    /// Tier of the value the change handler currently sees, if any.
    ///
    /// This is the tracked entry's value, or the value it held when it was
    /// replaced or removed since the last settle.
    pub(crate) fn shown_tier(&self) -> Option<BindingPriority> {
        let id = self.tracked?;
        match self.entries.iter().find(|entry| entry.id() == id) {
            Some(entry) => entry.last_value().map(|_| entry.priority()),
            None => self.dropped_shown,
        }
    }

    /// Number of entries holding a live subscription.
    pub(crate) fn subscribed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_subscribed()).count()
    }

    /// Brings subscriptions in line with resolution.
    ///
    /// Every subscribed entry other than the effective one is deactivated, then
    /// the effective entry is activated if it is neither subscribed nor
    /// completed. Returns `true` if a subscription was made.
    ///
    /// When the effective entry has changed since the last settle, `sink` is
    /// told what the property now shows: the held value of a completed entry
    /// that no source will push again, or [`ValueChange::Cleared`] if the
    /// value the handler saw is gone and nothing has replaced it.
    pub(crate) fn settle(&mut self, sink: &Rc<dyn ChangeSink>) -> bool {
        let shown = self.shown_tier();
        let Some((effective, rest)) = self.entries.split_first_mut() else {
            return false;
        };
        for entry in rest {
            entry.deactivate();
        }
        let subscribed = effective.activate(sink);
        if self.tracked != Some(effective.id()) {
            match effective.last_value() {
                // A fresh subscription has already delivered what it pushed.
                Some(value) if !subscribed => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(
                        property = %self.property,
                        priority = %effective.priority(),
                        binding = effective.id().get(),
                        "reporting held value of uncovered binding"
                    );
                    sink.deliver(self.property, effective.priority(), ValueChange::Value(&value));
                }
                Some(_) => {}
                None => {
                    if let Some(priority) = shown {
                        sink.deliver(self.property, priority, ValueChange::Cleared);
                    }
                }
            }
            self.tracked = Some(effective.id());
            self.dropped_shown = None;
        }
        subscribed
    }
}
