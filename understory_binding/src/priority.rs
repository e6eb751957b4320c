// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding priority tiers.

use core::fmt;

use crate::error::ValueStoreError;

/// The tier a binding competes at.
///
/// Tiers are totally ordered by rank; a lower rank wins. The derived `Ord`
/// follows rank, so `min()` over the tiers present for a property gives the
/// effective tier.
///
/// ```rust
/// use understory_binding::BindingPriority;
///
/// assert!(BindingPriority::LocalValue < BindingPriority::Style);
/// assert_eq!(BindingPriority::from_rank(1), Ok(BindingPriority::LocalValue));
/// assert!(BindingPriority::from_rank(42).is_err());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum BindingPriority {
    /// A running animation. Overrides everything else.
    Animation = 0,
    /// A value or binding set directly on the object.
    LocalValue = 1,
    /// A style setter whose selector has an active trigger.
    StyleTrigger = 2,
    /// A binding to the templated parent.
    Template = 3,
    /// A plain style setter.
    Style = 4,
}

impl BindingPriority {
    /// Every tier, highest precedence first.
    pub const ALL: [Self; 5] = [
        Self::Animation,
        Self::LocalValue,
        Self::StyleTrigger,
        Self::Template,
        Self::Style,
    ];

    /// Returns the tier's rank. Lower ranks take precedence.
    #[must_use]
    #[inline]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// Looks up the tier with the given rank.
    ///
    /// # Errors
    ///
    /// Returns [`ValueStoreError::InvalidPriority`] for ranks outside the set.
    pub const fn from_rank(rank: u8) -> Result<Self, ValueStoreError> {
        match rank {
            0 => Ok(Self::Animation),
            1 => Ok(Self::LocalValue),
            2 => Ok(Self::StyleTrigger),
            3 => Ok(Self::Template),
            4 => Ok(Self::Style),
            _ => Err(ValueStoreError::InvalidPriority(rank)),
        }
    }

    /// Returns `true` if `self` takes precedence over `other`.
    #[must_use]
    #[inline]
    pub const fn outranks(self, other: Self) -> bool {
        self.rank() < other.rank()
    }

    /// Short lowercase name, used in diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Animation => "animation",
            Self::LocalValue => "local",
            Self::StyleTrigger => "style-trigger",
            Self::Template => "template",
            Self::Style => "style",
        }
    }
}

impl TryFrom<u8> for BindingPriority {
    type Error = ValueStoreError;

    fn try_from(rank: u8) -> Result<Self, Self::Error> {
        Self::from_rank(rank)
    }
}

impl From<BindingPriority> for u8 {
    fn from(priority: BindingPriority) -> Self {
        priority.rank()
    }
}

impl fmt::Display for BindingPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
