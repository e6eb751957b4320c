// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! [`ValueStoreError`] reports misuse of the store by the surrounding framework.
//! [`BindingError`] is a failure produced by a value source; it never aborts a
//! store operation and is delivered through the change handler instead.

use alloc::borrow::Cow;
use core::fmt;

/// Misuse of a [`ValueStore`](crate::ValueStore).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueStoreError {
    /// `end_init` was called without a matching `begin_init`.
    UnmatchedEndInit,
    /// A priority rank outside the defined tiers.
    InvalidPriority(u8),
}

impl fmt::Display for ValueStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmatchedEndInit => f.write_str("end_init called without a matching begin_init"),
            Self::InvalidPriority(rank) => write!(f, "{rank} is not a valid binding priority rank"),
        }
    }
}

impl core::error::Error for ValueStoreError {}

/// A failure reported by a value source.
///
/// ```rust
/// use understory_binding::BindingError;
///
/// let err = BindingError::new("path not found");
/// assert_eq!(err.message(), "path not found");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingError {
    message: Cow<'static, str>,
}

impl BindingError {
    /// Creates an error with the given message.
    #[must_use]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding error: {}", self.message)
    }
}

impl core::error::Error for BindingError {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::String;

    #[test]
    fn store_error_display() {
        assert_eq!(
            format!("{}", ValueStoreError::UnmatchedEndInit),
            "end_init called without a matching begin_init"
        );
        assert_eq!(
            format!("{}", ValueStoreError::InvalidPriority(9)),
            "9 is not a valid binding priority rank"
        );
    }

    #[test]
    fn binding_error_accepts_owned_and_static_messages() {
        let a = BindingError::new("boom");
        let b = BindingError::new(String::from("boom"));
        assert_eq!(a, b);
        assert_eq!(format!("{a}"), "binding error: boom");
    }
}
