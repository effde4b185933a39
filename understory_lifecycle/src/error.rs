// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for deferred cleanup.

use alloc::string::String;

use thiserror::Error;

/// Failure produced by a [deferred](crate::Collectable::Deferred) collectable.
///
/// A rejected deferred cleanup is reported through `tracing` by the
/// [`Resolver`](crate::Resolver) and then dropped; it is never surfaced to the
/// caller of the disposer that scheduled it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CollectError {
    /// The deferred cleanup settled with a failure instead of a collectable.
    #[error("deferred cleanup rejected: {0}")]
    Rejected(String),
}

impl CollectError {
    /// Build a [`CollectError::Rejected`] from any string-like reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}
