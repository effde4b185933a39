// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for ordered indices.

use thiserror::Error;

/// Errors returned by [`OrderedIndex`](crate::OrderedIndex).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum IndexError {
    /// The host is already a member. Remove it before adding it again.
    #[error("host is already a member of this ordered index")]
    DuplicateItem,
}
