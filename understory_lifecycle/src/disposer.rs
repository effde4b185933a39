// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-shot cleanup handles.

use alloc::boxed::Box;
use core::fmt;

use crate::collectable::Collectable;

/// A zero-argument cleanup action that runs at most once.
///
/// Every teardown handle produced by this crate (and by `understory_roving`)
/// is a `Disposer`: the one returned by [`Lifecycle::run`](crate::Lifecycle::run),
/// the unsubscribe handle of an [`Observable`](crate::Observable), and the
/// membership handle of an ordered index.
///
/// Disposal is explicit. Dropping a disposer that was never run does not run
/// it; hand it to a [`Resolver`](crate::Resolver) (it converts into a
/// [`Collectable`]) or call [`Disposer::dispose`].
///
/// Calling [`Disposer::dispose`] more than once is safe: only the first call
/// runs the action.
#[must_use = "a disposer does nothing unless it is disposed or handed to a resolver"]
pub struct Disposer {
    action: Option<Box<dyn FnOnce()>>,
}

impl Disposer {
    /// Wrap a cleanup action.
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: Some(Box::new(action)),
        }
    }

    /// A disposer with nothing to do. It reports itself as already disposed.
    pub fn noop() -> Self {
        Self { action: None }
    }

    /// Run the cleanup action if it has not run yet.
    ///
    /// Returns `true` if this call ran the action.
    pub fn dispose(&mut self) -> bool {
        match self.action.take() {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    /// Returns `true` once the action has run (or if there never was one).
    pub fn is_disposed(&self) -> bool {
        self.action.is_none()
    }
}

impl Default for Disposer {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl From<Disposer> for Collectable {
    fn from(disposer: Disposer) -> Self {
        match disposer.action {
            Some(action) => Self::Callback(Box::new(move || {
                action();
                Self::None
            })),
            None => Self::None,
        }
    }
}
