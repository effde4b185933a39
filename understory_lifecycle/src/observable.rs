// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Observable values and a small publish-on-change signal.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use core::fmt;

use smallvec::SmallVec;
use tracing::trace;

use crate::disposer::Disposer;

/// A value that can be read and watched for changes.
///
/// This is the seam widgets use to wire state (disabled, open, selected,
/// item indices) between a parent and its children without depending on a
/// particular reactivity framework.
pub trait Observable<T> {
    /// Read the current value.
    fn get(&self) -> T;

    /// Call `on_change` with the new value after every change.
    ///
    /// The callback is not called for the current value. Dispose the returned
    /// handle to unsubscribe.
    fn subscribe(&self, on_change: Box<dyn FnMut(&T)>) -> Disposer;
}

/// An [`Observable`] that can also be written.
pub trait Writable<T>: Observable<T> {
    /// Replace the value, notifying subscribers if it changed.
    fn set(&self, value: T);

    /// Replace the value with `f(current)`.
    fn update(&self, f: impl FnOnce(&T) -> T)
    where
        Self: Sized,
    {
        let next = f(&self.get());
        self.set(next);
    }
}

type Subscriber<T> = Rc<RefCell<Box<dyn FnMut(&T)>>>;

struct Shared<T> {
    value: RefCell<T>,
    subscribers: RefCell<SmallVec<[(u64, Subscriber<T>); 2]>>,
    next_id: Cell<u64>,
    /// bumped on every change; a notification pass stops once it is stale
    version: Cell<u64>,
}

/// A shared, single-threaded value that notifies subscribers when it changes.
///
/// Clones share the same value and subscriber list.
///
/// Notification rules:
/// - [`Writable::set`] only notifies when the new value differs (`PartialEq`).
/// - Subscribers run in subscription order, each with a snapshot of the new value.
/// - A subscriber added during a notification is not called for it; one removed
///   during a notification is not called after its removal.
/// - A subscriber that is still running is not re-entered by a nested `set`;
///   it sees the latest value on the next change.
/// - A nested `set` ends the outer notification: subscribers that had not been
///   called yet receive only the newer value, never the superseded one.
///
/// Subscribers that capture a clone of the same signal keep it alive; dispose
/// the subscription to break the cycle.
///
/// ```rust
/// use understory_lifecycle::{Observable, Signal, Writable};
///
/// let open = Signal::new(false);
/// let mut sub = open.subscribe(Box::new(|v: &bool| assert!(*v)));
/// open.set(true);
/// open.set(true); // unchanged, no notification
/// sub.dispose();
/// assert_eq!(open.subscriber_count(), 0);
/// ```
pub struct Signal<T> {
    shared: Rc<Shared<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &*self.shared.value.borrow())
            .field("subscribers", &self.shared.subscribers.borrow().len())
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    /// Create a signal holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            shared: Rc::new(Shared {
                value: RefCell::new(value),
                subscribers: RefCell::new(SmallVec::new()),
                next_id: Cell::new(0),
                version: Cell::new(0),
            }),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.borrow().len()
    }

    /// Returns `true` if both handles refer to the same signal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    fn notify(&self) {
        let snapshot: SmallVec<[(u64, Subscriber<T>); 4]> = self
            .shared
            .subscribers
            .borrow()
            .iter()
            .map(|(id, s)| (*id, s.clone()))
            .collect();
        let value = self.shared.value.borrow().clone();
        let version = self.shared.version.get();
        for (id, subscriber) in snapshot {
            if self.shared.version.get() != version {
                // A nested `set` already delivered a newer value to the rest.
                trace!(subscriber = id, "value superseded, ending notification");
                break;
            }
            let live = self
                .shared
                .subscribers
                .borrow()
                .iter()
                .any(|(sid, _)| *sid == id);
            if !live {
                continue;
            }
            match subscriber.try_borrow_mut() {
                Ok(mut on_change) => on_change(&value),
                Err(_) => trace!(subscriber = id, "skipping re-entrant notification"),
            }
        }
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> for Signal<T> {
    fn get(&self) -> T {
        self.shared.value.borrow().clone()
    }

    fn subscribe(&self, on_change: Box<dyn FnMut(&T)>) -> Disposer {
        let id = self.shared.next_id.get();
        self.shared.next_id.set(id + 1);
        self.shared
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(RefCell::new(on_change))));
        let shared = Rc::downgrade(&self.shared);
        Disposer::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.subscribers.borrow_mut().retain(|(sid, _)| *sid != id);
            }
        })
    }
}

impl<T: Clone + PartialEq + 'static> Writable<T> for Signal<T> {
    fn set(&self, value: T) {
        let changed = {
            let mut current = self.shared.value.borrow_mut();
            if *current == value {
                false
            } else {
                *current = value;
                self.shared.version.set(self.shared.version.get().wrapping_add(1));
                true
            }
        };
        if changed {
            self.notify();
        }
    }
}
