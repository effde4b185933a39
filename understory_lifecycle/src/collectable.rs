// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collectables and the resolver that fires them.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::future::Future;
use core::pin::Pin;

use futures_task::{LocalFutureObj, LocalSpawn};
use tracing::{error, trace, warn};

use crate::error::CollectError;

/// A boxed future that eventually yields more cleanup (or fails).
pub type DeferredCollectable = Pin<Box<dyn Future<Output = Result<Collectable, CollectError>>>>;

/// An object that owns cleanup and can give it up on request.
///
/// This is the carrier shape of [`Collectable`]: resolving a carrier resolves
/// whatever [`Carrier::into_destroy`] hands back instead of the carrier itself.
pub trait Carrier {
    /// Consume the carrier and return the cleanup it owns.
    fn into_destroy(self: Box<Self>) -> Collectable;
}

/// Zero or more pending cleanup actions, possibly nested.
///
/// Every reachable [`Collectable::Callback`] fires exactly once when the value
/// is passed to [`Resolver::resolve`]. Callbacks are `FnOnce` and the type is
/// not `Clone`, so a single value cannot fire a leaf twice.
pub enum Collectable {
    /// Nothing to clean up.
    None,
    /// Run the callback, then resolve whatever it returns.
    Callback(Box<dyn FnOnce() -> Collectable>),
    /// Resolve the eventual output once the future settles successfully.
    Deferred(DeferredCollectable),
    /// Resolve every element; siblings do not affect each other.
    Sequence(Vec<Collectable>),
    /// Resolve the carrier's destroy value.
    Carrier(Box<dyn Carrier>),
}

impl Collectable {
    /// A callback leaf. The closure's return value is resolved after it runs.
    pub fn callback<F, R>(f: F) -> Self
    where
        F: FnOnce() -> R + 'static,
        R: Into<Self>,
    {
        Self::Callback(Box::new(move || f().into()))
    }

    /// A deferred branch from any future producing more cleanup.
    pub fn deferred<F, R>(future: F) -> Self
    where
        F: Future<Output = Result<R, CollectError>> + 'static,
        R: Into<Self>,
    {
        Self::Deferred(Box::pin(async move { future.await.map(Into::into) }))
    }

    /// A carrier branch.
    pub fn carrier(carrier: impl Carrier + 'static) -> Self {
        Self::Carrier(Box::new(carrier))
    }

    /// Returns `true` for [`Collectable::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl Default for Collectable {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Debug for Collectable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
            Self::Sequence(items) => f.debug_tuple("Sequence").field(items).finish(),
            Self::Carrier(_) => f.write_str("Carrier(..)"),
        }
    }
}

impl From<()> for Collectable {
    fn from((): ()) -> Self {
        Self::None
    }
}

// Booleans show up where a cleanup slot was filled by a condition.
impl From<bool> for Collectable {
    fn from(_: bool) -> Self {
        Self::None
    }
}

impl<T: Into<Self>> From<Option<T>> for Collectable {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

impl From<Vec<Self>> for Collectable {
    fn from(items: Vec<Self>) -> Self {
        Self::Sequence(items)
    }
}

impl<const N: usize> From<[Self; N]> for Collectable {
    fn from(items: [Self; N]) -> Self {
        Self::Sequence(Vec::from(items))
    }
}

impl FromIterator<Self> for Collectable {
    fn from_iter<I: IntoIterator<Item = Self>>(iter: I) -> Self {
        Self::Sequence(iter.into_iter().collect())
    }
}

/// Fires collectables.
///
/// Synchronous branches run immediately, in sequence order, depth first.
/// Deferred branches are spawned on the executor passed to [`Resolver::new`]
/// and resolved when they settle; the caller cannot observe their completion.
///
/// A deferred branch that settles with an error is logged at `warn` level and
/// dropped. A branch that cannot be spawned is logged at `error` level and
/// dropped. Neither is reported to the caller of [`Resolver::resolve`].
///
/// Cloning a resolver is cheap; clones share the executor.
#[derive(Clone)]
pub struct Resolver {
    spawner: Rc<dyn LocalSpawn>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl Resolver {
    /// Create a resolver that schedules deferred branches on `spawner`.
    pub fn new<S: LocalSpawn + 'static>(spawner: S) -> Self {
        Self {
            spawner: Rc::new(spawner),
        }
    }

    /// Fire every callback reachable from `value`.
    pub fn resolve(&self, value: impl Into<Collectable>) {
        // Explicit stack so nesting depth is bounded by memory, not the call stack.
        let mut stack = vec![value.into()];
        let mut fired = 0_usize;
        let mut deferred = 0_usize;
        while let Some(next) = stack.pop() {
            match next {
                Collectable::None => {}
                Collectable::Callback(callback) => {
                    fired += 1;
                    stack.push(callback());
                }
                Collectable::Deferred(future) => {
                    deferred += 1;
                    self.schedule(future);
                }
                Collectable::Sequence(items) => stack.extend(items.into_iter().rev()),
                Collectable::Carrier(carrier) => stack.push(carrier.into_destroy()),
            }
        }
        trace!(fired, deferred, "resolved collectable");
    }

    fn schedule(&self, future: DeferredCollectable) {
        let resolver = self.clone();
        let task = async move {
            match future.await {
                Ok(next) => resolver.resolve(next),
                Err(err) => warn!(%err, "deferred cleanup dropped"),
            }
        };
        if let Err(err) = self
            .spawner
            .spawn_local_obj(LocalFutureObj::new(Box::pin(task)))
        {
            error!(?err, "could not schedule deferred cleanup");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use futures::channel::oneshot;
    use futures::executor::LocalPool;

    fn counter() -> (Rc<Cell<u32>>, impl Fn() -> Collectable) {
        let count = Rc::new(Cell::new(0_u32));
        let c = count.clone();
        let leaf = move || {
            let c = c.clone();
            Collectable::callback(move || c.set(c.get() + 1))
        };
        (count, leaf)
    }

    struct Holder(Collectable);

    impl Carrier for Holder {
        fn into_destroy(self: Box<Self>) -> Collectable {
            self.0
        }
    }

    #[test]
    fn nested_sync_shapes_fire_every_leaf_once() {
        let pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        let (count, leaf) = counter();

        let inner = leaf();
        let value = Collectable::from(vec![
            leaf(),
            Collectable::None,
            Collectable::from(true),
            Collectable::carrier(Holder(Collectable::from([leaf(), leaf()]))),
            Collectable::callback(move || inner),
            Collectable::from(Some(leaf())),
        ]);
        resolver.resolve(value);
        assert_eq!(count.get(), 5);
    }

    #[test]
    fn sequence_order_is_depth_first() {
        let pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        let log = Rc::new(core::cell::RefCell::new(Vec::new()));
        let push = |tag: u8| {
            let log = log.clone();
            Collectable::callback(move || log.borrow_mut().push(tag))
        };
        let nested = push(2);
        resolver.resolve([
            push(1),
            Collectable::callback(move || [nested, Collectable::None]),
            push(3),
        ]);
        // The callback wrapping `2` is itself a leaf that returns a sequence.
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn deferred_fires_only_after_the_executor_runs() {
        let mut pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        let (count, leaf) = counter();
        let (tx, rx) = oneshot::channel::<Collectable>();

        resolver.resolve([
            leaf(),
            Collectable::deferred(async move {
                rx.await.map_err(|_| CollectError::rejected("sender dropped"))
            }),
        ]);
        assert_eq!(count.get(), 1);

        assert!(tx.send(leaf()).is_ok(), "receiver is alive");
        assert_eq!(count.get(), 1);
        pool.run_until_stalled();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn deferred_chains_into_more_deferred() {
        let mut pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        let (count, leaf) = counter();
        let last = leaf();
        let value = Collectable::deferred(async move {
            Ok::<_, CollectError>(Collectable::deferred(async move {
                Ok::<_, CollectError>(last)
            }))
        });
        resolver.resolve(value);
        pool.run_until_stalled();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn rejected_deferred_does_not_affect_siblings() {
        let mut pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        let (count, leaf) = counter();
        let (tx, rx) = oneshot::channel::<Collectable>();

        resolver.resolve([
            Collectable::deferred(async move {
                rx.await.map_err(|_| CollectError::rejected("sender dropped"))
            }),
            Collectable::deferred(async { Err::<(), _>(CollectError::rejected("boom")) }),
            leaf(),
        ]);
        drop(tx);
        pool.run_until_stalled();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn unschedulable_deferred_does_not_affect_siblings() {
        let pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        drop(pool);
        let (count, leaf) = counter();
        let (late, late_leaf) = counter();

        let orphaned = late_leaf();
        resolver.resolve([
            leaf(),
            Collectable::deferred(async move { Ok::<_, CollectError>(orphaned) }),
            leaf(),
        ]);
        assert_eq!(count.get(), 2);
        assert_eq!(late.get(), 0);
    }

    #[test]
    fn none_shapes_are_noops() {
        let pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        resolver.resolve(());
        resolver.resolve(false);
        resolver.resolve(Option::<Collectable>::None);
        resolver.resolve(Vec::<Collectable>::new());
        assert!(Collectable::default().is_none());
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        let (count, leaf) = counter();
        let mut value = leaf();
        for _ in 0..100_000 {
            value = Collectable::from(vec![value]);
        }
        resolver.resolve(value);
        assert_eq!(count.get(), 1);
    }
}
