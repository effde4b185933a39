// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Phased mount sequences that collect their own teardown.

use alloc::boxed::Box;
use core::fmt;

use crate::collectable::{Collectable, Resolver};
use crate::disposer::Disposer;

type Phase<'a> = Box<dyn FnOnce() -> Collectable + 'a>;

/// A three-phase mount sequence.
///
/// [`Lifecycle::run`] calls the phases synchronously and strictly in order:
/// `before_init`, `init`, `after_init`. Each phase may return cleanup (any
/// value convertible into a [`Collectable`]). The returned [`Disposer`] first
/// runs the `before_collection` hook and then resolves the three collected
/// values.
///
/// `before_collection` is where cached handles are cleared before teardown
/// begins, so subscribers that fire during teardown observe the cleared state.
///
/// Phases are not caught: a panic in any phase unwinds to the caller of
/// [`Lifecycle::run`], and cleanup already returned by earlier phases is dropped
/// without being resolved.
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use futures::executor::LocalPool;
/// use understory_lifecycle::{Collectable, Lifecycle, Resolver};
///
/// let pool = LocalPool::new();
/// let resolver = Resolver::new(pool.spawner());
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let (a, b) = (log.clone(), log.clone());
/// let mut disposer = Lifecycle::new(move || {
///     a.borrow_mut().push("mount");
///     Collectable::callback(move || b.borrow_mut().push("unmount"))
/// })
/// .run(&resolver);
///
/// disposer.dispose();
/// assert_eq!(*log.borrow(), ["mount", "unmount"]);
/// ```
pub struct Lifecycle<'a> {
    before_init: Option<Phase<'a>>,
    init: Phase<'a>,
    after_init: Option<Phase<'a>>,
    before_collection: Option<Box<dyn FnOnce()>>,
}

impl fmt::Debug for Lifecycle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("before_init", &self.before_init.is_some())
            .field("after_init", &self.after_init.is_some())
            .field("before_collection", &self.before_collection.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> Lifecycle<'a> {
    /// Start a sequence around the required `init` phase.
    pub fn new<F, R>(init: F) -> Self
    where
        F: FnOnce() -> R + 'a,
        R: Into<Collectable>,
    {
        Self {
            before_init: None,
            init: Box::new(move || init().into()),
            after_init: None,
            before_collection: None,
        }
    }

    /// Phase that runs before `init`.
    pub fn before_init<F, R>(mut self, phase: F) -> Self
    where
        F: FnOnce() -> R + 'a,
        R: Into<Collectable>,
    {
        self.before_init = Some(Box::new(move || phase().into()));
        self
    }

    /// Phase that runs after `init`, for effects that read state `init` produced.
    pub fn after_init<F, R>(mut self, phase: F) -> Self
    where
        F: FnOnce() -> R + 'a,
        R: Into<Collectable>,
    {
        self.after_init = Some(Box::new(move || phase().into()));
        self
    }

    /// Hook that runs when the disposer fires, before any collected cleanup.
    pub fn before_collection(mut self, hook: impl FnOnce() + 'static) -> Self {
        self.before_collection = Some(Box::new(hook));
        self
    }

    /// Run the phases and return the disposer for everything they set up.
    ///
    /// The disposer is idempotent: only its first call does anything.
    pub fn run(self, resolver: &Resolver) -> Disposer {
        let Self {
            before_init,
            init,
            after_init,
            before_collection,
        } = self;

        let before = before_init.map_or(Collectable::None, |phase| phase());
        let main = init();
        let after = after_init.map_or(Collectable::None, |phase| phase());

        let resolver = resolver.clone();
        Disposer::new(move || {
            if let Some(hook) = before_collection {
                hook();
            }
            resolver.resolve([before, main, after]);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::{Cell, RefCell};
    use futures::executor::LocalPool;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn record(log: &Log, tag: &'static str) -> impl FnOnce() + 'static {
        let log = log.clone();
        move || log.borrow_mut().push(tag)
    }

    fn phase(log: &Log, tag: &'static str, cleanup: &'static str) -> impl FnOnce() -> Collectable {
        let log = log.clone();
        move || {
            log.borrow_mut().push(tag);
            Collectable::callback(move || log.borrow_mut().push(cleanup))
        }
    }

    #[test]
    fn phases_run_in_order_for_every_combination() {
        let pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        for (with_before, with_after) in [(false, false), (true, false), (false, true), (true, true)] {
            let log: Log = Rc::default();
            let mut lifecycle = Lifecycle::new(phase(&log, "init", "init-cleanup"));
            if with_before {
                lifecycle = lifecycle.before_init(phase(&log, "before", "before-cleanup"));
            }
            if with_after {
                lifecycle = lifecycle.after_init(phase(&log, "after", "after-cleanup"));
            }
            let _disposer = lifecycle.run(&resolver);

            let mut expected = Vec::new();
            if with_before {
                expected.push("before");
            }
            expected.push("init");
            if with_after {
                expected.push("after");
            }
            assert_eq!(*log.borrow(), expected);
        }
    }

    #[test]
    fn before_collection_runs_before_collected_cleanup() {
        let pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        let log: Log = Rc::default();
        let mut disposer = Lifecycle::new(phase(&log, "init", "init-cleanup"))
            .before_init(phase(&log, "before", "before-cleanup"))
            .after_init(phase(&log, "after", "after-cleanup"))
            .before_collection(record(&log, "before-collection"))
            .run(&resolver);

        assert_eq!(*log.borrow(), vec!["before", "init", "after"]);
        assert!(disposer.dispose());
        assert_eq!(
            log.borrow()[3..],
            ["before-collection", "before-cleanup", "init-cleanup", "after-cleanup"]
        );
    }

    #[test]
    fn disposer_only_collects_once() {
        let pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        let count = Rc::new(Cell::new(0_u32));
        let c = count.clone();
        let mut disposer =
            Lifecycle::new(move || Collectable::callback(move || c.set(c.get() + 1))).run(&resolver);
        disposer.dispose();
        disposer.dispose();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn phases_may_borrow_local_state() {
        let pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        let mut mounted = 0;
        let cached = Rc::new(RefCell::new(Some("handle")));
        let c = cached.clone();
        let mut disposer = Lifecycle::new(|| mounted += 1)
            .before_collection(move || *c.borrow_mut() = None)
            .run(&resolver);
        assert_eq!(mounted, 1);
        assert!(cached.borrow().is_some());
        disposer.dispose();
        assert!(cached.borrow().is_none());
    }
}
