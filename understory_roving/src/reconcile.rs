// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keeping an [`OrderedIndex`] reconciled as things change.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::hash::Hash;

use tracing::trace;
use understory_lifecycle::{Carrier, Collectable, Disposer, Observable};

use crate::index::{OrderedIndex, ReconcileOutcome};
use crate::traversal::Traversal;

type Gate = Box<dyn Fn() -> bool>;

struct Shared<K, T, C> {
    index: OrderedIndex<K, T>,
    container: Rc<RefCell<C>>,
    root: K,
    gate: RefCell<Option<Gate>>,
}

impl<K, T, C> Shared<K, T, C>
where
    K: Copy + Eq + Hash + 'static,
    T: Clone + 'static,
    C: Traversal<K>,
{
    fn run(&self) -> ReconcileOutcome {
        if let Some(gate) = self.gate.borrow().as_ref()
            && !gate()
        {
            return ReconcileOutcome::Gated;
        }
        let Ok(container) = self.container.try_borrow() else {
            trace!("container is being mutated, skipping reconciliation");
            return ReconcileOutcome::Busy;
        };
        self.index.reconcile(&*container, self.root)
    }
}

/// Runs [`OrderedIndex::reconcile`] whenever membership or watched state changes.
///
/// A reconciler is created for one container root. It subscribes to the
/// index's [`changes`](OrderedIndex::changes) immediately; further triggers
/// (for example the state that decides whether navigation cares about order)
/// are added with [`Reconciler::watch`]. Each notification runs one pass,
/// synchronously, unless the gate set with [`Reconciler::with_gate`] is closed.
///
/// A notification that arrives while the container is mutably borrowed skips
/// its pass; call [`Reconciler::trigger`] once the mutation is done.
///
/// Subscriptions are released by [`Reconciler::destroy`], which also runs on
/// drop. A reconciler can be handed to a lifecycle as a [`Carrier`].
pub struct Reconciler<K, T, C> {
    shared: Rc<Shared<K, T, C>>,
    subscriptions: Vec<Disposer>,
}

impl<K: fmt::Debug, T, C> fmt::Debug for Reconciler<K, T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("root", &self.shared.root)
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl<K, T, C> Reconciler<K, T, C>
where
    K: Copy + Eq + Hash + 'static,
    T: Clone + 'static,
    C: Traversal<K> + 'static,
{
    /// Reconcile `index` against the descendants of `root` in `container`.
    pub fn new(index: OrderedIndex<K, T>, container: Rc<RefCell<C>>, root: K) -> Self {
        let shared = Rc::new(Shared {
            index,
            container,
            root,
            gate: RefCell::new(None),
        });
        let mut this = Self {
            shared,
            subscriptions: Vec::new(),
        };
        let changes = this.shared.index.changes().clone();
        this.watch(&changes);
        this
    }

    /// Only reconcile while `gate` returns `true`.
    pub fn with_gate(self, gate: impl Fn() -> bool + 'static) -> Self {
        *self.shared.gate.borrow_mut() = Some(Box::new(gate));
        self
    }

    /// Run a pass after every change of `source`.
    pub fn watch<V: 'static>(&mut self, source: &dyn Observable<V>) {
        let shared = Rc::downgrade(&self.shared);
        let subscription = source.subscribe(Box::new(move |_: &V| {
            if let Some(shared) = Weak::upgrade(&shared) {
                shared.run();
            }
        }));
        self.subscriptions.push(subscription);
    }

    /// Run a pass now.
    pub fn trigger(&self) -> ReconcileOutcome {
        self.shared.run()
    }

    /// The index this reconciler maintains.
    pub fn index(&self) -> &OrderedIndex<K, T> {
        &self.shared.index
    }
}

impl<K, T, C> Reconciler<K, T, C> {
    /// Release every subscription. Further notifications do nothing.
    pub fn destroy(&mut self) {
        for mut subscription in self.subscriptions.drain(..) {
            subscription.dispose();
        }
    }
}

impl<K, T, C> Drop for Reconciler<K, T, C> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<K: 'static, T: 'static, C: 'static> Carrier for Reconciler<K, T, C> {
    fn into_destroy(self: Box<Self>) -> Collectable {
        let mut this = self;
        Collectable::callback(move || this.destroy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    use futures::executor::LocalPool;
    use understory_lifecycle::{Resolver, Signal, Writable};

    use crate::tree::{HostId, HostTree};

    fn setup() -> (Rc<RefCell<HostTree>>, HostId, [HostId; 3]) {
        let mut tree = HostTree::new();
        let root = tree.insert(None);
        let hosts = [
            tree.insert(Some(root)),
            tree.insert(Some(root)),
            tree.insert(Some(root)),
        ];
        (Rc::new(RefCell::new(tree)), root, hosts)
    }

    #[test]
    fn membership_changes_trigger_a_pass() {
        let (tree, root, [h1, h2, h3]) = setup();
        let index = OrderedIndex::new();
        let _reconciler = Reconciler::new(index.clone(), tree.clone(), root);

        let (_a, _da) = index.add(h1, ()).unwrap();
        let (_b, _db) = index.add(h2, ()).unwrap();
        let (_c, _dc) = index.add(h3, ()).unwrap();
        tree.borrow_mut().move_to(h1, Some(root), usize::MAX);
        assert_eq!(index.index_of(h1), Some(0));

        // Deleting h2 bumps the membership generation and realigns the rest.
        assert!(index.delete(h2));
        assert_eq!(index.index_of(h3), Some(0));
        assert_eq!(index.index_of(h1), Some(1));
    }

    #[test]
    fn closed_gate_skips_passes() {
        let (tree, root, [h1, h2, _]) = setup();
        let index = OrderedIndex::new();
        let enabled = Rc::new(Cell::new(false));
        let e = enabled.clone();
        let reconciler =
            Reconciler::new(index.clone(), tree.clone(), root).with_gate(move || e.get());

        let (_a, _da) = index.add(h1, ()).unwrap();
        let (_b, _db) = index.add(h2, ()).unwrap();
        tree.borrow_mut().move_to(h2, Some(root), 0);
        assert_eq!(reconciler.trigger(), ReconcileOutcome::Gated);
        assert_eq!(index.index_of(h2), Some(1));

        enabled.set(true);
        assert_eq!(
            reconciler.trigger(),
            ReconcileOutcome::Reordered { from: 0, changed: 2 }
        );
        assert_eq!(index.index_of(h2), Some(0));
    }

    #[test]
    fn watched_state_triggers_a_pass() {
        let (tree, root, [h1, h2, _]) = setup();
        let index = OrderedIndex::new();
        let mode = Signal::new(0_u8);
        let mut reconciler = Reconciler::new(index.clone(), tree.clone(), root);
        reconciler.watch(&mode);

        let (_a, _da) = index.add(h1, ()).unwrap();
        let (_b, _db) = index.add(h2, ()).unwrap();
        tree.borrow_mut().move_to(h2, Some(root), 0);
        mode.set(1);
        assert_eq!(index.index_of(h2), Some(0));
    }

    #[test]
    fn mutably_borrowed_container_is_busy() {
        let (tree, root, [h1, _, _]) = setup();
        let index = OrderedIndex::new();
        let reconciler = Reconciler::new(index.clone(), tree.clone(), root);
        let (_a, _da) = index.add(h1, ()).unwrap();

        let guard = tree.borrow_mut();
        assert_eq!(reconciler.trigger(), ReconcileOutcome::Busy);
        drop(guard);
        assert_eq!(reconciler.trigger(), ReconcileOutcome::Unchanged);
    }

    #[test]
    fn destroy_releases_subscriptions() {
        let (tree, root, _) = setup();
        let index: OrderedIndex<HostId, ()> = OrderedIndex::new();
        let mode = Signal::new(false);
        let mut reconciler = Reconciler::new(index.clone(), tree, root);
        reconciler.watch(&mode);
        assert_eq!(index.changes().subscriber_count(), 1);
        assert_eq!(mode.subscriber_count(), 1);

        reconciler.destroy();
        reconciler.destroy();
        assert_eq!(index.changes().subscriber_count(), 0);
        assert_eq!(mode.subscriber_count(), 0);
    }

    #[test]
    fn resolving_the_carrier_destroys_it() {
        let pool = LocalPool::new();
        let resolver = Resolver::new(pool.spawner());
        let (tree, root, _) = setup();
        let index: OrderedIndex<HostId, ()> = OrderedIndex::new();
        let reconciler = Reconciler::new(index.clone(), tree, root);
        assert_eq!(index.changes().subscriber_count(), 1);

        resolver.resolve(Collectable::carrier(reconciler));
        assert_eq!(index.changes().subscriber_count(), 0);
    }
}
