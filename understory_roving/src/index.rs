// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-keyed ordered items and index reconciliation.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::hash::Hash;

use hashbrown::HashMap;
use tracing::debug;
use understory_lifecycle::{Disposer, Observable, Signal, Writable};

use crate::error::IndexError;
use crate::traversal::Traversal;

/// One member of an [`OrderedIndex`].
///
/// The index is held in a shared [`Signal`], so every clone of an item reads
/// the live index and can subscribe to its changes. The payload is a snapshot
/// taken when the item was read; use [`OrderedIndex::update`] to change the
/// stored payload.
#[derive(Clone, Debug)]
pub struct OrderedItem<K, T> {
    host: K,
    index: Signal<usize>,
    payload: T,
}

impl<K: Copy, T> OrderedItem<K, T> {
    /// The host this item was registered for.
    pub fn host(&self) -> K {
        self.host
    }

    /// Current index.
    pub fn index(&self) -> usize {
        self.index.get()
    }

    /// The index as an observable, notified whenever reconciliation moves it.
    pub fn index_signal(&self) -> &Signal<usize> {
        &self.index
    }

    /// Caller-defined data.
    pub fn payload(&self) -> &T {
        &self.payload
    }
}

/// Result of one [`OrderedIndex::reconcile`] pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Recorded order already matched document order. Nothing was touched.
    Unchanged,
    /// Indices from position `from` onward were rewritten; `changed` of them
    /// actually moved (and notified their subscribers).
    Reordered {
        /// First divergent position.
        from: usize,
        /// Number of items whose index changed.
        changed: usize,
    },
    /// A member is not attached below the container, so the pass was skipped.
    Detached,
    /// A pass was already running; this one was skipped.
    Busy,
    /// The caller's gate declined the pass (see [`Reconciler`](crate::Reconciler)).
    Gated,
}

struct Member<K, T> {
    item: OrderedItem<K, T>,
    /// distinguishes successive memberships of the same host
    token: u64,
}

struct Inner<K, T> {
    members: HashMap<K, Member<K, T>>,
    /// insertion order, replaced by document order after each reconcile
    order: Vec<K>,
    next_token: u64,
    reconciling: bool,
}

impl<K, T> Default for Inner<K, T> {
    fn default() -> Self {
        Self {
            members: HashMap::new(),
            order: Vec::new(),
            next_token: 0,
            reconciling: false,
        }
    }
}

/// A mapping from hosts to ordered items whose indices track document order.
///
/// Items get the next index (the current member count) when added. Deleting
/// leaves gaps, and hosts moving around in the document leave indices stale,
/// until the next [`OrderedIndex::reconcile`] realigns them.
///
/// Reconciliation only rewrites the divergent suffix: items before the first
/// position where recorded and document order disagree keep their index and
/// are never notified. For rarely reordered lists this keeps the common case
/// (nothing moved) to a single comparison pass with no notifications.
///
/// `OrderedIndex` is a handle: clones share the same members.
///
/// ```rust
/// use understory_roving::{HostTree, OrderedIndex, Traversal};
///
/// let mut tree = HostTree::new();
/// let list = tree.insert(None);
/// let a = tree.insert(Some(list));
/// let b = tree.insert(Some(list));
///
/// let index = OrderedIndex::new();
/// let (item_a, _remove_a) = index.add(a, "a").unwrap();
/// let (item_b, _remove_b) = index.add(b, "b").unwrap();
///
/// tree.move_to(a, Some(list), 1);
/// index.reconcile(&tree, list);
/// assert_eq!((item_b.index(), item_a.index()), (0, 1));
/// ```
pub struct OrderedIndex<K, T> {
    inner: Rc<RefCell<Inner<K, T>>>,
    changes: Signal<u64>,
}

impl<K, T> Clone for OrderedIndex<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            changes: self.changes.clone(),
        }
    }
}

impl<K: fmt::Debug, T> fmt::Debug for OrderedIndex<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("OrderedIndex")
                .field("order", &inner.order)
                .finish_non_exhaustive(),
            Err(_) => f.debug_struct("OrderedIndex").finish_non_exhaustive(),
        }
    }
}

impl<K, T> Default for OrderedIndex<K, T>
where
    K: Copy + Eq + Hash + 'static,
    T: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> OrderedIndex<K, T>
where
    K: Copy + Eq + Hash + 'static,
    T: Clone + 'static,
{
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            inner: Rc::default(),
            changes: Signal::new(0),
        }
    }

    /// Register `host` with `payload`.
    ///
    /// Returns the new item and a disposer that removes exactly this membership:
    /// if the host is deleted and added again, the old disposer does nothing.
    ///
    /// Fails with [`IndexError::DuplicateItem`] if `host` is already a member;
    /// the existing item is left untouched.
    pub fn add(&self, host: K, payload: T) -> Result<(OrderedItem<K, T>, Disposer), IndexError> {
        let (item, token) = {
            let mut inner = self.inner.borrow_mut();
            if inner.members.contains_key(&host) {
                return Err(IndexError::DuplicateItem);
            }
            let token = inner.next_token;
            inner.next_token += 1;
            let item = OrderedItem {
                host,
                index: Signal::new(inner.order.len()),
                payload,
            };
            inner.members.insert(
                host,
                Member {
                    item: item.clone(),
                    token,
                },
            );
            inner.order.push(host);
            (item, token)
        };
        bump(&self.changes);

        let inner = Rc::downgrade(&self.inner);
        let changes = self.changes.clone();
        let disposer = Disposer::new(move || {
            if let Some(inner) = inner.upgrade()
                && remove_member(&inner, host, Some(token))
            {
                bump(&changes);
            }
        });
        Ok((item, disposer))
    }

    /// Remove `host`. Returns `true` if it was a member.
    ///
    /// Remaining indices are not renumbered until the next reconcile.
    pub fn delete(&self, host: K) -> bool {
        let removed = remove_member(&self.inner, host, None);
        if removed {
            bump(&self.changes);
        }
        removed
    }

    /// The item registered for `host`.
    pub fn get(&self, host: K) -> Option<OrderedItem<K, T>> {
        self.inner
            .borrow()
            .members
            .get(&host)
            .map(|m| m.item.clone())
    }

    /// The item currently at `index`.
    ///
    /// Between a membership change and the next reconcile two items may share
    /// an index; the one recorded first wins.
    pub fn get_at(&self, index: usize) -> Option<OrderedItem<K, T>> {
        let inner = self.inner.borrow();
        inner
            .order
            .iter()
            .filter_map(|host| inner.members.get(host))
            .find(|m| m.item.index() == index)
            .map(|m| m.item.clone())
    }

    /// The current index of `host`.
    pub fn index_of(&self, host: K) -> Option<usize> {
        self.inner
            .borrow()
            .members
            .get(&host)
            .map(|m| m.item.index())
    }

    /// Returns `true` if `host` is a member.
    pub fn contains(&self, host: K) -> bool {
        self.inner.borrow().members.contains_key(&host)
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.inner.borrow().members.len()
    }

    /// Returns `true` if there are no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hosts in recorded order (insertion order, or document order as of the
    /// last reconcile).
    pub fn hosts_in_order(&self) -> Vec<K> {
        self.inner.borrow().order.clone()
    }

    /// Mutate the payload stored for `host`. Returns `false` if it is not a member.
    ///
    /// `f` must not call back into this index.
    pub fn update(&self, host: K, f: impl FnOnce(&mut T)) -> bool {
        match self.inner.borrow_mut().members.get_mut(&host) {
            Some(member) => {
                f(&mut member.item.payload);
                true
            }
            None => false,
        }
    }

    /// Visit every item in recorded order.
    ///
    /// `f` must not call back into this index.
    pub fn for_each(&self, mut f: impl FnMut(&OrderedItem<K, T>)) {
        let inner = self.inner.borrow();
        for host in &inner.order {
            if let Some(member) = inner.members.get(host) {
                f(&member.item);
            }
        }
    }

    /// Membership generation, bumped after every add and delete.
    ///
    /// Subscribe to this to re-run reconciliation when membership changes.
    pub fn changes(&self) -> &Signal<u64> {
        &self.changes
    }

    /// Realign indices with the document order of hosts below `root`.
    ///
    /// 1. If any member is not a live descendant of `root`, nothing changes
    ///    and [`ReconcileOutcome::Detached`] is returned.
    /// 2. Otherwise the members are listed in document order and compared
    ///    position by position with the recorded order (and recorded index).
    /// 3. If nothing diverges, nothing changes.
    /// 4. If position `k` is the first divergence, every member at document
    ///    position `k` or later gets that position as its index. Index signals
    ///    are set after the index is released, so subscribers may read it.
    ///
    /// A pass started while another is notifying returns [`ReconcileOutcome::Busy`].
    pub fn reconcile<C: Traversal<K>>(&self, container: &C, root: K) -> ReconcileOutcome {
        let (from, pending) = {
            let Ok(mut inner) = self.inner.try_borrow_mut() else {
                return ReconcileOutcome::Busy;
            };
            if inner.reconciling {
                return ReconcileOutcome::Busy;
            }
            if let Some(position) = inner
                .order
                .iter()
                .position(|host| !container.contains(root, *host))
            {
                debug!(position, "member is detached, skipping reconciliation");
                return ReconcileOutcome::Detached;
            }

            let mut live = Vec::with_capacity(inner.order.len());
            {
                let members = &inner.members;
                container.visit_descendants(root, |host| {
                    if members.contains_key(&host) {
                        live.push(host);
                    }
                });
            }
            if live.len() != inner.order.len() {
                debug!(
                    members = inner.order.len(),
                    visited = live.len(),
                    "traversal does not cover every member, skipping reconciliation"
                );
                return ReconcileOutcome::Detached;
            }

            let divergence = live.iter().enumerate().position(|(pos, host)| {
                inner.order[pos] != *host
                    || inner
                        .members
                        .get(host)
                        .is_none_or(|m| m.item.index() != pos)
            });
            let Some(from) = divergence else {
                return ReconcileOutcome::Unchanged;
            };

            let pending: Vec<(Signal<usize>, usize)> = live[from..]
                .iter()
                .zip(from..)
                .filter_map(|(host, pos)| {
                    inner
                        .members
                        .get(host)
                        .map(|m| (m.item.index.clone(), pos))
                })
                .collect();
            inner.order = live;
            inner.reconciling = true;
            (from, pending)
        };

        let _guard = ReconcilingGuard(&*self.inner);
        let mut changed = 0_usize;
        for (signal, index) in pending {
            if signal.get() != index {
                changed += 1;
                signal.set(index);
            }
        }
        debug!(from, changed, "reconciled ordered index");
        ReconcileOutcome::Reordered { from, changed }
    }
}

/// Clears the reconciling flag even if a subscriber panics.
struct ReconcilingGuard<'a, K, T>(&'a RefCell<Inner<K, T>>);

impl<K, T> Drop for ReconcilingGuard<'_, K, T> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.0.try_borrow_mut() {
            inner.reconciling = false;
        }
    }
}

fn remove_member<K: Copy + Eq + Hash, T>(
    inner: &RefCell<Inner<K, T>>,
    host: K,
    token: Option<u64>,
) -> bool {
    let mut inner = inner.borrow_mut();
    match inner.members.get(&host) {
        Some(member) if token.is_none_or(|t| t == member.token) => {}
        _ => return false,
    }
    inner.members.remove(&host);
    inner.order.retain(|h| *h != host);
    true
}

fn bump(changes: &Signal<u64>) {
    changes.update(|generation| generation.wrapping_add(1));
}
