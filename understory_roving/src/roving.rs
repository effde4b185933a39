// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single tab-stop keyboard navigation over an [`OrderedIndex`].

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::hash::Hash;

use understory_lifecycle::{Observable, Signal, Writable};

use crate::index::OrderedIndex;

/// Direction of roving navigation.
///
/// These map to the keys a composite widget handles: arrows for
/// [`Navigation::Next`]/[`Navigation::Prev`], Home/End for
/// [`Navigation::First`]/[`Navigation::Last`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Navigation {
    /// Move to the item with the next index.
    Next,
    /// Move to the item with the previous index.
    Prev,
    /// Move to the first enabled item.
    First,
    /// Move to the last enabled item.
    Last,
}

/// Wrap mode for [`Navigation::Next`] and [`Navigation::Prev`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum WrapMode {
    /// Do not wrap; reaching the end of the sequence yields no next candidate.
    Never,
    /// Wrap from the last item to the first and back.
    #[default]
    Wrap,
}

type Filter<T> = Box<dyn Fn(&T) -> bool>;

/// The active position among the items of an [`OrderedIndex`].
///
/// Candidates are the items the filter accepts, ordered by their current
/// index, so the cursor follows document order once the index has been
/// reconciled. Exactly one candidate is the tab stop: the active host, or the
/// first candidate while nothing (or a host that has since left the index) is
/// active.
///
/// ```rust
/// use understory_roving::{HostTree, Navigation, OrderedIndex, RovingCursor};
///
/// let mut tree = HostTree::new();
/// let list = tree.insert(None);
/// let hosts = [tree.insert(Some(list)), tree.insert(Some(list))];
///
/// let index = OrderedIndex::new();
/// let _items: Vec<_> = hosts.iter().map(|h| index.add(*h, ()).unwrap()).collect();
///
/// let cursor = RovingCursor::new(index);
/// assert!(cursor.is_tab_stop(hosts[0]));
/// assert_eq!(cursor.navigate(Navigation::Last), Some(hosts[1]));
/// assert_eq!(cursor.navigate(Navigation::Next), Some(hosts[0]));
/// ```
pub struct RovingCursor<K, T> {
    index: OrderedIndex<K, T>,
    active: Signal<Option<K>>,
    wrap: WrapMode,
    filter: Option<Filter<T>>,
}

impl<K: fmt::Debug, T> fmt::Debug for RovingCursor<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RovingCursor")
            .field("active", &self.active)
            .field("wrap", &self.wrap)
            .field("filtered", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

impl<K, T> RovingCursor<K, T>
where
    K: Copy + Eq + Hash + 'static,
    T: Clone + 'static,
{
    /// Create a cursor over `index` with nothing active.
    pub fn new(index: OrderedIndex<K, T>) -> Self {
        Self {
            index,
            active: Signal::new(None),
            wrap: WrapMode::default(),
            filter: None,
        }
    }

    /// Set the wrap mode.
    pub fn with_wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap = wrap;
        self
    }

    /// Only items whose payload passes `enabled` take part in navigation.
    pub fn with_filter(mut self, enabled: impl Fn(&T) -> bool + 'static) -> Self {
        self.filter = Some(Box::new(enabled));
        self
    }

    /// The active host, observable.
    pub fn active(&self) -> &Signal<Option<K>> {
        &self.active
    }

    /// Make `host` active (or clear with `None`).
    ///
    /// Returns `false`, leaving the cursor unchanged, if `host` is not an
    /// enabled member of the index.
    pub fn set_active(&self, host: Option<K>) -> bool {
        if let Some(host) = host
            && !self.candidates().contains(&host)
        {
            return false;
        }
        self.active.set(host);
        true
    }

    /// Compute where `direction` leads from the active host without moving.
    pub fn target(&self, direction: Navigation) -> Option<K> {
        let candidates = self.candidates();
        let (first, last) = (candidates.first().copied()?, candidates.last().copied()?);
        let origin = self
            .active
            .get()
            .and_then(|active| candidates.iter().position(|h| *h == active));
        let wrap = matches!(self.wrap, WrapMode::Wrap);

        match direction {
            Navigation::First => Some(first),
            Navigation::Last => Some(last),
            Navigation::Next => match origin {
                Some(pos) if pos + 1 < candidates.len() => Some(candidates[pos + 1]),
                Some(_) => wrap.then_some(first),
                None => Some(first),
            },
            Navigation::Prev => match origin {
                Some(pos) if pos > 0 => Some(candidates[pos - 1]),
                Some(_) => wrap.then_some(last),
                None => Some(last),
            },
        }
    }

    /// Move the active host in `direction`. Returns the new active host, or
    /// `None` (leaving the cursor unchanged) when there is nowhere to go.
    pub fn navigate(&self, direction: Navigation) -> Option<K> {
        let target = self.target(direction)?;
        self.active.set(Some(target));
        Some(target)
    }

    /// Returns `true` if `host` is the single tab stop.
    pub fn is_tab_stop(&self, host: K) -> bool {
        let candidates = self.candidates();
        match self.active.get() {
            Some(active) if candidates.contains(&active) => active == host,
            _ => candidates.first() == Some(&host),
        }
    }

    /// Enabled hosts ordered by index.
    fn candidates(&self) -> Vec<K> {
        let mut ordered: Vec<(usize, K)> = Vec::with_capacity(self.index.len());
        self.index.for_each(|item| {
            if self.filter.as_ref().is_none_or(|enabled| enabled(item.payload())) {
                ordered.push((item.index(), item.host()));
            }
        });
        // Stable, so items sharing an index before reconciliation keep recorded order.
        ordered.sort_by_key(|(index, _)| *index);
        ordered.into_iter().map(|(_, host)| host).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::Cell;

    use understory_lifecycle::Disposer;

    use crate::tree::{HostId, HostTree};

    type Items = Vec<(crate::OrderedItem<HostId, bool>, Disposer)>;

    /// Three hosts under one root; payload is the enabled flag.
    fn list(enabled: [bool; 3]) -> (HostTree, HostId, [HostId; 3], OrderedIndex<HostId, bool>, Items) {
        let mut tree = HostTree::new();
        let root = tree.insert(None);
        let hosts = [
            tree.insert(Some(root)),
            tree.insert(Some(root)),
            tree.insert(Some(root)),
        ];
        let index = OrderedIndex::new();
        let items = hosts
            .iter()
            .zip(enabled)
            .map(|(h, e)| index.add(*h, e).unwrap())
            .collect();
        (tree, root, hosts, index, items)
    }

    #[test]
    fn next_prev_with_wrap() {
        let (_tree, _root, [a, b, c], index, _items) = list([true; 3]);
        let cursor = RovingCursor::new(index);
        assert_eq!(cursor.navigate(Navigation::Next), Some(a));
        assert_eq!(cursor.navigate(Navigation::Next), Some(b));
        assert_eq!(cursor.navigate(Navigation::Next), Some(c));
        assert_eq!(cursor.navigate(Navigation::Next), Some(a));
        assert_eq!(cursor.navigate(Navigation::Prev), Some(c));
        assert_eq!(cursor.active().get(), Some(c));
    }

    #[test]
    fn no_wrap_stops_at_edges() {
        let (_tree, _root, [a, _, c], index, _items) = list([true; 3]);
        let cursor = RovingCursor::new(index).with_wrap(WrapMode::Never);
        assert_eq!(cursor.navigate(Navigation::Last), Some(c));
        assert_eq!(cursor.navigate(Navigation::Next), None);
        assert_eq!(cursor.active().get(), Some(c));
        assert_eq!(cursor.navigate(Navigation::First), Some(a));
        assert_eq!(cursor.target(Navigation::Prev), None);
    }

    #[test]
    fn filter_skips_disabled_items() {
        let (_tree, _root, [a, b, c], index, _items) = list([true, false, true]);
        let cursor = RovingCursor::new(index).with_filter(|enabled: &bool| *enabled);
        assert!(cursor.set_active(Some(a)));
        assert_eq!(cursor.navigate(Navigation::Next), Some(c));
        assert!(!cursor.set_active(Some(b)));
        assert_eq!(cursor.active().get(), Some(c));
        assert!(!cursor.is_tab_stop(b));
    }

    #[test]
    fn follows_reconciled_order() {
        let (mut tree, root, [a, b, c], index, _items) = list([true; 3]);
        let cursor = RovingCursor::new(index.clone());
        tree.move_to(a, Some(root), usize::MAX);
        index.reconcile(&tree, root);

        assert_eq!(cursor.navigate(Navigation::First), Some(b));
        assert_eq!(cursor.navigate(Navigation::Next), Some(c));
        assert_eq!(cursor.navigate(Navigation::Next), Some(a));
    }

    #[test]
    fn tab_stop_falls_back_to_first_candidate() {
        let (_tree, _root, [a, b, _], index, _items) = list([true; 3]);
        let cursor = RovingCursor::new(index.clone());
        assert!(cursor.is_tab_stop(a));

        cursor.set_active(Some(b));
        assert!(cursor.is_tab_stop(b));
        assert!(!cursor.is_tab_stop(a));

        index.delete(b);
        assert!(cursor.is_tab_stop(a));
    }

    #[test]
    fn active_changes_are_observable() {
        let (_tree, _root, [a, ..], index, _items) = list([true; 3]);
        let cursor = RovingCursor::new(index);
        let moves = Rc::new(Cell::new(0_u32));
        let m = moves.clone();
        let _sub = cursor
            .active()
            .subscribe(Box::new(move |_: &Option<HostId>| m.set(m.get() + 1)));
        cursor.set_active(Some(a));
        cursor.set_active(Some(a));
        cursor.set_active(None);
        assert_eq!(moves.get(), 2);
    }
}
