// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A minimal host hierarchy: structure and document order, nothing else.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::traversal::Traversal;

/// Identifier for a host in a [`HostTree`] (generational).
///
/// Removing a host and inserting a new one may reuse the slot, but the new
/// host gets a new generation, so stale ids never alias live hosts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct HostId(u32, u32);

impl HostId {
    const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
struct Node {
    generation: u32,
    parent: Option<HostId>,
    children: Vec<HostId>,
}

/// An ordered tree of hosts.
///
/// `HostTree` stands in for a document: it records which host is attached
/// under which parent and in which sibling position. It implements
/// [`Traversal`] with a pre-order depth-first walk, which is the order an
/// [`OrderedIndex`](crate::OrderedIndex) reconciles against.
///
/// Hosts inserted without a parent are roots. A host that is [detached](HostTree::detach)
/// stays alive as a root of its own, so it is no longer contained in its old
/// container.
///
/// ```rust
/// use understory_roving::{HostTree, Traversal};
///
/// let mut tree = HostTree::new();
/// let list = tree.insert(None);
/// let a = tree.insert(Some(list));
/// let b = tree.insert(Some(list));
///
/// // Move `a` after `b`.
/// tree.move_to(a, Some(list), 1);
///
/// let mut order = Vec::new();
/// tree.visit_descendants(list, |h| order.push(h));
/// assert_eq!(order, [b, a]);
/// ```
#[derive(Clone, Default)]
pub struct HostTree {
    nodes: Vec<Option<Node>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
}

impl fmt::Debug for HostTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("HostTree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .finish()
    }
}

impl HostTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new host as the last child of `parent` (or as a root if `None`).
    ///
    /// A stale `parent` is treated like `None`: the new host becomes a root.
    pub fn insert(&mut self, parent: Option<HostId>) -> HostId {
        let id = self.allocate();
        if let Some(p) = parent
            && self.is_alive(p)
        {
            let len = self.node(p).children.len();
            self.link_parent(id, p, len);
        }
        id
    }

    /// Insert a new host under `parent` at sibling `position` (clamped).
    ///
    /// If `parent` is stale the new host becomes a root.
    pub fn insert_at(&mut self, parent: HostId, position: usize) -> HostId {
        let id = self.allocate();
        if self.is_alive(parent) {
            self.link_parent(id, parent, position);
        }
        id
    }

    /// Remove a host and its whole subtree.
    pub fn remove(&mut self, id: HostId) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink_parent(id, parent);
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes[next.idx()].take() {
                stack.extend(node.children);
                self.free_list.push(next.idx());
            }
        }
    }

    /// Move `id` under `new_parent` at sibling `position` (clamped), or make it
    /// a root if `new_parent` is `None`.
    ///
    /// Returns `false` (and changes nothing) if either host is stale or the move
    /// would put `id` inside its own subtree.
    pub fn move_to(&mut self, id: HostId, new_parent: Option<HostId>, position: usize) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        if let Some(p) = new_parent
            && (!self.is_alive(p) || p == id || self.is_ancestor_of(id, p))
        {
            return false;
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink_parent(id, parent);
        }
        if let Some(p) = new_parent {
            self.link_parent(id, p, position);
        }
        true
    }

    /// Detach `id` from its parent, keeping it (and its subtree) alive as a root.
    pub fn detach(&mut self, id: HostId) {
        self.move_to(id, None, 0);
    }

    /// Returns true if `id` refers to a live host.
    pub fn is_alive(&self, id: HostId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .map(|n| n.generation == id.1)
            .unwrap_or(false)
    }

    /// Returns the parent of a host if live, or `None` for roots or stale ids.
    pub fn parent_of(&self, id: HostId) -> Option<HostId> {
        if !self.is_alive(id) {
            return None;
        }
        self.node(id).parent
    }

    /// Get the children of a host, or an empty slice if it is stale.
    pub fn children_of(&self, id: HostId) -> &[HostId] {
        if !self.is_alive(id) {
            return &[];
        }
        &self.node(id).children
    }

    /// Returns `true` if `ancestor` is a proper ancestor of `id`.
    pub fn is_ancestor_of(&self, ancestor: HostId, id: HostId) -> bool {
        let mut current = self.parent_of(id);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent_of(p);
        }
        false
    }

    /// Get the next host in depth-first traversal order.
    ///
    /// Returns `None` if no next host exists or if `current` is stale.
    /// This is a standard tree traversal that does not wrap around.
    pub fn next_depth_first(&self, current: HostId) -> Option<HostId> {
        if !self.is_alive(current) {
            return None;
        }
        if let Some(&first_child) = self.node(current).children.first() {
            return Some(first_child);
        }
        let mut node = current;
        while let Some(parent) = self.parent_of(node) {
            if let Some(next_sibling) = self.next_sibling(node, parent) {
                return Some(next_sibling);
            }
            node = parent;
        }
        None
    }

    /// Number of live hosts.
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free_list.len()
    }

    /// Returns `true` if there are no live hosts.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- internals ---

    fn allocate(&mut self) -> HostId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "HostId stores 32-bit slot indices."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "HostId stores 32-bit slot indices."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        HostId::new(idx, generation)
    }

    fn node(&self, id: HostId) -> &Node {
        self.nodes[id.idx()]
            .as_ref()
            .expect("dangling HostId")
    }

    fn node_mut(&mut self, id: HostId) -> &mut Node {
        self.nodes[id.idx()]
            .as_mut()
            .expect("dangling HostId")
    }

    fn next_sibling(&self, node: HostId, parent: HostId) -> Option<HostId> {
        let siblings = &self.node(parent).children;
        let pos = siblings.iter().position(|&id| id == node)?;
        siblings.get(pos + 1).copied()
    }

    fn link_parent(&mut self, id: HostId, parent: HostId, position: usize) {
        let children = &mut self.node_mut(parent).children;
        let position = position.min(children.len());
        children.insert(position, id);
        self.node_mut(id).parent = Some(parent);
    }

    fn unlink_parent(&mut self, id: HostId, parent: HostId) {
        self.node_mut(parent).children.retain(|c| *c != id);
        self.node_mut(id).parent = None;
    }
}

impl Node {
    fn new(generation: u32) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
        }
    }
}

impl Traversal<HostId> for HostTree {
    fn contains(&self, root: HostId, host: HostId) -> bool {
        self.is_alive(root) && self.is_ancestor_of(root, host)
    }

    fn visit_descendants<F: FnMut(HostId)>(&self, root: HostId, mut f: F) {
        if !self.is_alive(root) {
            return;
        }
        // Pre-order walk; children are pushed reversed so they pop in sibling order.
        let mut stack: Vec<HostId> = self.node(root).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            f(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
    }
}
