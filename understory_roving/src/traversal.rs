// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The container view reconciliation reads document order from.

/// Read-only access to the live host hierarchy.
///
/// Implementations describe the "document": which hosts are currently
/// attached below a container, and in which order they appear. The order is
/// whatever the host framework treats as visual/reading order; for a tree it
/// is usually a pre-order depth-first walk.
pub trait Traversal<K> {
    /// Returns `true` if `host` is a live descendant of `root`.
    fn contains(&self, root: K, host: K) -> bool;

    /// Visit every live descendant of `root` in document order.
    ///
    /// Each descendant is visited exactly once; `root` itself is not visited.
    fn visit_descendants<F: FnMut(K)>(&self, root: K, f: F);
}
