// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_roving --heading-base-level=0

//! Understory Roving: order-reconciled item indices and roving-index navigation.
//!
//! Composite widgets (menus, listboxes, toolbars, tab lists) expose a single
//! tab stop and move it with the arrow keys in visual order. Their items mount
//! and unmount dynamically and can be reordered by the host framework, so the
//! order items registered in is not the order they appear in. This crate
//! models that as:
//!
//! - [`OrderedIndex`]: a mapping from host ids to [`OrderedItem`]s whose index
//!   is an observable [`Signal`](understory_lifecycle::Signal).
//! - [`Traversal`]: read-only access to the document, answering "is this host
//!   attached below the container" and "in which order do the hosts appear".
//! - [`OrderedIndex::reconcile`]: realigns indices with document order,
//!   rewriting only the suffix that starts at the first divergence.
//! - [`Reconciler`]: runs a reconcile pass whenever membership or any watched
//!   state changes, behind an optional gate.
//! - [`RovingCursor`]: the active item and [`Navigation`] over enabled items.
//! - [`HostTree`]: a small generational tree implementing [`Traversal`], useful
//!   as a document stand-in.
//!
//! ## Minimal example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use understory_roving::{HostTree, Navigation, OrderedIndex, Reconciler, RovingCursor};
//!
//! let tree = Rc::new(RefCell::new(HostTree::new()));
//! let (menu, items) = {
//!     let mut tree = tree.borrow_mut();
//!     let menu = tree.insert(None);
//!     let items = [tree.insert(Some(menu)), tree.insert(Some(menu)), tree.insert(Some(menu))];
//!     (menu, items)
//! };
//!
//! let index = OrderedIndex::new();
//! let reconciler = Reconciler::new(index.clone(), tree.clone(), menu);
//! let _members: Vec<_> = items.iter().map(|h| index.add(*h, ()).unwrap()).collect();
//!
//! // The framework moves the first item to the end.
//! tree.borrow_mut().move_to(items[0], Some(menu), usize::MAX);
//! reconciler.trigger();
//! assert_eq!(index.index_of(items[0]), Some(2));
//!
//! let cursor = RovingCursor::new(index);
//! assert_eq!(cursor.navigate(Navigation::First), Some(items[1]));
//! assert_eq!(cursor.navigate(Navigation::Prev), Some(items[0]));
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod error;
mod index;
mod reconcile;
mod roving;
mod traversal;
mod tree;

pub use error::IndexError;
pub use index::{OrderedIndex, OrderedItem, ReconcileOutcome};
pub use reconcile::Reconciler;
pub use roving::{Navigation, RovingCursor, WrapMode};
pub use traversal::Traversal;
pub use tree::{HostId, HostTree};
