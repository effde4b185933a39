// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_lifecycle --heading-base-level=0

//! Understory Lifecycle: mount and teardown primitives for headless UI.
//!
//! Widgets set up side effects when they mount (subscriptions, host bindings,
//! timers) and must tear every one of them down exactly once when they
//! unmount, regardless of how the setup was shaped. This crate models that as:
//!
//! - [`Collectable`]: a tagged description of zero or more pending cleanups.
//!   Leaves are callbacks; branches are sequences, deferred futures, and
//!   [`Carrier`]s (objects that own cleanup, such as [`BindingForwarder`]).
//! - [`Resolver`]: fires every callback reachable from a collectable. Deferred
//!   branches are spawned on a caller-supplied executor (any
//!   [`futures_task::LocalSpawn`]) and resolved when they settle.
//! - [`Disposer`]: a one-shot cleanup handle. Disposing twice is a no-op.
//! - [`Lifecycle`]: a `before_init` → `init` → `after_init` mount sequence that
//!   returns one [`Disposer`] for everything the phases returned, with a
//!   `before_collection` hook that runs first at teardown.
//! - [`BindingForwarder`]: keeps a host's attached [`Binding`]s in sync with a
//!   changing list, mounting, updating, and destroying them incrementally.
//! - [`Observable`] / [`Writable`] and [`Signal`]: the publish-on-change state
//!   seam widgets use to talk to each other.
//!
//! ## Minimal example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use futures::executor::LocalPool;
//! use understory_lifecycle::{Lifecycle, Observable, Resolver, Signal, Writable};
//!
//! let pool = LocalPool::new();
//! let resolver = Resolver::new(pool.spawner());
//!
//! let open = Signal::new(false);
//! let seen = Rc::new(Cell::new(0));
//!
//! let (o, s) = (open.clone(), seen.clone());
//! let mut unmount = Lifecycle::new(move || {
//!     // The unsubscribe handle is the cleanup for this phase.
//!     o.subscribe(Box::new(move |_: &bool| s.set(s.get() + 1)))
//! })
//! .run(&resolver);
//!
//! open.set(true);
//! unmount.dispose();
//! open.set(false);
//! assert_eq!(seen.get(), 1);
//! assert_eq!(open.subscriber_count(), 0);
//! ```
//!
//! ## Teardown contract
//!
//! - Every reachable callback fires exactly once per resolve; a [`Collectable`]
//!   cannot be cloned, so the same leaf cannot be handed over twice.
//! - [`Disposer`]s are idempotent and never run on drop.
//! - A deferred cleanup that fails is logged through `tracing` and dropped. It is
//!   not reported to whoever triggered the teardown, and there is no way to
//!   cancel a deferred cleanup once it has been scheduled.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod collectable;
mod collector;
mod disposer;
mod error;
mod forward;
mod observable;

pub use collectable::{Carrier, Collectable, DeferredCollectable, Resolver};
pub use collector::Lifecycle;
pub use disposer::Disposer;
pub use error::CollectError;
pub use forward::{Binding, BindingForwarder, BindingHooks, BindingId, ByRef};
pub use observable::{Observable, Signal, Writable};

pub use futures_task;
