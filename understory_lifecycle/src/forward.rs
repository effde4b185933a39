// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Forwarding a changing list of host bindings onto one host.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::fmt;
use core::ops::Deref;

use hashbrown::HashSet;
use smallvec::SmallVec;
use tracing::trace;

use crate::collectable::{Carrier, Collectable};

/// Hooks a [`Binding`] hands back after mounting.
///
/// Both hooks are optional; [`BindingHooks::none`] is the "mounted, nothing to
/// update or tear down" result.
pub struct BindingHooks<P> {
    update: Option<Box<dyn FnMut(&P)>>,
    destroy: Option<Box<dyn FnOnce()>>,
}

impl<P> BindingHooks<P> {
    /// No hooks.
    pub fn none() -> Self {
        Self {
            update: None,
            destroy: None,
        }
    }

    /// Called with the new parameter when it changes between forwarder updates.
    pub fn on_update(mut self, update: impl FnMut(&P) + 'static) -> Self {
        self.update = Some(Box::new(update));
        self
    }

    /// Called once when the binding is removed or the forwarder is destroyed.
    pub fn on_destroy(mut self, destroy: impl FnOnce() + 'static) -> Self {
        self.destroy = Some(Box::new(destroy));
        self
    }
}

impl<P> Default for BindingHooks<P> {
    fn default() -> Self {
        Self::none()
    }
}

impl<P> fmt::Debug for BindingHooks<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingHooks")
            .field("update", &self.update.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

/// Identity of a [`Binding`]. Clones of a binding share one identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindingId(usize);

/// A side effect that can be attached to a host with a parameter.
///
/// Mounting calls the function with the host and the parameter; the returned
/// [`BindingHooks`] receive later parameter changes and the final teardown.
///
/// Identity is the allocation behind the binding: clone a binding to pass the
/// same one in successive lists, and construct a new one to get a new identity.
pub struct Binding<H, P> {
    mount: Rc<dyn Fn(&H, &P) -> BindingHooks<P>>,
}

impl<H, P> Binding<H, P> {
    /// Wrap a mount function.
    pub fn new(mount: impl Fn(&H, &P) -> BindingHooks<P> + 'static) -> Self {
        Self {
            mount: Rc::new(mount),
        }
    }

    /// This binding's identity.
    pub fn id(&self) -> BindingId {
        BindingId(Rc::as_ptr(&self.mount).cast::<()>() as usize)
    }
}

impl<H, P> Clone for Binding<H, P> {
    fn clone(&self) -> Self {
        Self {
            mount: self.mount.clone(),
        }
    }
}

impl<H, P> fmt::Debug for Binding<H, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Binding").field(&self.id()).finish()
    }
}

/// A parameter compared by reference instead of by value.
///
/// Two `ByRef`s are equal only if they share an allocation, so a structurally
/// equal but freshly built parameter counts as a change.
pub struct ByRef<T>(pub Rc<T>);

impl<T> ByRef<T> {
    /// Allocate a new reference-compared parameter.
    pub fn new(value: T) -> Self {
        Self(Rc::new(value))
    }
}

impl<T> Clone for ByRef<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> PartialEq for ByRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Eq for ByRef<T> {}

impl<T> Deref for ByRef<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for ByRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ByRef").field(&*self.0).finish()
    }
}

struct Tracked<H, P> {
    binding: Binding<H, P>,
    parameter: P,
    hooks: BindingHooks<P>,
}

/// Keeps a host's attached bindings in sync with the latest list.
///
/// Each call to [`BindingForwarder::update`] diffs the new list against the
/// tracked bindings by identity:
/// 1. Unseen bindings are mounted immediately, in list order.
/// 2. Seen bindings are kept; if their parameter changed (`PartialEq`), their
///    update hook is called once with the new parameter.
/// 3. After the whole list is processed, tracked bindings absent from it are
///    destroyed and forgotten.
///
/// All mounts and updates of one call happen before any of its removals.
/// Panics raised by mount functions or hooks are not caught.
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use understory_lifecycle::{Binding, BindingForwarder, BindingHooks};
///
/// let width = Rc::new(Cell::new(0));
/// let w = width.clone();
/// let sized = Binding::new(move |_host: &&str, px: &u32| {
///     w.set(*px);
///     let w = w.clone();
///     BindingHooks::none().on_update(move |px: &u32| w.set(*px))
/// });
///
/// let mut forwarder = BindingForwarder::new("panel", [(sized.clone(), 10)]);
/// forwarder.update([(sized, 20)]);
/// assert_eq!(width.get(), 20);
/// forwarder.update([]);
/// assert!(forwarder.is_empty());
/// ```
pub struct BindingForwarder<H, P> {
    host: H,
    tracked: SmallVec<[Tracked<H, P>; 4]>,
}

impl<H: fmt::Debug, P> fmt::Debug for BindingForwarder<H, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingForwarder")
            .field("host", &self.host)
            .field("bindings", &self.tracked.len())
            .finish_non_exhaustive()
    }
}

impl<H, P: PartialEq> BindingForwarder<H, P> {
    /// Mount every binding in `bindings` on `host`, in order.
    pub fn new<I>(host: H, bindings: I) -> Self
    where
        I: IntoIterator<Item = (Binding<H, P>, P)>,
    {
        let mut forwarder = Self {
            host,
            tracked: SmallVec::new(),
        };
        forwarder.update(bindings);
        forwarder
    }

    /// The host bindings are attached to.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Number of tracked bindings.
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// Returns `true` if no bindings are tracked.
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Returns `true` if `binding` is currently attached.
    pub fn contains(&self, binding: &Binding<H, P>) -> bool {
        self.position(binding.id()).is_some()
    }

    /// The last parameter forwarded to `binding`, if it is attached.
    pub fn parameter(&self, binding: &Binding<H, P>) -> Option<&P> {
        self.position(binding.id())
            .map(|pos| &self.tracked[pos].parameter)
    }

    /// Diff `bindings` against the tracked set and apply the changes.
    pub fn update<I>(&mut self, bindings: I)
    where
        I: IntoIterator<Item = (Binding<H, P>, P)>,
    {
        let (mut mounted, mut updated, mut removed) = (0_usize, 0_usize, 0_usize);
        // Per call: ids seen by an earlier call that unwound must not count as kept.
        let mut kept = HashSet::new();

        for (binding, parameter) in bindings {
            let id = binding.id();
            if let Some(pos) = self.position(id) {
                let entry = &mut self.tracked[pos];
                if entry.parameter != parameter {
                    if let Some(update) = entry.hooks.update.as_mut() {
                        update(&parameter);
                    }
                    entry.parameter = parameter;
                    updated += 1;
                }
            } else {
                let hooks = (binding.mount)(&self.host, &parameter);
                self.tracked.push(Tracked {
                    binding,
                    parameter,
                    hooks,
                });
                mounted += 1;
            }
            kept.insert(id);
        }

        let mut i = 0;
        while i < self.tracked.len() {
            if kept.contains(&self.tracked[i].binding.id()) {
                i += 1;
                continue;
            }
            let entry = self.tracked.remove(i);
            if let Some(destroy) = entry.hooks.destroy {
                destroy();
            }
            removed += 1;
        }

        trace!(mounted, updated, removed, "forwarded bindings");
    }

    /// Destroy every tracked binding. Later calls are no-ops until new
    /// bindings are forwarded.
    pub fn destroy(&mut self) {
        let count = self.tracked.len();
        for entry in self.tracked.drain(..) {
            if let Some(destroy) = entry.hooks.destroy {
                destroy();
            }
        }
        trace!(count, "destroyed forwarded bindings");
    }

    fn position(&self, id: BindingId) -> Option<usize> {
        self.tracked.iter().position(|t| t.binding.id() == id)
    }
}

impl<H: 'static, P: PartialEq + 'static> Carrier for BindingForwarder<H, P> {
    fn into_destroy(self: Box<Self>) -> Collectable {
        let mut forwarder = self;
        Collectable::callback(move || forwarder.destroy())
    }
}
