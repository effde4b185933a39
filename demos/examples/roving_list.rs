// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A menu with a roving tab stop whose items get reordered while it is open.
//!
//! This example shows how to combine:
//! - `understory_lifecycle` to mount items and collect their teardown,
//! - `understory_roving` to keep item indices in document order and move the
//!   active item with the keyboard,
//! - a `BindingForwarder` per item to keep a `tabindex`-like attribute in sync
//!   with the cursor.
//!
//! Run:
//! - `cargo run -p understory_demos --example roving_list`

use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::LocalPool;
use tracing::Level;
use understory_lifecycle::{
    Binding, BindingForwarder, BindingHooks, Collectable, Lifecycle, Observable, Resolver, Signal,
    Writable,
};
use understory_roving::{
    HostId, HostTree, Navigation, OrderedIndex, Reconciler, RovingCursor,
};

#[derive(Clone, Debug)]
struct MenuItem {
    label: &'static str,
    disabled: bool,
}

fn print_order(title: &str, index: &OrderedIndex<HostId, MenuItem>) {
    let labels: Vec<_> = (0..index.len())
        .filter_map(|i| index.get_at(i))
        .map(|item| item.payload().label)
        .collect();
    println!("{title}: {labels:?}");
}

fn tab_index(stop: bool) -> i32 {
    if stop { 0 } else { -1 }
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let mut pool = LocalPool::new();
    let resolver = Resolver::new(pool.spawner());

    let tree = Rc::new(RefCell::new(HostTree::new()));
    let menu = tree.borrow_mut().insert(None);
    let index = OrderedIndex::new();

    // Order only matters while the user is driving the menu with the keyboard.
    let keyboard_mode = Signal::new(true);
    let k = keyboard_mode.clone();
    let mut reconciler =
        Reconciler::new(index.clone(), tree.clone(), menu).with_gate(move || k.get());
    reconciler.watch(&keyboard_mode);

    // Items register as they mount; the index records registration order.
    let mut hosts = Vec::new();
    let mut unmount = Vec::new();
    for (label, disabled) in [("Cut", false), ("Copy", false), ("Paste", true), ("Delete", false)] {
        let host = tree.borrow_mut().insert(Some(menu));
        let index = index.clone();
        let disposer = Lifecycle::new(move || match index.add(host, MenuItem { label, disabled }) {
            Ok((_item, remove)) => Collectable::from(remove),
            Err(err) => {
                eprintln!("{label}: {err}");
                Collectable::None
            }
        })
        .run(&resolver);
        hosts.push(host);
        unmount.push(disposer);
    }
    print_order("registered", &index);

    let cursor = RovingCursor::new(index.clone()).with_filter(|item: &MenuItem| !item.disabled);
    let tab_stop = Binding::new(|host: &HostId, stop: &bool| {
        let host = *host;
        println!("  mount {host:?} tabindex={}", tab_index(*stop));
        BindingHooks::none()
            .on_update(move |stop: &bool| println!("  {host:?} tabindex={}", tab_index(*stop)))
            .on_destroy(move || println!("  {host:?} tabindex removed"))
    });
    let mut forwarders: Vec<_> = hosts
        .iter()
        .map(|host| BindingForwarder::new(*host, [(tab_stop.clone(), cursor.is_tab_stop(*host))]))
        .collect();
    let sync = |forwarders: &mut Vec<BindingForwarder<HostId, bool>>| {
        for forwarder in forwarders.iter_mut() {
            let host = *forwarder.host();
            forwarder.update([(tab_stop.clone(), cursor.is_tab_stop(host))]);
        }
    };
    let active_label = || {
        cursor
            .active()
            .get()
            .and_then(|host| index.get(host))
            .map(|item| item.payload().label)
    };

    cursor.navigate(Navigation::Next);
    sync(&mut forwarders);
    println!("active: {:?}", active_label());

    // The framework moves "Cut" to the end of the menu.
    tree.borrow_mut().move_to(hosts[0], Some(menu), usize::MAX);
    println!("reconcile: {:?}", reconciler.trigger());
    print_order("after move", &index);

    // Disabled "Paste" is skipped; "Delete" follows "Copy".
    for _ in 0..2 {
        cursor.navigate(Navigation::Next);
        sync(&mut forwarders);
        println!("active: {:?}", active_label());
    }

    // Pointer interaction closes the gate, so reorders are not tracked...
    keyboard_mode.set(false);
    tree.borrow_mut().move_to(hosts[3], Some(menu), 0);
    println!("reconcile: {:?}", reconciler.trigger());
    print_order("pointer mode", &index);
    // ...until keyboard mode comes back and the watched signal runs a pass.
    keyboard_mode.set(true);
    print_order("keyboard mode", &index);

    // Close the menu: items, their bindings, then the reconciler.
    let teardown: Collectable = unmount
        .into_iter()
        .map(Collectable::from)
        .chain(forwarders.into_iter().map(Collectable::carrier))
        .chain([Collectable::carrier(reconciler)])
        .collect();
    resolver.resolve(teardown);
    pool.run_until_stalled();
    println!("members left: {}", index.len());
}
