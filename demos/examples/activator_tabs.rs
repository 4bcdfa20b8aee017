// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tab strip on a list-mode activator.
//!
//! Opens three documents, closes the active one and lets the activator pick a neighbor,
//! then tries to close everything while one document still has unsaved changes.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example activator_tabs`

use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use futures::executor::LocalPool;
use tracing_subscriber::EnvFilter;
use understory_activator::activator::Activator;
use understory_activator::list::ItemList;
use understory_activator::participant::Participant;
use understory_activator::types::{ActivationData, ActivationOptions, LifecycleError, Response};

struct Document {
    title: &'static str,
    unsaved: Cell<bool>,
}

impl Document {
    fn new(title: &'static str) -> Rc<Self> {
        Rc::new(Self {
            title,
            unsaved: Cell::new(false),
        })
    }
}

#[async_trait(?Send)]
impl Participant for Document {
    async fn can_deactivate(&self, close: bool) -> Result<Response, LifecycleError> {
        // Switching tabs is always fine; closing needs saved work.
        Ok(Response::from(!close || !self.unsaved.get()))
    }

    async fn deactivate(&self, close: bool) -> Result<(), LifecycleError> {
        if close {
            println!("  closed {}", self.title);
        }
        Ok(())
    }
}

fn titles(tabs: &ItemList<Document>) -> Vec<&'static str> {
    tabs.snapshot().iter().map(|d| d.title).collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let tabs = ItemList::new();
    let activator: Activator<Document> = Activator::new().for_items(tabs.clone());
    let docs = [Document::new("a.rs"), Document::new("b.rs"), Document::new("c.rs")];

    let mut pool = LocalPool::new();
    let run = |pool: &mut LocalPool, item: Option<Rc<Document>>| {
        pool.run_until(activator.activate_item(item, ActivationData::None, ActivationOptions::default()))
    };

    println!("== Open three tabs ==");
    for doc in &docs {
        run(&mut pool, Some(doc.clone()));
    }
    println!("  tabs: {:?}", titles(&tabs));

    println!("== Select b.rs and close it ==");
    run(&mut pool, Some(docs[1].clone()));
    let closed = pool.run_until(activator.deactivate_item(Some(&docs[1]), true));
    println!("  closed: {closed}, tabs: {:?}", titles(&tabs));
    run(&mut pool, None);
    println!("  active: {:?}", activator.active_item().map(|d| d.title));

    println!("== Close all with unsaved work in a.rs ==");
    docs[0].unsaved.set(true);
    let closed = pool.run_until(activator.deactivate(true));
    println!("  all closed: {closed}, remaining: {:?}", titles(&tabs));
    println!("  active: {:?}", activator.active_item().map(|d| d.title));
}
