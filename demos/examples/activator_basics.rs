// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Activator basics.
//!
//! Switches between two screens, one of which guards its exit with a JSON answer,
//! and prints what the activator holds after each request.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example activator_basics`

use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use futures::executor::block_on;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use understory_activator::activator::Activator;
use understory_activator::participant::Participant;
use understory_activator::types::{ActivationData, ActivationOptions, LifecycleError, Response};

struct Screen {
    name: &'static str,
    dirty: Cell<bool>,
}

impl Screen {
    fn new(name: &'static str) -> Rc<Self> {
        Rc::new(Self {
            name,
            dirty: Cell::new(false),
        })
    }
}

#[async_trait(?Send)]
impl Participant for Screen {
    async fn activate(&self, data: &ActivationData) -> Result<(), LifecycleError> {
        println!("  {} activated with {:?}", self.name, data.args());
        Ok(())
    }

    async fn can_deactivate(&self, close: bool) -> Result<Response, LifecycleError> {
        println!("  {} asked to leave (close: {close})", self.name);
        Ok(Response::Value(json!({ "can": !self.dirty.get() })))
    }

    async fn deactivate(&self, close: bool) -> Result<(), LifecycleError> {
        println!("  {} deactivated (close: {close})", self.name);
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let activator: Activator<Screen> = Activator::new();
    activator.subscribe(|item| {
        println!("  -> active: {:?}", item.map(|s| s.name));
    });

    let editor = Screen::new("editor");
    let preview = Screen::new("preview");
    let open = |screen: &Rc<Screen>, data: ActivationData| {
        block_on(activator.activate_item(Some(screen.clone()), data, ActivationOptions::default()))
    };

    println!("== Open editor ==");
    let ok = open(&editor, ActivationData::from(json!("draft.md")));
    println!("  switched: {ok}");

    println!("== Unsaved changes block the switch ==");
    editor.dirty.set(true);
    let ok = open(&preview, ActivationData::None);
    println!("  switched: {ok}");

    println!("== Saved, switch again ==");
    editor.dirty.set(false);
    let ok = open(&preview, ActivationData::None);
    println!("  switched: {ok}");

    println!("== Close the active screen ==");
    let closed = block_on(activator.deactivate_item(Some(&preview), true));
    println!("  closed: {closed}, active: {:?}", activator.active_item().map(|s| s.name));
}
