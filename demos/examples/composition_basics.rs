// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composition basics.
//!
//! Composes two pages into a cached host with the entrance transition, then switches back,
//! printing the host's children and the lifecycle hooks as they run.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example composition_basics`

use std::rc::Rc;

use async_trait::async_trait;
use futures::executor::LocalPool;
use tracing_subscriber::EnvFilter;
use understory_activator::participant::Participant;
use understory_activator::types::{ActivationData, LifecycleError};
use understory_composition::engine::CompositionEngine;
use understory_composition::model::ViewModel;
use understory_composition::provider::TemplateLocator;
use understory_composition::request::{CompositionFlags, CompositionRequest};
use understory_composition::transition::Entrance;
use understory_composition::view::{SharedTree, ViewId, ViewNode, ViewTree};

struct Page(&'static str);

#[async_trait(?Send)]
impl Participant for Page {
    async fn activate(&self, _data: &ActivationData) -> Result<(), LifecycleError> {
        println!("  {} activated", self.0);
        Ok(())
    }
}

impl ViewModel for Page {
    fn view(&self) -> Option<String> {
        Some(self.0.into())
    }

    fn attached(&self, _view: ViewId, _parent: ViewId) -> Result<(), LifecycleError> {
        println!("  {} attached", self.0);
        Ok(())
    }

    fn composition_complete(&self, _view: Option<ViewId>, _parent: ViewId) -> Result<(), LifecycleError> {
        println!("  {} composition complete", self.0);
        Ok(())
    }
}

fn show_host(tree: &SharedTree, host: ViewId) {
    let tree = tree.borrow();
    for &child in tree.children(host) {
        println!(
            "  child {:?} view={:?} visible={} active={}",
            child,
            tree.view_id(child),
            tree.is_visible(child),
            tree.is_active(child)
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let tree = ViewTree::shared();
    let host = tree.borrow_mut().insert(None, ViewNode::new("main"));

    let locator = Rc::new(TemplateLocator::new());
    locator.register("inbox", |tree| {
        let root = tree.insert(None, ViewNode::new("section"));
        tree.insert(Some(root), ViewNode::new("h1").with_part("title"));
        root
    });
    locator.register_element("settings", "form");

    let mut pool = LocalPool::new();
    let engine = CompositionEngine::builder(tree.clone(), pool.spawner())
        .locator(locator)
        .default_transition(Entrance::NAME)
        .build();

    let inbox: Rc<dyn ViewModel> = Rc::new(Page("inbox"));
    let settings: Rc<dyn ViewModel> = Rc::new(Page("settings"));
    let request = |model: &Rc<dyn ViewModel>| {
        CompositionRequest::new()
            .model(model.clone())
            .flags(CompositionFlags::CACHE_VIEWS)
            .on_composition_complete(|view, _| println!("  request complete: {view:?}"))
    };

    for (label, model) in [("inbox", &inbox), ("settings", &settings), ("inbox again", &inbox)] {
        println!("== Compose {label} ==");
        engine.compose(host, request(model), None);
        pool.run_until_stalled();
        show_host(&tree, host);
    }
}
