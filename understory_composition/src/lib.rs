// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_composition --heading-base-level=0

//! Understory Composition: bind view models to views in a retained view tree.
//!
//! ## Overview
//!
//! A [`CompositionEngine`](crate::engine::CompositionEngine) takes a
//! [`CompositionRequest`](crate::request::CompositionRequest) and a host element, then:
//! locates a view for the model, activates the model, binds the view, swaps it into the host
//! (optionally through a [`Transition`](crate::transition::Transition)), and runs the attach hooks.
//!
//! Views live in a [`ViewTree`](crate::view::ViewTree), a generational arena of elements with
//! visibility and activity flags. Models implement [`ViewModel`](crate::model::ViewModel), which
//! extends the activation [`Participant`](understory_activator::participant::Participant) with
//! attach, detach, and completion hooks.
//!
//! ## Transactions
//!
//! Compositions started while others are in flight, including ones started from an `attached`
//! hook, share a [`CompositionTransaction`](crate::transaction::CompositionTransaction).
//! Completion callbacks run once, after the last composition finishes, in registration order.
//!
//! ## Caching and parts
//!
//! With [`CACHE_VIEWS`](crate::request::CompositionFlags::CACHE_VIEWS) a host keeps superseded
//! views hidden and reuses them. Replacement parts are spliced into a view by matching
//! `part` names, see [`parts`](crate::parts).
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//!
//! use futures::executor::LocalPool;
//! use understory_activator::participant::Participant;
//! use understory_composition::engine::CompositionEngine;
//! use understory_composition::model::ViewModel;
//! use understory_composition::provider::TemplateLocator;
//! use understory_composition::request::CompositionRequest;
//! use understory_composition::view::{ViewNode, ViewTree};
//!
//! struct Settings;
//!
//! impl Participant for Settings {}
//! impl ViewModel for Settings {
//!     fn view(&self) -> Option<String> {
//!         Some("settings".into())
//!     }
//! }
//!
//! let tree = ViewTree::shared();
//! let host = tree.borrow_mut().insert(None, ViewNode::new("main"));
//! let locator = Rc::new(TemplateLocator::new());
//! locator.register_element("settings", "form");
//!
//! let mut pool = LocalPool::new();
//! let engine = CompositionEngine::builder(tree.clone(), pool.spawner())
//!     .locator(locator)
//!     .build();
//!
//! engine.compose(host, CompositionRequest::new().model(Rc::new(Settings)), None);
//! pool.run_until_stalled();
//!
//! let tree = tree.borrow();
//! let view = tree.children(host)[0];
//! assert_eq!(tree.get(view).unwrap().tag, "form");
//! assert!(tree.is_active(view));
//! ```

pub mod engine;
pub mod error;
pub mod model;
pub mod parts;
pub mod provider;
pub mod request;
pub mod transaction;
pub mod transition;
pub mod view;
