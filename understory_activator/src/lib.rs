// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_activator --heading-base-level=0

//! Understory Activator: an asynchronous activation lifecycle for screens, dialogs, and tabs.
//!
//! ## Overview
//!
//! An [`Activator`](crate::activator::Activator) holds at most one active item and replaces it
//! through a four-step protocol of awaited hooks:
//! `can_deactivate` (outgoing) → `can_activate` (incoming) → `deactivate` (outgoing) → `activate` (incoming).
//! Items implement [`Participant`](crate::participant::Participant); every hook is optional.
//!
//! ## Guards
//!
//! Guard hooks answer with a [`Response`](crate::types::Response): a boolean, an affirmation word
//! such as `"Yes"`, or a JSON value like `{ "can": false }`. Any negative answer leaves the
//! current item in place. Hook errors are logged through `tracing` and count as a refusal; they
//! are never returned to the caller.
//!
//! ## Concurrency
//!
//! Everything runs on one thread. At most one activation is in flight per activator, and a
//! request made while another is pending resolves `false` without queueing.
//!
//! ## Customization
//!
//! - [`ActivatorSettings`](crate::policy::ActivatorSettings) holds plain values: the close flag
//!   used when switching, and the affirmation words.
//! - [`ActivationPolicy`](crate::policy::ActivationPolicy) holds overridable behavior: identity,
//!   item substitution, post-deactivation cleanup, and nested activator lookup.
//! - [`Activator::for_items`](crate::activator::Activator::for_items) switches to list mode
//!   for tab strips, see [`list`](crate::list).
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//!
//! use futures::executor::block_on;
//! use understory_activator::activator::Activator;
//! use understory_activator::participant::Participant;
//! use understory_activator::types::{ActivationData, ActivationOptions, LifecycleError, Response};
//!
//! struct Page {
//!     locked: bool,
//! }
//!
//! #[async_trait::async_trait(?Send)]
//! impl Participant for Page {
//!     async fn can_deactivate(&self, _close: bool) -> Result<Response, LifecycleError> {
//!         Ok(Response::from(!self.locked))
//!     }
//! }
//!
//! let activator: Activator<Page> = Activator::new();
//! let home = Rc::new(Page { locked: true });
//! let about = Rc::new(Page { locked: false });
//!
//! let switch = |item: &Rc<Page>| {
//!     block_on(activator.activate_item(
//!         Some(item.clone()),
//!         ActivationData::None,
//!         ActivationOptions::default(),
//!     ))
//! };
//!
//! assert!(switch(&home));
//! // `home` refuses to let go.
//! assert!(!switch(&about));
//! assert!(Rc::ptr_eq(&activator.active_item().unwrap(), &home));
//! ```

pub mod activator;
pub mod list;
pub mod participant;
pub mod policy;
pub mod tick;
pub mod types;

#[cfg(test)]
mod test_support;
