// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The lifecycle participant contract.
//!
//! Any object managed by an [`Activator`](crate::activator::Activator) implements
//! [`Participant`]. Every hook has a default that answers affirmatively and does nothing,
//! so a participant only overrides the phases it cares about.
//!
//! ```
//! use understory_activator::participant::Participant;
//! use understory_activator::types::{ActivationData, LifecycleError, Response};
//!
//! struct Editor {
//!     dirty: bool,
//! }
//!
//! #[async_trait::async_trait(?Send)]
//! impl Participant for Editor {
//!     async fn can_deactivate(&self, _close: bool) -> Result<Response, LifecycleError> {
//!         Ok(Response::from(!self.dirty))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::types::{ActivationData, LifecycleError, Response};

/// An object with optional lifecycle hooks.
///
/// Hooks are awaited by the activator in the order
/// `can_deactivate` (outgoing) → `can_activate` (incoming) → `deactivate` (outgoing) → `activate` (incoming).
/// Returning `Err` from a guard is treated as a refusal; returning `Err` from
/// `activate`/`deactivate` fails that step. Neither is propagated to the caller.
#[async_trait(?Send)]
pub trait Participant {
    /// Whether this item may become active with the given data.
    async fn can_activate(&self, _data: &ActivationData) -> Result<Response, LifecycleError> {
        Ok(Response::Bool(true))
    }

    /// Called when the item becomes active.
    async fn activate(&self, _data: &ActivationData) -> Result<(), LifecycleError> {
        Ok(())
    }

    /// Whether this item may stop being active. `close` is true when it is also being closed.
    async fn can_deactivate(&self, _close: bool) -> Result<Response, LifecycleError> {
        Ok(Response::Bool(true))
    }

    /// Called when the item stops being active.
    async fn deactivate(&self, _close: bool) -> Result<(), LifecycleError> {
        Ok(())
    }

    /// True for objects that run the activation protocol themselves.
    ///
    /// Consumers such as composition skip their own activation step for these.
    fn is_activator(&self) -> bool {
        false
    }
}
