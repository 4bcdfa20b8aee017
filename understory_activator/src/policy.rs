// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Activator configuration: plain settings plus overridable policy hooks.

use std::rc::Rc;

use crate::activator::Activator;
use crate::participant::Participant;
use crate::types::{ActivationData, DEFAULT_AFFIRMATIONS, Response};

/// Plain configuration for an [`Activator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivatorSettings {
    /// Value passed as the `close` flag when the outgoing item is deactivated.
    pub close_on_deactivate: bool,
    /// Words accepted as an affirmative guard answer, compared ignoring case.
    pub affirmations: Vec<String>,
}

impl Default for ActivatorSettings {
    fn default() -> Self {
        Self {
            close_on_deactivate: true,
            affirmations: DEFAULT_AFFIRMATIONS.iter().map(|&a| a.into()).collect(),
        }
    }
}

/// Write access to an activator's current item, handed to
/// [`ActivationPolicy::after_deactivate`].
pub struct Slot<'a, T: ?Sized + Participant + 'static> {
    pub(crate) activator: &'a Activator<T>,
}

impl<T: ?Sized + Participant + 'static> Slot<'_, T> {
    /// The item currently held by the slot.
    pub fn get(&self) -> Option<Rc<T>> {
        self.activator.active_item()
    }

    /// Replace the held item without running the protocol.
    pub fn set(&self, item: Option<Rc<T>>) {
        self.activator.force_active_item(item);
    }

    /// Empty the slot.
    pub fn clear(&self) {
        self.set(None);
    }
}

impl<T: ?Sized + Participant + 'static> core::fmt::Debug for Slot<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Slot")
            .field("occupied", &self.get().is_some())
            .finish()
    }
}

/// Policy hooks consulted by an [`Activator`].
///
/// Every method has a default implementing the standard behavior, so implementors
/// override only what they need. See [`DefaultPolicy`].
pub trait ActivationPolicy<T: ?Sized + Participant + 'static> {
    /// Interpret a guard answer.
    fn interpret_response(&self, response: &Response, affirmations: &[String]) -> bool {
        response.interpret(affirmations)
    }

    /// Whether `next` is the item already held; such requests complete as no-ops.
    ///
    /// Defaults to identity.
    fn are_same_item(
        &self,
        current: Option<&Rc<T>>,
        next: Option<&Rc<T>>,
        _current_data: &ActivationData,
        _next_data: &ActivationData,
    ) -> bool {
        match (current, next) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Substitute the item immediately before it is activated.
    fn before_activate(&self, new_item: Option<Rc<T>>, _data: &ActivationData) -> Option<Rc<T>> {
        new_item
    }

    /// Runs after `old_item` deactivated successfully.
    ///
    /// `slot` is present when the deactivation was requested directly rather than as
    /// part of an activation. The default empties it when closing.
    fn after_deactivate(&self, _old_item: &Rc<T>, close: bool, slot: Option<&Slot<'_, T>>) {
        if close && let Some(slot) = slot {
            slot.clear();
        }
    }

    /// A nested activator owned by `item`, which must agree before `item` can deactivate.
    fn find_child_activator(&self, _item: &Rc<T>) -> Option<Rc<dyn Participant>> {
        None
    }
}

/// The standard policy: identity comparison, no substitution, clear-on-close, no children.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultPolicy;

impl<T: ?Sized + Participant + 'static> ActivationPolicy<T> for DefaultPolicy {}
