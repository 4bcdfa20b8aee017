// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The composition transaction: an in-flight counter plus a queue of completion callbacks.
//!
//! Every composition increments the counter when it starts and decrements it exactly once
//! when it ends, whatever the outcome. A composition started while another is in flight
//! joins the same transaction, so completion callbacks wait for nested compositions too.
//! When the counter returns to zero the queue is handed back to the engine, which runs it
//! on a later turn of the executor.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::warn;

use crate::error::CompositionError;

/// A callback queued until the current transaction completes.
pub type CompletionCallback = Box<dyn FnOnce() -> Result<(), CompositionError>>;

/// Shared transaction state. Cloning produces another handle to the same transaction.
#[derive(Clone, Default)]
pub struct CompositionTransaction {
    inner: Rc<State>,
}

#[derive(Default)]
struct State {
    in_flight: Cell<usize>,
    queue: RefCell<Vec<CompletionCallback>>,
}

impl core::fmt::Debug for CompositionTransaction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompositionTransaction")
            .field("in_flight", &self.in_flight())
            .field("queued", &self.inner.queue.borrow().len())
            .finish()
    }
}

impl CompositionTransaction {
    /// Create an idle transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a callback for when the current transaction completes.
    pub fn complete(&self, callback: impl FnOnce() -> Result<(), CompositionError> + 'static) {
        self.inner.queue.borrow_mut().push(Box::new(callback));
    }

    /// Number of compositions in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.get()
    }

    /// True while any composition is in flight.
    pub fn is_composing(&self) -> bool {
        self.in_flight() > 0
    }

    pub(crate) fn begin(&self) {
        self.inner.in_flight.set(self.in_flight() + 1);
    }

    /// Returns the queued callbacks when this was the last composition in flight.
    ///
    /// A failed final composition discards them.
    pub(crate) fn end(&self, failed: bool) -> Option<Vec<CompletionCallback>> {
        let Some(remaining) = self.in_flight().checked_sub(1) else {
            warn!("composition ended without a matching begin");
            return None;
        };
        self.inner.in_flight.set(remaining);
        if remaining > 0 {
            return None;
        }
        let callbacks = self.inner.queue.take();
        if failed {
            drop(callbacks);
            return None;
        }
        Some(callbacks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_released_when_counter_returns_to_zero() {
        let tx = CompositionTransaction::new();
        tx.begin();
        tx.complete(|| Ok(()));
        tx.begin();
        tx.complete(|| Ok(()));

        assert!(tx.end(false).is_none());
        assert!(tx.is_composing());
        let callbacks = tx.end(false).unwrap();
        assert_eq!(callbacks.len(), 2);
        assert!(!tx.is_composing());
    }

    #[test]
    fn failed_final_composition_discards_queue() {
        let tx = CompositionTransaction::new();
        tx.begin();
        tx.complete(|| Ok(()));
        assert!(tx.end(true).is_none());

        // The next transaction starts clean.
        tx.begin();
        assert_eq!(tx.end(false).map(|c| c.len()), Some(0));
    }

    #[test]
    fn unbalanced_end_is_ignored() {
        let tx = CompositionTransaction::new();
        assert!(tx.end(false).is_none());
        assert_eq!(tx.in_flight(), 0);
    }
}
