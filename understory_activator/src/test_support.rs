// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures for unit tests.

use core::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::channel::oneshot;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

use crate::participant::Participant;
use crate::types::{ActivationData, LifecycleError, Response};

pub(crate) type Log = Rc<RefCell<Vec<String>>>;

pub(crate) fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

/// A participant that records every hook call into a shared log.
pub(crate) struct Probe {
    pub(crate) name: &'static str,
    log: Log,
    can_activate: RefCell<Result<Response, LifecycleError>>,
    can_deactivate: RefCell<Result<Response, LifecycleError>>,
    activate_result: RefCell<Result<(), LifecycleError>>,
    deactivate_result: RefCell<Result<(), LifecycleError>>,
    gate: RefCell<Option<oneshot::Receiver<()>>>,
    pub(crate) seen: RefCell<Vec<ActivationData>>,
}

impl Probe {
    pub(crate) fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: log.clone(),
            can_activate: RefCell::new(Ok(Response::Bool(true))),
            can_deactivate: RefCell::new(Ok(Response::Bool(true))),
            activate_result: RefCell::new(Ok(())),
            deactivate_result: RefCell::new(Ok(())),
            gate: RefCell::new(None),
            seen: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn with_can_activate(self, response: impl Into<Response>) -> Self {
        *self.can_activate.borrow_mut() = Ok(response.into());
        self
    }

    pub(crate) fn with_can_deactivate(self, response: impl Into<Response>) -> Self {
        *self.can_deactivate.borrow_mut() = Ok(response.into());
        self
    }

    pub(crate) fn failing_can_activate(self, err: LifecycleError) -> Self {
        *self.can_activate.borrow_mut() = Err(err);
        self
    }

    pub(crate) fn failing_can_deactivate(self, err: LifecycleError) -> Self {
        *self.can_deactivate.borrow_mut() = Err(err);
        self
    }

    pub(crate) fn failing_activate(self, err: LifecycleError) -> Self {
        *self.activate_result.borrow_mut() = Err(err);
        self
    }

    pub(crate) fn failing_deactivate(self, err: LifecycleError) -> Self {
        *self.deactivate_result.borrow_mut() = Err(err);
        self
    }

    /// `activate` waits until the sender fires or is dropped.
    pub(crate) fn gated(self, gate: oneshot::Receiver<()>) -> Self {
        *self.gate.borrow_mut() = Some(gate);
        self
    }

    pub(crate) fn set_can_deactivate(&self, response: impl Into<Response>) {
        *self.can_deactivate.borrow_mut() = Ok(response.into());
    }

    fn record(&self, what: &str) {
        self.log.borrow_mut().push(format!("{}.{what}", self.name));
    }
}

#[async_trait(?Send)]
impl Participant for Probe {
    async fn can_activate(&self, _data: &ActivationData) -> Result<Response, LifecycleError> {
        self.record("can_activate");
        self.can_activate.borrow().clone()
    }

    async fn activate(&self, data: &ActivationData) -> Result<(), LifecycleError> {
        self.record("activate");
        self.seen.borrow_mut().push(data.clone());
        let gate = self.gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.activate_result.borrow().clone()
    }

    async fn can_deactivate(&self, _close: bool) -> Result<Response, LifecycleError> {
        self.record("can_deactivate");
        self.can_deactivate.borrow().clone()
    }

    async fn deactivate(&self, close: bool) -> Result<(), LifecycleError> {
        self.record(if close {
            "deactivate(close)"
        } else {
            "deactivate(keep)"
        });
        self.deactivate_result.borrow().clone()
    }
}

/// Counts `ERROR` level events.
pub(crate) struct ErrorCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Run `f` under a subscriber that counts error events, returning its output and the count.
pub(crate) fn count_errors<R>(f: impl FnOnce() -> R) -> (R, usize) {
    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(ErrorCounter(count.clone()));
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, count.load(Ordering::SeqCst))
}
