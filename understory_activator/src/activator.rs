// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The activator: a single-slot holder that moves items through the lifecycle protocol.
//!
//! ## Protocol
//!
//! [`Activator::activate_item`] replaces the current item with a new one. The steps are
//! strictly ordered, and each waits for the previous one:
//!
//! 1. `can_deactivate` on the outgoing item, unless [`ActivationOptions::can_deactivate`] is
//!    false. A nested activator found through [`ActivationPolicy::find_child_activator`] is asked
//!    first.
//! 2. `can_activate` on the incoming item.
//! 3. `deactivate` on the outgoing item. A failure here is logged and the switch continues.
//! 4. [`ActivationPolicy::before_activate`] may substitute the incoming item.
//! 5. `activate` on the incoming item, then the slot is updated.
//!
//! A negative guard leaves the slot unchanged and resolves `false`. At most one activation
//! is in flight; a request made while one is pending resolves `false` immediately.
//! Requests for the item already held resolve `true` without calling any hook.
//!
//! Hook errors never reach the caller. A [`LifecycleError::Failed`] is logged at `error`
//! level, a [`LifecycleError::Rejected`] at `debug`.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use futures::future::{self, FutureExt, LocalBoxFuture};
use tracing::{debug, error};

use crate::list::ListState;
use crate::participant::Participant;
use crate::policy::{ActivationPolicy, ActivatorSettings, DefaultPolicy, Slot};
use crate::types::{ActivationData, ActivationOptions, LifecycleError, Response};

type Subscriber<T> = Rc<dyn Fn(Option<&Rc<T>>)>;

/// Identifies a callback registered with [`Activator::subscribe`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A single-slot holder of the currently active item.
///
/// Cloning produces another handle to the same activator.
pub struct Activator<T: ?Sized + Participant + 'static = dyn Participant> {
    pub(crate) inner: Rc<Inner<T>>,
}

pub(crate) struct Inner<T: ?Sized + Participant + 'static> {
    active: RefCell<Option<Rc<T>>>,
    data: RefCell<ActivationData>,
    initial: RefCell<Option<Rc<T>>>,
    activating: Cell<bool>,
    pub(crate) settings: RefCell<ActivatorSettings>,
    policy: Box<dyn ActivationPolicy<T>>,
    lifecycle_data: RefCell<Option<Response>>,
    pub(crate) list: RefCell<Option<Rc<ListState<T>>>>,
    subscribers: RefCell<Vec<(SubscriptionId, Subscriber<T>)>>,
    next_subscription: Cell<u64>,
}

impl<T: ?Sized + Participant + 'static> Clone for Activator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized + Participant + 'static> Default for Activator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + Participant + 'static> fmt::Debug for Activator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activator")
            .field("has_active_item", &self.inner.active.borrow().is_some())
            .field("is_activating", &self.inner.activating.get())
            .field("list_mode", &self.inner.list.borrow().is_some())
            .field("settings", &*self.inner.settings.borrow())
            .finish_non_exhaustive()
    }
}

// Clears the in-flight flag when an activation settles or its future is dropped.
struct ActivatingGuard<T: ?Sized + Participant + 'static>(Activator<T>);

impl<T: ?Sized + Participant + 'static> Drop for ActivatingGuard<T> {
    fn drop(&mut self) {
        self.0.inner.activating.set(false);
    }
}

pub(crate) fn report(phase: &'static str, err: &LifecycleError) {
    match err {
        LifecycleError::Rejected => debug!(phase, "lifecycle hook rejected"),
        LifecycleError::Failed(_) => error!(phase, error = %err, "lifecycle hook failed"),
    }
}

impl<T: ?Sized + Participant + 'static> Activator<T> {
    /// Create an empty activator with default settings and policy.
    pub fn new() -> Self {
        Self::create(None, ActivatorSettings::default(), DefaultPolicy)
    }

    /// Create an activator whose first argument-less [`activate`](Self::activate) uses `item`.
    pub fn with_initial(item: Rc<T>) -> Self {
        Self::create(Some(item), ActivatorSettings::default(), DefaultPolicy)
    }

    /// Create an activator with explicit settings and policy.
    pub fn create(
        initial: Option<Rc<T>>,
        settings: ActivatorSettings,
        policy: impl ActivationPolicy<T> + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                active: RefCell::new(None),
                data: RefCell::new(ActivationData::None),
                initial: RefCell::new(initial),
                activating: Cell::new(false),
                settings: RefCell::new(settings),
                policy: Box::new(policy),
                lifecycle_data: RefCell::new(None),
                list: RefCell::new(None),
                subscribers: RefCell::new(Vec::new()),
                next_subscription: Cell::new(0),
            }),
        }
    }

    /// The item currently held.
    pub fn active_item(&self) -> Option<Rc<T>> {
        self.inner.active.borrow().clone()
    }

    /// The data the current item was activated with.
    pub fn activation_data(&self) -> ActivationData {
        self.inner.data.borrow().clone()
    }

    /// True while an activation is in flight.
    pub fn is_activating(&self) -> bool {
        self.inner.activating.get()
    }

    /// A copy of the current settings.
    pub fn settings(&self) -> ActivatorSettings {
        self.inner.settings.borrow().clone()
    }

    /// Replace the settings.
    pub fn set_settings(&self, settings: ActivatorSettings) {
        *self.inner.settings.borrow_mut() = settings;
    }

    /// The raw answer of the most recent guard check, if the guard answered.
    ///
    /// Cleared at the start of every guard check.
    pub fn lifecycle_data(&self) -> Option<Response> {
        self.inner.lifecycle_data.borrow().clone()
    }

    /// Replace the current item without running the protocol, then notify subscribers.
    pub fn force_active_item(&self, item: Option<Rc<T>>) {
        let previous = self.inner.active.replace(item);
        drop(previous);
        self.notify_subscribers();
    }

    /// Register a callback invoked with the current item whenever the slot changes
    /// or a request bounces back.
    pub fn subscribe(&self, callback: impl Fn(Option<&Rc<T>>) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_subscription.get());
        self.inner.next_subscription.set(id.0 + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(callback)));
        id
    }

    /// Remove a callback. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Invoke every subscriber with the current item.
    pub fn notify_subscribers(&self) {
        let current = self.active_item();
        let callbacks: Vec<Subscriber<T>> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in callbacks {
            cb(current.as_ref());
        }
    }

    fn interpret(&self, response: &Response) -> bool {
        let settings = self.inner.settings.borrow();
        self.inner
            .policy
            .interpret_response(response, &settings.affirmations)
    }

    fn record_guard(&self, response: Response) -> bool {
        let allowed = self.interpret(&response);
        self.inner.lifecycle_data.replace(Some(response));
        allowed
    }

    fn is_same_item(&self, current: Option<&Rc<T>>, next: Option<&Rc<T>>, data: &ActivationData) -> bool {
        let current_data = self.inner.data.borrow();
        self.inner
            .policy
            .are_same_item(current, next, &current_data, data)
    }

    /// Ask whether `item` may be deactivated.
    ///
    /// `None` is always allowed. A nested activator of `item` must agree first.
    pub async fn can_deactivate_item(
        &self,
        item: Option<&Rc<T>>,
        close: bool,
        options: ActivationOptions,
    ) -> bool {
        self.inner.lifecycle_data.replace(None);
        let Some(item) = item else {
            return true;
        };

        if let Some(child) = self.inner.policy.find_child_activator(item) {
            let allowed = match child.can_deactivate(false).await {
                Ok(response) => self.interpret(&response),
                Err(err) => {
                    report("can_deactivate", &err);
                    false
                }
            };
            if !allowed {
                debug!("nested activator refused deactivation");
                return false;
            }
        }

        if !options.can_deactivate {
            return true;
        }

        match item.can_deactivate(close).await {
            Ok(response) => self.record_guard(response),
            Err(err) => {
                report("can_deactivate", &err);
                false
            }
        }
    }

    /// Ask whether `new_item` may become active with `data`.
    ///
    /// The item already held, and `None`, are always allowed.
    pub async fn can_activate_item(&self, new_item: Option<&Rc<T>>, data: &ActivationData) -> bool {
        self.inner.lifecycle_data.replace(None);
        let current = self.active_item();
        if self.is_same_item(current.as_ref(), new_item, data) {
            return true;
        }
        let Some(item) = new_item else {
            return true;
        };
        match item.can_activate(data).await {
            Ok(response) => self.record_guard(response),
            Err(err) => {
                report("can_activate", &err);
                false
            }
        }
    }

    /// Guard and deactivate `item` directly.
    ///
    /// On refusal subscribers are notified so views bound to the slot can revert.
    /// On success with `close`, the policy's [`after_deactivate`](ActivationPolicy::after_deactivate)
    /// receives the slot.
    pub async fn deactivate_item(&self, item: Option<&Rc<T>>, close: bool) -> bool {
        if !self
            .can_deactivate_item(item, close, ActivationOptions::default())
            .await
        {
            self.notify_subscribers();
            return false;
        }
        self.run_deactivate(item, close, true).await
    }

    async fn run_deactivate(&self, item: Option<&Rc<T>>, close: bool, direct: bool) -> bool {
        let Some(item) = item else {
            return true;
        };
        debug!(close, "deactivating item");
        if let Err(err) = item.deactivate(close).await {
            report("deactivate", &err);
            return false;
        }
        match self.list_state() {
            Some(state) => self.list_after_deactivate(&state, item, close),
            None => {
                let slot = Slot { activator: self };
                self.inner
                    .policy
                    .after_deactivate(item, close, direct.then_some(&slot));
            }
        }
        true
    }

    /// Make `new_item` the active item, passing `data` to its hooks.
    ///
    /// The in-flight check runs when this is called, not when the future is first polled.
    /// Dropping the returned future abandons the request and clears the in-flight flag.
    pub fn activate_item(
        &self,
        new_item: Option<Rc<T>>,
        data: ActivationData,
        options: ActivationOptions,
    ) -> LocalBoxFuture<'static, bool> {
        self.start(new_item, data, options, false)
    }

    /// Setter form of [`activate_item`](Self::activate_item).
    ///
    /// When a guard refuses, subscribers are notified with the unchanged item so a
    /// two-way bound view reverts.
    pub fn set(&self, new_item: Option<Rc<T>>) -> LocalBoxFuture<'static, bool> {
        self.start(
            new_item,
            ActivationData::None,
            ActivationOptions::default(),
            true,
        )
    }

    fn start(
        &self,
        new_item: Option<Rc<T>>,
        data: ActivationData,
        options: ActivationOptions,
        via_setter: bool,
    ) -> LocalBoxFuture<'static, bool> {
        if self.inner.activating.get() {
            debug!("activation already in flight, request dropped");
            return future::ready(false).boxed_local();
        }
        self.inner.activating.set(true);
        let guard = ActivatingGuard(self.clone());

        let current = self.active_item();
        if self.is_same_item(current.as_ref(), new_item.as_ref(), &data) {
            drop(guard);
            return future::ready(true).boxed_local();
        }

        let this = self.clone();
        async move {
            let _guard = guard;
            this.switch(current, new_item, data, options, via_setter)
                .await
        }
        .boxed_local()
    }

    async fn switch(
        &self,
        current: Option<Rc<T>>,
        new_item: Option<Rc<T>>,
        data: ActivationData,
        options: ActivationOptions,
        via_setter: bool,
    ) -> bool {
        let close = self.inner.settings.borrow().close_on_deactivate;

        if !self
            .can_deactivate_item(current.as_ref(), close, options)
            .await
        {
            debug!("outgoing item refused deactivation");
            if via_setter {
                self.notify_subscribers();
            }
            return false;
        }

        if !self.can_activate_item(new_item.as_ref(), &data).await {
            debug!("incoming item refused activation");
            if via_setter {
                self.notify_subscribers();
            }
            return false;
        }

        if !self.run_deactivate(current.as_ref(), close, false).await {
            debug!("outgoing item failed to deactivate, continuing");
        }

        let new_item = match self.list_state() {
            Some(state) => self.list_before_activate(&state, new_item),
            None => self.inner.policy.before_activate(new_item, &data),
        };

        if let Some(item) = &new_item {
            debug!("activating item");
            if let Err(err) = item.activate(&data).await {
                report("activate", &err);
                self.inner.data.replace(ActivationData::None);
                self.force_active_item(None);
                return false;
            }
        }

        self.inner.data.replace(data);
        self.force_active_item(new_item);
        true
    }

    /// Whether the pending initial item, or else the current item, may activate.
    ///
    /// Does not consume the initial item.
    pub async fn can_activate(&self) -> bool {
        let item = self
            .inner
            .initial
            .borrow()
            .clone()
            .or_else(|| self.active_item());
        self.can_activate_item(item.as_ref(), &ActivationData::None)
            .await
    }

    /// Activate the pending initial item, or else the current item.
    ///
    /// The initial item is consumed by the first call.
    pub fn activate(&self) -> LocalBoxFuture<'static, bool> {
        let initial = self.inner.initial.borrow_mut().take();
        let item = initial.or_else(|| self.active_item());
        self.activate_item(item, ActivationData::None, ActivationOptions::default())
    }

    /// Whether the current item may deactivate; in list mode with `close`, every item.
    pub async fn can_deactivate(&self, close: bool) -> bool {
        if close && let Some(state) = self.list_state() {
            return self.can_deactivate_all(&state.items).await;
        }
        let current = self.active_item();
        self.can_deactivate_item(current.as_ref(), close, ActivationOptions::default())
            .await
    }

    /// Deactivate the current item; in list mode with `close`, close every item.
    pub async fn deactivate(&self, close: bool) -> bool {
        if close && let Some(state) = self.list_state() {
            return self.deactivate_all(&state.items).await;
        }
        let current = self.active_item();
        self.deactivate_item(current.as_ref(), close).await
    }
}

#[async_trait(?Send)]
impl<T: ?Sized + Participant + 'static> Participant for Activator<T> {
    async fn can_activate(&self, _data: &ActivationData) -> Result<Response, LifecycleError> {
        Ok(Response::Bool(Activator::<T>::can_activate(self).await))
    }

    async fn activate(&self, _data: &ActivationData) -> Result<(), LifecycleError> {
        if !Activator::<T>::activate(self).await {
            debug!("nested activation did not complete");
        }
        Ok(())
    }

    async fn can_deactivate(&self, close: bool) -> Result<Response, LifecycleError> {
        Ok(Response::Bool(Activator::<T>::can_deactivate(self, close).await))
    }

    async fn deactivate(&self, close: bool) -> Result<(), LifecycleError> {
        Activator::<T>::deactivate(self, close).await;
        Ok(())
    }

    fn is_activator(&self) -> bool {
        true
    }
}
