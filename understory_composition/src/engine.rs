// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The composition engine.
//!
//! ## Flow
//!
//! [`CompositionEngine::compose`] joins the composition transaction immediately, queues the
//! completion callbacks, snapshots the host's current children, and spawns the rest:
//!
//! 1. Resolve the view: an explicit element or name, the model's own view, or nothing.
//! 2. Activate the model, unless the request opts out or the model is an activator.
//! 3. If a newer composition claimed the host meanwhile, stop quietly.
//! 4. Bind: splice replacement parts, insert the view hidden at the front of the host, and
//!    bind it to the model (or within the caller's binding context).
//! 5. Swap: run a transition when one applies, otherwise swap synchronously; superseded views
//!    are removed, or hidden when the host caches views.
//! 6. Attach: call the model's and the request's attach hooks and mark the view active.
//! 7. Leave the transaction. The last composition out schedules the completion callbacks for
//!    the next turn, in registration order.
//!
//! Failures go to the request's `on_error` hook, or to the engine's reporter, and the
//! composition still leaves the transaction.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::{LocalSpawn, LocalSpawnExt};
use tracing::{debug, error};
use understory_activator::tick::yield_now;
use understory_activator::types::LifecycleError;

use crate::error::CompositionError;
use crate::parts::replace_parts;
use crate::provider::{Binder, BindingContext, DefaultBinder, TemplateLocator, ViewLocator};
use crate::request::{ComposeMode, CompositionFlags, CompositionRequest, ViewRef};
use crate::transaction::{CompletionCallback, CompositionTransaction};
use crate::transition::{Transition, TransitionContext, TransitionRegistry, TransitionSpec};
use crate::view::{Detached, SharedTree, ViewFlags, ViewId};

type Reporter = Rc<dyn Fn(&CompositionError)>;

fn default_reporter() -> Reporter {
    Rc::new(|err: &CompositionError| error!(error = %err, "composition failed"))
}

/// Composes view models into a [`ViewTree`](crate::view::ViewTree).
///
/// Cloning produces another handle to the same engine.
#[derive(Clone)]
pub struct CompositionEngine {
    inner: Rc<EngineInner>,
}

struct EngineInner {
    tree: SharedTree,
    spawner: Box<dyn LocalSpawn>,
    locator: Rc<dyn ViewLocator>,
    binder: Rc<dyn Binder>,
    transitions: RefCell<TransitionRegistry>,
    default_transition: Option<String>,
    reporter: Reporter,
    transaction: CompositionTransaction,
    claims: RefCell<HashMap<ViewId, u64>>,
    next_claim: Cell<u64>,
    host_content: RefCell<HashMap<ViewId, HostContent>>,
}

// A host's original children, captured the first time it is composed with a mode.
enum HostContent {
    Inline(Option<ViewId>),
    Templated(Vec<ViewId>),
}

impl fmt::Debug for CompositionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionEngine")
            .field("transaction", &self.inner.transaction)
            .field("transitions", &*self.inner.transitions.borrow())
            .field("default_transition", &self.inner.default_transition)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`CompositionEngine`].
pub struct EngineBuilder {
    tree: SharedTree,
    spawner: Box<dyn LocalSpawn>,
    locator: Option<Rc<dyn ViewLocator>>,
    binder: Option<Rc<dyn Binder>>,
    transitions: TransitionRegistry,
    default_transition: Option<String>,
    reporter: Option<Reporter>,
    transaction: Option<CompositionTransaction>,
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("transitions", &self.transitions)
            .field("default_transition", &self.default_transition)
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Locate views with `locator`. Defaults to an empty [`TemplateLocator`].
    pub fn locator(mut self, locator: Rc<dyn ViewLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Bind views with `binder`. Defaults to [`DefaultBinder`].
    pub fn binder(mut self, binder: Rc<dyn Binder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Register a transition.
    pub fn transition(mut self, name: impl Into<String>, transition: impl Transition + 'static) -> Self {
        self.transitions.register(name, transition);
        self
    }

    /// Transition used by requests that do not name one.
    pub fn default_transition(mut self, name: impl Into<String>) -> Self {
        self.default_transition = Some(name.into());
        self
    }

    /// Receives failures from requests without an `on_error` hook. Defaults to an `error!` log.
    pub fn error_reporter(mut self, reporter: impl Fn(&CompositionError) + 'static) -> Self {
        self.reporter = Some(Rc::new(reporter));
        self
    }

    /// Share a transaction with other engines.
    pub fn transaction(mut self, transaction: CompositionTransaction) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// Build the engine.
    pub fn build(self) -> CompositionEngine {
        CompositionEngine {
            inner: Rc::new(EngineInner {
                tree: self.tree,
                spawner: self.spawner,
                locator: self
                    .locator
                    .unwrap_or_else(|| Rc::new(TemplateLocator::new())),
                binder: self.binder.unwrap_or_else(|| Rc::new(DefaultBinder)),
                transitions: RefCell::new(self.transitions),
                default_transition: self.default_transition,
                reporter: self.reporter.unwrap_or_else(default_reporter),
                transaction: self.transaction.unwrap_or_default(),
                claims: RefCell::new(HashMap::new()),
                next_claim: Cell::new(0),
                host_content: RefCell::new(HashMap::new()),
            }),
        }
    }
}

impl CompositionEngine {
    /// Start building an engine composing into `tree`, running tasks on `spawner`.
    pub fn builder(tree: SharedTree, spawner: impl LocalSpawn + 'static) -> EngineBuilder {
        EngineBuilder {
            tree,
            spawner: Box::new(spawner),
            locator: None,
            binder: None,
            transitions: TransitionRegistry::default(),
            default_transition: None,
            reporter: None,
            transaction: None,
        }
    }

    /// The tree this engine composes into.
    pub fn tree(&self) -> &SharedTree {
        &self.inner.tree
    }

    /// The engine's composition transaction.
    pub fn transaction(&self) -> &CompositionTransaction {
        &self.inner.transaction
    }

    /// Register a transition after construction.
    pub fn register_transition(&self, name: impl Into<String>, transition: impl Transition + 'static) {
        self.inner.transitions.borrow_mut().register(name, transition);
    }

    /// Compose `request` into `host`.
    ///
    /// The transaction is joined before this returns; the rest runs on the spawner.
    /// `binding_context` is the scope of the element hosting the composition, used by
    /// context-preserving compositions.
    pub fn compose(
        &self,
        host: ViewId,
        request: CompositionRequest,
        binding_context: Option<BindingContext>,
    ) {
        let request = self.normalize(host, request);
        self.inner.transaction.begin();
        debug!(?host, in_flight = self.inner.transaction.in_flight(), "composition started");

        let (active_view, children) = {
            let tree = self.inner.tree.borrow();
            let children = tree.children(host).to_vec();
            let active = children
                .iter()
                .copied()
                .find(|&c| tree.is_active(c))
                .or_else(|| children.first().copied());
            (active, children)
        };
        let view_elements = if request.has_flags(CompositionFlags::CACHE_VIEWS) {
            children
        } else {
            Vec::new()
        };

        let composition = Rc::new(Composition {
            engine: self.clone(),
            host,
            request,
            binding_context,
            active_view,
            view_elements,
            child: Cell::new(None),
            composing_new_view: Cell::new(false),
            attach_done: Cell::new(false),
        });
        composition.queue_completion();

        if let Err(err) = self
            .inner
            .spawner
            .spawn_local(composition.clone().run())
        {
            composition.fail(CompositionError::Spawn(err.to_string()));
        }
    }

    fn normalize(&self, host: ViewId, mut request: CompositionRequest) -> CompositionRequest {
        // An activator composes its current item, which it has already activated.
        while let Some(model) = request.model.clone()
            && model.is_activator()
        {
            request.model = model.active_view_model();
            request.activate.get_or_insert(false);
        }
        self.prune_host_content();
        if let Some(mode) = request.mode {
            let content = self.capture_host_content(host, mode);
            match content {
                HostContent::Inline(template) => {
                    let view = template.and_then(|t| self.inner.tree.borrow_mut().deep_clone(t));
                    request.view = view.map(ViewRef::Element);
                }
                HostContent::Templated(parts) => request.parts = parts,
            }
            request.flags |= CompositionFlags::PRESERVE_CONTEXT;
        }
        if request.model.is_none() && request.view.is_some() {
            request.flags |= CompositionFlags::PRESERVE_CONTEXT;
        }
        request
    }

    // Forget hosts that have left the tree, along with the content captured from them.
    fn prune_host_content(&self) {
        let detached = {
            let mut tree = self.inner.tree.borrow_mut();
            let mut captured = self.inner.host_content.borrow_mut();
            let mut detached = Detached::default();
            captured.retain(|&host, content| {
                if tree.is_alive(host) {
                    return true;
                }
                let views: Vec<ViewId> = match content {
                    HostContent::Inline(view) => view.iter().copied().collect(),
                    HostContent::Templated(parts) => core::mem::take(parts),
                };
                for view in views {
                    detached.absorb(tree.remove(view));
                }
                false
            });
            detached
        };
        detached.run();
    }

    fn capture_host_content(&self, host: ViewId, mode: ComposeMode) -> HostContent {
        let mut captured = self.inner.host_content.borrow_mut();
        let content = captured.entry(host).or_insert_with(|| {
            let mut tree = self.inner.tree.borrow_mut();
            let children = tree.children(host).to_vec();
            for &child in &children {
                tree.detach(child);
            }
            match mode {
                ComposeMode::Inline => HostContent::Inline(children.first().copied()),
                ComposeMode::Templated => HostContent::Templated(children),
            }
        });
        match content {
            HostContent::Inline(view) => HostContent::Inline(*view),
            HostContent::Templated(parts) => HostContent::Templated(parts.clone()),
        }
    }

    fn claim(&self, host: ViewId) -> u64 {
        let claim = self.inner.next_claim.get();
        self.inner.next_claim.set(claim + 1);
        self.inner.claims.borrow_mut().insert(host, claim);
        claim
    }

    // True if `claim` is still the newest for `host`; releases it.
    fn release_claim(&self, host: ViewId, claim: u64) -> bool {
        let mut claims = self.inner.claims.borrow_mut();
        if claims.get(&host) == Some(&claim) {
            claims.remove(&host);
            true
        } else {
            false
        }
    }

    fn drain(&self, callbacks: Vec<CompletionCallback>) {
        if callbacks.is_empty() {
            return;
        }
        debug!(count = callbacks.len(), "composition transaction complete");
        let reporter = self.inner.reporter.clone();
        let task = async move {
            yield_now().await;
            for callback in callbacks {
                if let Err(err) = callback() {
                    reporter(&err);
                }
            }
        };
        if let Err(err) = self.inner.spawner.spawn_local(task) {
            (self.inner.reporter)(&CompositionError::Spawn(err.to_string()));
        }
    }
}

// One compose call, from request to transaction exit.
struct Composition {
    engine: CompositionEngine,
    host: ViewId,
    request: CompositionRequest,
    binding_context: Option<BindingContext>,
    active_view: Option<ViewId>,
    view_elements: Vec<ViewId>,
    child: Cell<Option<ViewId>>,
    composing_new_view: Cell<bool>,
    attach_done: Cell<bool>,
}

impl Composition {
    fn tree(&self) -> &SharedTree {
        &self.engine.inner.tree
    }

    fn caching(&self) -> bool {
        self.request.has_flags(CompositionFlags::CACHE_VIEWS)
    }

    fn queue_completion(self: &Rc<Self>) {
        let transaction = &self.engine.inner.transaction;
        if let Some(callback) = self.request.composition_complete.clone() {
            let this = self.clone();
            transaction.complete(move || {
                callback(this.child.get(), this.host);
                Ok(())
            });
        }
        if let Some(model) = self.request.model.clone() {
            let this = self.clone();
            transaction.complete(move || {
                if !this.composing_new_view.get() {
                    return Ok(());
                }
                model
                    .composition_complete(this.child.get(), this.host)
                    .map_err(|err| CompositionError::hook("composition_complete", err))
            });
        }
    }

    async fn run(self: Rc<Self>) {
        match self.resolve_view().await {
            Ok(child) => self.bind_and_show(child, false).await,
            Err(err) => self.fail(err),
        }
    }

    async fn resolve_view(&self) -> Result<Option<ViewId>, CompositionError> {
        let inner = &self.engine.inner;
        match (&self.request.model, &self.request.view) {
            (_, Some(ViewRef::Element(view))) => {
                if inner.tree.borrow().is_alive(*view) {
                    Ok(Some(*view))
                } else {
                    Err(CompositionError::StaleView(*view))
                }
            }
            (_, Some(ViewRef::Name(name))) => inner
                .locator
                .locate_view(&inner.tree, name, &self.view_elements)
                .await
                .map(Some),
            (Some(model), None) => inner
                .locator
                .locate_view_for_object(&inner.tree, model, &self.view_elements)
                .await
                .map(Some),
            (None, None) => Ok(None),
        }
    }

    fn bind_and_show(
        self: Rc<Self>,
        child: Option<ViewId>,
        skip_activation: bool,
    ) -> LocalBoxFuture<'static, ()> {
        async move {
            self.child.set(child);
            let claim = self.engine.claim(self.host);
            let new_view = !self.caching() || child.is_none_or(|c| !self.view_elements.contains(&c));
            self.composing_new_view.set(new_view);

            let activated = if skip_activation {
                Ok(())
            } else {
                self.try_activate().await
            };
            let current = self.engine.release_claim(self.host, claim);
            if let Err(err) = activated {
                self.discard_unplaced(child);
                match err {
                    LifecycleError::Rejected => {
                        debug!(host = ?self.host, "model activation rejected");
                        self.end(false);
                    }
                    LifecycleError::Failed(_) => self.fail(err.into()),
                }
                return;
            }
            if !current {
                debug!(host = ?self.host, "composition superseded");
                self.discard_unplaced(child);
                self.end(false);
                return;
            }

            if let Some(binding) = &self.request.binding {
                binding(child, self.host);
            }

            let bound = match (&self.binding_context, child) {
                (Some(context), _) if self.request.has_flags(CompositionFlags::PRESERVE_CONTEXT) => {
                    match child {
                        Some(child) if new_view => {
                            self.insert_hidden(child);
                            let mut tree = self.tree().borrow_mut();
                            self.engine.inner.binder.bind_context(
                                &mut tree,
                                context,
                                child,
                                self.request.model.as_ref(),
                                self.request.alias.as_deref(),
                            )
                        }
                        _ => Ok(()),
                    }
                }
                (_, Some(child)) => {
                    let model = self.request.model.as_ref();
                    if self.tree().borrow().is_bound_to(child, model) {
                        Ok(())
                    } else if !new_view {
                        self.clone().recreate(child).await;
                        return;
                    } else {
                        self.insert_hidden(child);
                        let mut tree = self.tree().borrow_mut();
                        self.engine.inner.binder.bind(&mut tree, model, child)
                    }
                }
                (_, None) => Ok(()),
            };
            if let Err(err) = bound {
                self.fail(err);
                return;
            }

            self.finalize().await;
        }
        .boxed_local()
    }

    async fn try_activate(&self) -> Result<(), LifecycleError> {
        if !self.request.should_activate() {
            return Ok(());
        }
        let Some(model) = &self.request.model else {
            return Ok(());
        };
        debug!(host = ?self.host, "activating composed model");
        model.activate(&self.request.activation_data).await
    }

    // A cached view bound to another model is replaced by a fresh copy of its template.
    async fn recreate(self: Rc<Self>, stale: ViewId) {
        let name = self.tree().borrow().view_id(stale).map(String::from);
        let detached = self.tree().borrow_mut().remove(stale);
        detached.run();
        let Some(name) = name else {
            self.fail(CompositionError::StaleView(stale));
            return;
        };
        debug!(view = %name, "recreating cached view bound to another model");
        let inner = &self.engine.inner;
        match inner.locator.locate_view(&inner.tree, &name, &[]).await {
            Ok(view) => self.clone().bind_and_show(Some(view), true).await,
            Err(err) => self.fail(err),
        }
    }

    // A freshly located view that never made it into the host.
    fn discard_unplaced(&self, child: Option<ViewId>) {
        let Some(child) = child else {
            return;
        };
        // Explicit elements belong to the caller; inline clones are ours.
        if self.request.mode != Some(ComposeMode::Inline)
            && matches!(self.request.view, Some(ViewRef::Element(_)))
        {
            return;
        }
        let detached = {
            let mut tree = self.tree().borrow_mut();
            if !self.composing_new_view.get() || tree.parent(child).is_some() {
                return;
            }
            tree.remove(child)
        };
        detached.run();
    }

    fn insert_hidden(&self, child: ViewId) {
        let detached = {
            let mut tree = self.tree().borrow_mut();
            let detached = if self.request.parts.is_empty() {
                Detached::default()
            } else {
                replace_parts(&mut tree, child, &self.request.parts)
            };
            tree.hide(child);
            tree.prepend(self.host, child);
            detached
        };
        detached.run();
    }

    fn transition(&self) -> Option<TransitionSpec> {
        self.request.transition.clone().or_else(|| {
            self.engine
                .inner
                .default_transition
                .clone()
                .map(TransitionSpec::Named)
        })
    }

    fn should_transition(&self, has_transition: bool) -> bool {
        if !has_transition {
            return false;
        }
        let child = self.child.get();
        let Some(active) = self.active_view else {
            return true;
        };
        if Some(active) == child {
            return false;
        }
        let Some(child) = child else {
            return true;
        };
        if self
            .request
            .has_flags(CompositionFlags::SKIP_TRANSITION_ON_SAME_VIEW_ID)
        {
            let tree = self.tree().borrow();
            return tree.view_id(active) != tree.view_id(child);
        }
        true
    }

    async fn finalize(self: &Rc<Self>) {
        let child = self.child.get();
        if child.is_none() && self.active_view.is_none() {
            if !self.caching() {
                self.empty_host();
            }
            self.trigger_attach();
            self.end(false);
            return;
        }

        let spec = self.transition();
        if self.should_transition(spec.is_some())
            && let Some(spec) = spec
        {
            let transition = match spec {
                TransitionSpec::Named(name) => {
                    match self.engine.inner.transitions.borrow().resolve(&name) {
                        Ok(t) => t,
                        Err(err) => {
                            self.fail(err);
                            return;
                        }
                    }
                }
                TransitionSpec::Custom(t) => t,
            };
            let this = self.clone();
            let context = TransitionContext {
                tree: self.tree().clone(),
                parent: self.host,
                active_view: self.active_view,
                child,
                trigger_attach: Rc::new(move || this.trigger_attach()),
            };
            if let Err(err) = transition.run(&context).await {
                self.fail(err);
                return;
            }
            drop(context);

            if !self.caching() {
                match child {
                    None => self.empty_host(),
                    Some(child) => self.remove_others(child),
                }
            } else if let Some(active) = self.active_view {
                self.retire(active);
            }
            if let Some(child) = child {
                self.tree().borrow_mut().show(child);
            }
        } else if child != self.active_view {
            if self.caching()
                && let Some(active) = self.active_view
            {
                self.retire(active);
            }
            match child {
                None => {
                    if !self.caching() {
                        self.empty_host();
                    }
                }
                Some(child) => {
                    if !self.caching() {
                        self.remove_others(child);
                    }
                    self.tree().borrow_mut().show(child);
                }
            }
        }

        self.trigger_attach();
        self.end(false);
    }

    fn empty_host(&self) {
        let detached = self.tree().borrow_mut().empty(self.host);
        detached.run();
    }

    fn remove_others(&self, keep: ViewId) {
        let detached = {
            let mut tree = self.tree().borrow_mut();
            let mut detached = Detached::default();
            for other in tree.children(self.host).to_vec() {
                if other != keep {
                    detached.absorb(tree.remove(other));
                }
            }
            detached
        };
        detached.run();
    }

    // Hide a superseded cached view, or remove it when it opted out of caching.
    fn retire(&self, view: ViewId) {
        let detached = {
            let mut tree = self.tree().borrow_mut();
            if tree.has_flags(view, ViewFlags::NO_CACHE) {
                tree.remove(view)
            } else {
                tree.hide(view);
                Detached::default()
            }
        };
        detached.run();
    }

    fn trigger_attach(&self) {
        if self.attach_done.replace(true) {
            return;
        }
        if let Some(active) = self.active_view {
            self.tree().borrow_mut().set_active(active, false);
        }
        let Some(child) = self.child.get() else {
            return;
        };
        let new_view = self.composing_new_view.get();

        if let Some(model) = &self.request.model
            && (new_view
                || self
                    .request
                    .has_flags(CompositionFlags::ALWAYS_TRIGGER_ATTACH))
            && let Err(err) = model.attached(child, self.host)
        {
            self.report(&CompositionError::hook("attached", err));
        }
        if let Some(attached) = &self.request.attached {
            attached(child, self.host);
        }
        self.tree().borrow_mut().set_active(child, true);

        if new_view && let Some(model) = self.request.model.clone() {
            let host = self.host;
            let reporter = self.engine.inner.reporter.clone();
            self.tree().borrow_mut().add_detach_callback(child, move || {
                if let Err(err) = model.detached(child, host) {
                    reporter(&CompositionError::hook("detached", err));
                }
            });
        }
    }

    fn report(&self, err: &CompositionError) {
        let reporter = &self.engine.inner.reporter;
        match &self.request.on_error {
            Some(hook) => {
                if let Err(forwarded) = hook(err, self.host) {
                    reporter(&forwarded);
                }
            }
            None => reporter(err),
        }
    }

    fn fail(&self, err: CompositionError) {
        self.report(&err);
        self.end(true);
    }

    fn end(&self, failed: bool) {
        debug!(host = ?self.host, failed, "composition finished");
        if let Some(callbacks) = self.engine.inner.transaction.end(failed) {
            self.engine.drain(callbacks);
        }
    }
}
