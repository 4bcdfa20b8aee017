// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composition requests.

use core::fmt;
use std::rc::Rc;

use understory_activator::activator::Activator;
use understory_activator::types::ActivationData;

use crate::error::CompositionError;
use crate::model::ViewModel;
use crate::transition::{Transition, TransitionSpec};
use crate::view::ViewId;

bitflags::bitflags! {
    /// Behavior switches for a composition.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CompositionFlags: u8 {
        /// Keep superseded views in the host, hidden, and reuse them when reselected.
        const CACHE_VIEWS                     = 0b0000_0001;
        /// Bind the view within the caller's binding context instead of to the model alone.
        const PRESERVE_CONTEXT                = 0b0000_0010;
        /// Skip the transition when both views come from the same template.
        const SKIP_TRANSITION_ON_SAME_VIEW_ID = 0b0000_0100;
        /// Run the model's `attached` hook for reused cached views too.
        const ALWAYS_TRIGGER_ATTACH           = 0b0000_1000;
    }
}

/// The view to compose.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewRef {
    /// A name resolved by the view locator.
    Name(String),
    /// An existing element.
    Element(ViewId),
}

/// How a host's original content is used.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ComposeMode {
    /// The host's first child is the view, cloned for every composition.
    Inline,
    /// The host's children are replacement parts for the composed view.
    Templated,
}

/// Callback receiving the composed view (if any) and the host.
pub type ViewCallback = Rc<dyn Fn(Option<ViewId>, ViewId)>;
/// Callback receiving the attached view and the host.
pub type AttachCallback = Rc<dyn Fn(ViewId, ViewId)>;
/// Error hook receiving the failure and the host. Returning `Err` forwards to the engine's reporter.
pub type ErrorHook = Rc<dyn Fn(&CompositionError, ViewId) -> Result<(), CompositionError>>;

/// Everything a single composition needs, built fluently.
///
/// ```
/// use understory_composition::request::{CompositionFlags, CompositionRequest};
///
/// let request = CompositionRequest::new()
///     .view_name("settings")
///     .transition("entrance")
///     .flags(CompositionFlags::CACHE_VIEWS);
/// assert!(request.has_flags(CompositionFlags::CACHE_VIEWS));
/// ```
#[derive(Clone, Default)]
pub struct CompositionRequest {
    pub(crate) model: Option<Rc<dyn ViewModel>>,
    pub(crate) view: Option<ViewRef>,
    pub(crate) activation_data: ActivationData,
    pub(crate) activate: Option<bool>,
    pub(crate) transition: Option<TransitionSpec>,
    pub(crate) flags: CompositionFlags,
    pub(crate) parts: Vec<ViewId>,
    pub(crate) alias: Option<String>,
    pub(crate) mode: Option<ComposeMode>,
    pub(crate) binding: Option<ViewCallback>,
    pub(crate) attached: Option<AttachCallback>,
    pub(crate) composition_complete: Option<ViewCallback>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl fmt::Debug for CompositionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionRequest")
            .field("has_model", &self.model.is_some())
            .field("view", &self.view)
            .field("activation_data", &self.activation_data)
            .field("activate", &self.activate)
            .field("transition", &self.transition)
            .field("flags", &self.flags)
            .field("parts", &self.parts)
            .field("alias", &self.alias)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl CompositionRequest {
    /// An empty request: composing it empties the host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose `model`.
    pub fn model(mut self, model: Rc<dyn ViewModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Compose the current item of `activator`, which has already run the activation protocol.
    pub fn for_activator(mut self, activator: &Activator<dyn ViewModel>) -> Self {
        self.model = activator.active_item();
        self.activate = Some(false);
        self
    }

    /// Compose the view registered under `name`.
    pub fn view_name(mut self, name: impl Into<String>) -> Self {
        self.view = Some(ViewRef::Name(name.into()));
        self
    }

    /// Compose an existing element.
    pub fn view(mut self, view: ViewId) -> Self {
        self.view = Some(ViewRef::Element(view));
        self
    }

    /// Data passed to the model's `activate` hook.
    pub fn activation_data(mut self, data: impl Into<ActivationData>) -> Self {
        self.activation_data = data.into();
        self
    }

    /// Whether to call the model's `activate` hook.
    ///
    /// Defaults to true unless the model is itself an activator.
    pub fn activate(mut self, activate: bool) -> Self {
        self.activate = Some(activate);
        self
    }

    /// Use the registered transition `name`.
    pub fn transition(mut self, name: impl Into<String>) -> Self {
        self.transition = Some(TransitionSpec::Named(name.into()));
        self
    }

    /// Use `transition` directly.
    pub fn custom_transition(mut self, transition: Rc<dyn Transition>) -> Self {
        self.transition = Some(TransitionSpec::Custom(transition));
        self
    }

    /// Add behavior flags.
    pub fn flags(mut self, flags: CompositionFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Replacement parts to splice into the composed view.
    pub fn parts(mut self, parts: impl IntoIterator<Item = ViewId>) -> Self {
        self.parts = parts.into_iter().collect();
        self
    }

    /// Name the model is exposed under when binding within a context.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Use the host's original content as the view or as parts.
    pub fn mode(mut self, mode: ComposeMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Runs after activation, before the view is bound.
    pub fn on_binding(mut self, callback: impl Fn(Option<ViewId>, ViewId) + 'static) -> Self {
        self.binding = Some(Rc::new(callback));
        self
    }

    /// Runs when the view is attached.
    pub fn on_attached(mut self, callback: impl Fn(ViewId, ViewId) + 'static) -> Self {
        self.attached = Some(Rc::new(callback));
        self
    }

    /// Runs once the whole composition transaction has completed.
    pub fn on_composition_complete(
        mut self,
        callback: impl Fn(Option<ViewId>, ViewId) + 'static,
    ) -> Self {
        self.composition_complete = Some(Rc::new(callback));
        self
    }

    /// Receives failures instead of the engine's reporter.
    pub fn on_error(
        mut self,
        hook: impl Fn(&CompositionError, ViewId) -> Result<(), CompositionError> + 'static,
    ) -> Self {
        self.on_error = Some(Rc::new(hook));
        self
    }

    /// True if all of `flags` are set.
    pub fn has_flags(&self, flags: CompositionFlags) -> bool {
        self.flags.contains(flags)
    }

    /// Whether the model's `activate` hook will run.
    pub fn should_activate(&self) -> bool {
        self.activate
            .unwrap_or_else(|| !self.model.as_ref().is_some_and(|m| m.is_activator()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use understory_activator::participant::Participant;

    struct Plain;

    impl Participant for Plain {}
    impl ViewModel for Plain {}

    #[test]
    fn activation_defaults() {
        assert!(CompositionRequest::new().should_activate());
        assert!(
            CompositionRequest::new()
                .model(Rc::new(Plain))
                .should_activate()
        );
        let nested: Activator<dyn ViewModel> = Activator::new();
        assert!(
            !CompositionRequest::new()
                .model(Rc::new(nested.clone()))
                .should_activate()
        );
        assert!(
            CompositionRequest::new()
                .model(Rc::new(nested))
                .activate(true)
                .should_activate()
        );
    }

    #[test]
    fn for_activator_takes_current_item() {
        let activator: Activator<dyn ViewModel> = Activator::new();
        let item: Rc<dyn ViewModel> = Rc::new(Plain);
        activator.force_active_item(Some(item.clone()));

        let request = CompositionRequest::new().for_activator(&activator);
        assert!(Rc::ptr_eq(request.model.as_ref().unwrap(), &item));
        assert!(!request.should_activate());
    }

    #[test]
    fn flags_accumulate() {
        let request = CompositionRequest::new()
            .flags(CompositionFlags::CACHE_VIEWS)
            .flags(CompositionFlags::ALWAYS_TRIGGER_ATTACH);
        assert!(request.has_flags(CompositionFlags::CACHE_VIEWS | CompositionFlags::ALWAYS_TRIGGER_ATTACH));
        assert!(!request.has_flags(CompositionFlags::PRESERVE_CONTEXT));
    }
}
