// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composition failures.

use understory_activator::types::LifecycleError;

use crate::view::ViewId;

/// A failure routed through a composition's error hook.
///
/// None of these escape [`CompositionEngine::compose`](crate::engine::CompositionEngine::compose):
/// each is handed to the request's `on_error` hook or the engine's reporter, and the
/// composition is then torn down.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompositionError {
    /// The view locator has no view by this name.
    #[error("no view named `{0}`")]
    ViewNotFound(String),
    /// The model does not name a view and the request gave none.
    #[error("the model does not name a view")]
    MissingView,
    /// No transition is registered under this name.
    #[error("unknown transition `{0}`")]
    UnknownTransition(String),
    /// A transition failed while running.
    #[error("transition failed: {0}")]
    Transition(String),
    /// The model's `activate` hook failed.
    #[error("activation failed: {0}")]
    Activation(#[from] LifecycleError),
    /// A model callback failed.
    #[error("`{hook}` hook failed: {source}")]
    Hook {
        /// Name of the hook.
        hook: &'static str,
        /// The hook's error.
        source: LifecycleError,
    },
    /// The binder failed.
    #[error("binding failed: {0}")]
    Binding(String),
    /// A view referenced by the request is no longer in the tree.
    #[error("view {0:?} is no longer in the tree")]
    StaleView(ViewId),
    /// The executor refused the composition task.
    #[error("could not spawn composition task: {0}")]
    Spawn(String),
}

impl CompositionError {
    pub(crate) fn hook(hook: &'static str, source: LifecycleError) -> Self {
        Self::Hook { hook, source }
    }
}
