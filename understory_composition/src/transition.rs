// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transitions between the outgoing and incoming views of a host.

use core::fmt;
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use understory_activator::tick::yield_now;

use crate::error::CompositionError;
use crate::view::{SharedTree, ViewId};

/// What a transition sees of a composition.
pub struct TransitionContext {
    /// The tree being composed into.
    pub tree: SharedTree,
    /// The host element.
    pub parent: ViewId,
    /// The view being replaced, if any.
    pub active_view: Option<ViewId>,
    /// The incoming view, if any.
    pub child: Option<ViewId>,
    pub(crate) trigger_attach: Rc<dyn Fn()>,
}

impl TransitionContext {
    /// Run the composition's attach step now rather than after the transition.
    ///
    /// Only the first call has an effect.
    pub fn trigger_attach(&self) {
        (self.trigger_attach)();
    }
}

impl fmt::Debug for TransitionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionContext")
            .field("parent", &self.parent)
            .field("active_view", &self.active_view)
            .field("child", &self.child)
            .finish_non_exhaustive()
    }
}

/// An animated swap between two views.
///
/// When the returned future completes, the engine hides or removes the outgoing view,
/// shows the incoming view, and triggers attach if the transition did not.
#[async_trait(?Send)]
pub trait Transition {
    /// Run the transition.
    async fn run(&self, context: &TransitionContext) -> Result<(), CompositionError>;
}

/// A transition named in a request.
#[derive(Clone)]
pub enum TransitionSpec {
    /// Look the transition up in the engine's registry.
    Named(String),
    /// Use this transition directly.
    Custom(Rc<dyn Transition>),
}

impl fmt::Debug for TransitionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Custom(_) => f.debug_tuple("Custom").finish_non_exhaustive(),
        }
    }
}

/// Transitions by name.
///
/// The default registry holds [`Entrance`] under `"entrance"`.
pub struct TransitionRegistry {
    transitions: HashMap<String, Rc<dyn Transition>>,
}

impl Default for TransitionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Entrance::NAME, Entrance);
        registry
    }
}

impl fmt::Debug for TransitionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.transitions.keys().collect();
        names.sort();
        f.debug_struct("TransitionRegistry")
            .field("transitions", &names)
            .finish()
    }
}

impl TransitionRegistry {
    /// A registry with no transitions.
    pub fn empty() -> Self {
        Self {
            transitions: HashMap::new(),
        }
    }

    /// Register a transition under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, transition: impl Transition + 'static) {
        self.transitions.insert(name.into(), Rc::new(transition));
    }

    /// Look up a transition.
    pub fn resolve(&self, name: &str) -> Result<Rc<dyn Transition>, CompositionError> {
        self.transitions
            .get(name)
            .cloned()
            .ok_or_else(|| CompositionError::UnknownTransition(name.into()))
    }
}

/// Hides the outgoing view, waits one turn, then shows the incoming view and attaches it.
#[derive(Copy, Clone, Debug, Default)]
pub struct Entrance;

impl Entrance {
    /// Registry name.
    pub const NAME: &'static str = "entrance";
}

#[async_trait(?Send)]
impl Transition for Entrance {
    async fn run(&self, context: &TransitionContext) -> Result<(), CompositionError> {
        if let Some(active) = context.active_view {
            context.tree.borrow_mut().hide(active);
        }
        yield_now().await;
        if let Some(child) = context.child {
            context.tree.borrow_mut().show(child);
            context.trigger_attach();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{ViewNode, ViewTree};
    use core::cell::Cell;
    use futures::executor::block_on;

    #[test]
    fn registry_resolves_defaults_and_reports_unknown() {
        let registry = TransitionRegistry::default();
        assert!(registry.resolve("entrance").is_ok());
        assert!(matches!(
            registry.resolve("fade"),
            Err(CompositionError::UnknownTransition(name)) if name == "fade"
        ));
        assert!(TransitionRegistry::empty().resolve("entrance").is_err());
    }

    #[test]
    fn entrance_swaps_visibility_and_attaches_once() {
        let tree = ViewTree::shared();
        let (host, old, new) = {
            let mut t = tree.borrow_mut();
            let host = t.insert(None, ViewNode::new("host"));
            let old = t.insert(Some(host), ViewNode::new("old"));
            let new = t.insert(Some(host), ViewNode::new("new"));
            t.hide(new);
            (host, old, new)
        };
        let attached = Rc::new(Cell::new(0));
        let counter = attached.clone();
        let context = TransitionContext {
            tree: tree.clone(),
            parent: host,
            active_view: Some(old),
            child: Some(new),
            trigger_attach: Rc::new(move || counter.set(counter.get() + 1)),
        };

        block_on(Entrance.run(&context)).unwrap();
        assert!(!tree.borrow().is_visible(old));
        assert!(tree.borrow().is_visible(new));
        assert_eq!(attached.get(), 1);
    }
}
