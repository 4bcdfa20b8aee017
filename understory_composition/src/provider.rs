// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collaborators consumed by the engine: view location and binding.

use core::cell::RefCell;
use core::fmt;
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CompositionError;
use crate::model::ViewModel;
use crate::view::{Binding, SharedTree, ViewId, ViewNode, ViewTree};

/// Resolves view names to views in the tree.
///
/// `candidates` are views already hosted by the composition target when it caches views;
/// a locator should return one of them when it matches, instead of creating a new view.
#[async_trait(?Send)]
pub trait ViewLocator {
    /// Locate the view named `view`.
    async fn locate_view(
        &self,
        tree: &SharedTree,
        view: &str,
        candidates: &[ViewId],
    ) -> Result<ViewId, CompositionError>;

    /// Locate the view for a model.
    ///
    /// The default asks the model for its view name through [`ViewModel::view`].
    async fn locate_view_for_object(
        &self,
        tree: &SharedTree,
        model: &Rc<dyn ViewModel>,
        candidates: &[ViewId],
    ) -> Result<ViewId, CompositionError> {
        match model.view() {
            Some(name) => self.locate_view(tree, &name, candidates).await,
            None => Err(CompositionError::MissingView),
        }
    }
}

/// Builds a fresh view subtree and returns its root.
pub type Template = Rc<dyn Fn(&mut ViewTree) -> ViewId>;

/// A [`ViewLocator`] backed by named templates.
///
/// A candidate whose [`view_id`](ViewNode::view_id) equals the requested name is reused.
/// Otherwise the template is instantiated and its root tagged with the name.
#[derive(Default)]
pub struct TemplateLocator {
    templates: RefCell<HashMap<String, Template>>,
}

impl fmt::Debug for TemplateLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.templates.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("TemplateLocator")
            .field("templates", &names)
            .finish()
    }
}

impl TemplateLocator {
    /// Create a locator with no templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under `name`, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, template: impl Fn(&mut ViewTree) -> ViewId + 'static) {
        self.templates
            .borrow_mut()
            .insert(name.into(), Rc::new(template));
    }

    /// Register a template producing a single element with the given tag.
    pub fn register_element(&self, name: impl Into<String>, tag: impl Into<String>) {
        let tag = tag.into();
        self.register(name, move |tree| tree.insert(None, ViewNode::new(tag.clone())));
    }
}

#[async_trait(?Send)]
impl ViewLocator for TemplateLocator {
    async fn locate_view(
        &self,
        tree: &SharedTree,
        view: &str,
        candidates: &[ViewId],
    ) -> Result<ViewId, CompositionError> {
        {
            let tree = tree.borrow();
            if let Some(&cached) = candidates
                .iter()
                .find(|&&c| tree.view_id(c) == Some(view))
            {
                debug!(view, "reusing cached view");
                return Ok(cached);
            }
        }
        let template = self
            .templates
            .borrow()
            .get(view)
            .cloned()
            .ok_or_else(|| CompositionError::ViewNotFound(view.into()))?;
        let mut tree = tree.borrow_mut();
        let root = template(&mut tree);
        if let Some(node) = tree.get_mut(root) {
            node.view_id = Some(view.into());
        }
        Ok(root)
    }
}

/// The binding scope a composition runs in.
///
/// Contexts form a chain: a child context keeps a link to the context it was created from.
#[derive(Clone, Default)]
pub struct BindingContext {
    /// The model in scope.
    pub data: Option<Rc<dyn ViewModel>>,
    /// Name the model is exposed under.
    pub alias: Option<String>,
    /// The enclosing context.
    pub parent: Option<Rc<BindingContext>>,
}

impl fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingContext")
            .field("has_data", &self.data.is_some())
            .field("alias", &self.alias)
            .field("depth", &self.depth())
            .finish()
    }
}

impl BindingContext {
    /// A root context for `data`.
    pub fn new(data: Option<Rc<dyn ViewModel>>) -> Self {
        Self {
            data,
            alias: None,
            parent: None,
        }
    }

    /// A context nested in this one.
    pub fn extend(&self, data: Option<Rc<dyn ViewModel>>, alias: Option<String>) -> Self {
        Self {
            data,
            alias,
            parent: Some(Rc::new(self.clone())),
        }
    }

    /// Number of enclosing contexts.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut next = self.parent.as_deref();
        while let Some(ctx) = next {
            depth += 1;
            next = ctx.parent.as_deref();
        }
        depth
    }
}

/// Attaches models to views.
///
/// [`binding`](Self::binding) and [`binding_complete`](Self::binding_complete) are extension
/// points run around every bind. The default `bind` methods record the binding on the view.
pub trait Binder {
    /// Runs before a view is bound.
    fn binding(&self, _tree: &ViewTree, _view: ViewId, _model: Option<&Rc<dyn ViewModel>>) {}

    /// Runs after a view is bound.
    fn binding_complete(&self, _tree: &ViewTree, _view: ViewId, _model: Option<&Rc<dyn ViewModel>>) {
    }

    /// Bind `view` to `model`, or to nothing.
    fn bind(
        &self,
        tree: &mut ViewTree,
        model: Option<&Rc<dyn ViewModel>>,
        view: ViewId,
    ) -> Result<(), CompositionError> {
        if !tree.is_alive(view) {
            return Err(CompositionError::StaleView(view));
        }
        self.binding(tree, view, model);
        tree.set_binding(
            view,
            Binding {
                model: model.cloned(),
                alias: None,
            },
        );
        self.binding_complete(tree, view, model);
        Ok(())
    }

    /// Bind `view` within an existing context.
    ///
    /// A `model` becomes the scope's data, exposed as `alias` when given; without one the
    /// view shares the context's data.
    fn bind_context(
        &self,
        tree: &mut ViewTree,
        context: &BindingContext,
        view: ViewId,
        model: Option<&Rc<dyn ViewModel>>,
        alias: Option<&str>,
    ) -> Result<(), CompositionError> {
        if !tree.is_alive(view) {
            return Err(CompositionError::StaleView(view));
        }
        let scope = match model {
            Some(model) => context.extend(Some(model.clone()), alias.map(Into::into)),
            None => context.clone(),
        };
        self.binding(tree, view, scope.data.as_ref());
        tree.set_binding(
            view,
            Binding {
                model: scope.data.clone(),
                alias: scope.alias.clone(),
            },
        );
        self.binding_complete(tree, view, scope.data.as_ref());
        Ok(())
    }
}

/// A [`Binder`] with only the default behavior.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultBinder;

impl Binder for DefaultBinder {}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use understory_activator::participant::Participant;

    struct Named(&'static str);

    impl Participant for Named {}

    impl ViewModel for Named {
        fn view(&self) -> Option<String> {
            Some(self.0.into())
        }
    }

    struct Anonymous;

    impl Participant for Anonymous {}
    impl ViewModel for Anonymous {}

    #[test]
    fn template_instantiated_and_tagged() {
        let tree = ViewTree::shared();
        let locator = TemplateLocator::new();
        locator.register_element("home", "section");

        let view = block_on(locator.locate_view(&tree, "home", &[])).unwrap();
        let again = block_on(locator.locate_view(&tree, "home", &[])).unwrap();
        assert_ne!(view, again);
        assert_eq!(tree.borrow().view_id(view), Some("home"));
        assert_eq!(tree.borrow().get(view).unwrap().tag, "section");
    }

    #[test]
    fn candidates_are_reused() {
        let tree = ViewTree::shared();
        let locator = TemplateLocator::new();
        locator.register_element("home", "section");
        let cached = block_on(locator.locate_view(&tree, "home", &[])).unwrap();

        let found = block_on(locator.locate_view(&tree, "home", &[cached])).unwrap();
        assert_eq!(found, cached);
        assert_eq!(tree.borrow().len(), 1);
    }

    #[test]
    fn unknown_names_and_models_without_views() {
        let tree = ViewTree::shared();
        let locator = TemplateLocator::new();
        locator.register_element("home", "section");

        assert_eq!(
            block_on(locator.locate_view(&tree, "missing", &[])),
            Err(CompositionError::ViewNotFound("missing".into()))
        );
        let named: Rc<dyn ViewModel> = Rc::new(Named("home"));
        assert!(block_on(locator.locate_view_for_object(&tree, &named, &[])).is_ok());
        let anonymous: Rc<dyn ViewModel> = Rc::new(Anonymous);
        assert_eq!(
            block_on(locator.locate_view_for_object(&tree, &anonymous, &[])),
            Err(CompositionError::MissingView)
        );
    }

    #[test]
    fn bind_context_scopes_model_under_alias() {
        let mut tree = ViewTree::new();
        let view = tree.insert(None, ViewNode::new("div"));
        let outer: Rc<dyn ViewModel> = Rc::new(Anonymous);
        let inner: Rc<dyn ViewModel> = Rc::new(Named("item"));
        let ctx = BindingContext::new(Some(outer.clone()));

        DefaultBinder
            .bind_context(&mut tree, &ctx, view, Some(&inner), Some("item"))
            .unwrap();
        let binding = tree.binding(view).unwrap();
        assert!(tree.is_bound_to(view, Some(&inner)));
        assert_eq!(binding.alias.as_deref(), Some("item"));

        // Without a model the view shares the context's data.
        let plain = tree.insert(None, ViewNode::new("div"));
        DefaultBinder
            .bind_context(&mut tree, &ctx, plain, None, None)
            .unwrap();
        assert!(tree.is_bound_to(plain, Some(&outer)));
    }

    #[test]
    fn binding_stale_view_fails() {
        let mut tree = ViewTree::new();
        let view = tree.insert(None, ViewNode::new("div"));
        tree.remove(view).run();
        assert_eq!(
            DefaultBinder.bind(&mut tree, None, view),
            Err(CompositionError::StaleView(view))
        );
    }
}
