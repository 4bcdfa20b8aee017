// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The render target: a retained tree of view elements.
//!
//! ## Overview
//!
//! [`ViewTree`] stores [`ViewNode`]s in generational slots. Composition uses it to find the
//! views already hosted by an element, to insert newly located views, and to hide, show, or
//! remove views as they are superseded.
//!
//! Removing a view runs the detach callbacks registered on it and on its descendants.
//! Those callbacks are returned as a [`Detached`] batch so they can run after any borrow of
//! the tree has been released.

use std::rc::Rc;

use core::cell::RefCell;

use crate::model::ViewModel;

/// Identifier for a view in a [`ViewTree`].
///
/// A slot index plus a generation counter. The generation is bumped when a freed slot is
/// reused, so a stale `ViewId` never aliases a newer view.
/// Use [`ViewTree::is_alive`] to check liveness.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub(crate) u32, pub(crate) u32);

impl ViewId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Per-view flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ViewFlags: u8 {
        /// View is displayed.
        const VISIBLE      = 0b0000_0001;
        /// View is the active view of its host.
        const ACTIVE       = 0b0000_0010;
        /// View hosts its own nested composition; part discovery does not descend into it.
        const COMPOSE_HOST = 0b0000_0100;
        /// View must be removed rather than hidden when a caching host supersedes it.
        const NO_CACHE     = 0b0000_1000;
    }
}

impl Default for ViewFlags {
    fn default() -> Self {
        Self::VISIBLE
    }
}

/// Element data for a view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewNode {
    /// Element name, for diagnostics.
    pub tag: String,
    /// Identity of the template this view came from; compared to skip transitions and to
    /// find cached views.
    pub view_id: Option<String>,
    /// Name of the replaceable part this element provides.
    pub part: Option<String>,
    /// Visibility and behavior flags.
    pub flags: ViewFlags,
}

impl ViewNode {
    /// Create a visible element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Set the template identity.
    pub fn with_view_id(mut self, view_id: impl Into<String>) -> Self {
        self.view_id = Some(view_id.into());
        self
    }

    /// Set the part name.
    pub fn with_part(mut self, part: impl Into<String>) -> Self {
        self.part = Some(part.into());
        self
    }

    /// Add flags.
    pub fn with_flags(mut self, flags: ViewFlags) -> Self {
        self.flags |= flags;
        self
    }
}

/// The model a view is bound to.
#[derive(Clone)]
pub struct Binding {
    /// Bound model. `None` for views bound without a model.
    pub model: Option<Rc<dyn ViewModel>>,
    /// Name the model is exposed under in the view's scope.
    pub alias: Option<String>,
}

impl core::fmt::Debug for Binding {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Binding")
            .field("has_model", &self.model.is_some())
            .field("alias", &self.alias)
            .finish()
    }
}

type DetachCallback = Box<dyn FnOnce()>;

/// Detach callbacks collected while removing views.
#[must_use = "detach callbacks are lost unless `run` is called"]
#[derive(Default)]
pub struct Detached {
    callbacks: Vec<DetachCallback>,
}

impl Detached {
    /// Run the callbacks, innermost views first.
    pub fn run(self) {
        for cb in self.callbacks {
            cb();
        }
    }

    /// Number of pending callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// True if there is nothing to run.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub(crate) fn absorb(&mut self, other: Self) {
        self.callbacks.extend(other.callbacks);
    }
}

impl core::fmt::Debug for Detached {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Detached")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

struct Node {
    generation: u32,
    parent: Option<ViewId>,
    children: Vec<ViewId>,
    data: ViewNode,
    binding: Option<Binding>,
    on_detach: Vec<DetachCallback>,
}

impl Node {
    fn new(generation: u32, data: ViewNode) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            data,
            binding: None,
            on_detach: Vec::new(),
        }
    }
}

/// A retained tree of views.
#[derive(Default)]
pub struct ViewTree {
    nodes: Vec<Option<Node>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
}

/// A view tree shared between the engine and its collaborators.
pub type SharedTree = Rc<RefCell<ViewTree>>;

impl core::fmt::Debug for ViewTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ViewTree")
            .field("nodes_total", &self.nodes.len())
            .field("nodes_alive", &self.len())
            .field("free_list", &self.free_list.len())
            .finish_non_exhaustive()
    }
}

impl ViewTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty tree behind a shared handle.
    pub fn shared() -> SharedTree {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Number of live views.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// True if no view is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a view as the last child of `parent`, or as a root if `None`.
    pub fn insert(&mut self, parent: Option<ViewId>, data: ViewNode) -> ViewId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, data));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "ViewId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, data)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "ViewId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let id = ViewId::new(idx, generation);
        if let Some(parent) = parent
            && self.is_alive(parent)
        {
            self.link(id, parent, false);
        }
        id
    }

    /// Returns true if `id` refers to a live view.
    pub fn is_alive(&self, id: ViewId) -> bool {
        self.node(id).is_some()
    }

    /// Element data of a live view.
    pub fn get(&self, id: ViewId) -> Option<&ViewNode> {
        self.node(id).map(|n| &n.data)
    }

    /// Mutable element data of a live view.
    pub fn get_mut(&mut self, id: ViewId) -> Option<&mut ViewNode> {
        self.node_mut(id).map(|n| &mut n.data)
    }

    /// Parent of a live view.
    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Children of a live view, in order. Empty for stale ids.
    pub fn children(&self, id: ViewId) -> &[ViewId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Template identity of a live view.
    pub fn view_id(&self, id: ViewId) -> Option<&str> {
        self.node(id).and_then(|n| n.data.view_id.as_deref())
    }

    /// Part name of a live view.
    pub fn part(&self, id: ViewId) -> Option<&str> {
        self.node(id).and_then(|n| n.data.part.as_deref())
    }

    /// True if the view carries all of `flags`.
    pub fn has_flags(&self, id: ViewId, flags: ViewFlags) -> bool {
        self.node(id).is_some_and(|n| n.data.flags.contains(flags))
    }

    /// Hide a view.
    pub fn hide(&mut self, id: ViewId) {
        self.set_flag(id, ViewFlags::VISIBLE, false);
    }

    /// Show a view.
    pub fn show(&mut self, id: ViewId) {
        self.set_flag(id, ViewFlags::VISIBLE, true);
    }

    /// True if the view is alive and visible.
    pub fn is_visible(&self, id: ViewId) -> bool {
        self.has_flags(id, ViewFlags::VISIBLE)
    }

    /// Mark or unmark a view as the active view of its host.
    pub fn set_active(&mut self, id: ViewId, active: bool) {
        self.set_flag(id, ViewFlags::ACTIVE, active);
    }

    /// True if the view is alive and marked active.
    pub fn is_active(&self, id: ViewId) -> bool {
        self.has_flags(id, ViewFlags::ACTIVE)
    }

    fn set_flag(&mut self, id: ViewId, flag: ViewFlags, on: bool) {
        if let Some(n) = self.node_mut(id) {
            n.data.flags.set(flag, on);
        }
    }

    /// Move `child` to the front of `parent`'s children.
    pub fn prepend(&mut self, parent: ViewId, child: ViewId) {
        if !self.is_alive(parent) || !self.is_alive(child) || parent == child {
            return;
        }
        self.detach(child);
        self.link(child, parent, true);
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append(&mut self, parent: ViewId, child: ViewId) {
        if !self.is_alive(parent) || !self.is_alive(child) || parent == child {
            return;
        }
        self.detach(child);
        self.link(child, parent, false);
    }

    /// Unlink a view from its parent, keeping it alive as a root.
    pub fn detach(&mut self, id: ViewId) {
        if let Some(parent) = self.parent(id) {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|c| *c != id);
            }
            if let Some(n) = self.node_mut(id) {
                n.parent = None;
            }
        }
    }

    /// Remove a view and its subtree.
    pub fn remove(&mut self, id: ViewId) -> Detached {
        let mut detached = Detached::default();
        if !self.is_alive(id) {
            return detached;
        }
        self.detach(id);
        self.free_subtree(id, &mut detached);
        detached
    }

    /// Remove every child of a view.
    pub fn empty(&mut self, id: ViewId) -> Detached {
        let mut detached = Detached::default();
        for child in self.children(id).to_vec() {
            detached.absorb(self.remove(child));
        }
        detached
    }

    /// Put `new` in `old`'s place under `old`'s parent, then remove `old`.
    pub fn replace(&mut self, old: ViewId, new: ViewId) -> Detached {
        if !self.is_alive(old) || !self.is_alive(new) || old == new {
            return Detached::default();
        }
        self.detach(new);
        if let Some(parent) = self.parent(old)
            && let Some(p) = self.node_mut(parent)
            && let Some(pos) = p.children.iter().position(|c| *c == old)
        {
            p.children[pos] = new;
            if let Some(n) = self.node_mut(old) {
                n.parent = None;
            }
            if let Some(n) = self.node_mut(new) {
                n.parent = Some(parent);
            }
        }
        self.remove(old)
    }

    /// Copy a view and its subtree into a new unparented subtree.
    ///
    /// Element data is copied; bindings and detach callbacks are not.
    pub fn deep_clone(&mut self, id: ViewId) -> Option<ViewId> {
        let data = self.get(id)?.clone();
        let copy = self.insert(None, data);
        for child in self.children(id).to_vec() {
            if let Some(child_copy) = self.deep_clone(child) {
                self.link(child_copy, copy, false);
            }
        }
        Some(copy)
    }

    /// Register a callback run when the view is removed.
    pub fn add_detach_callback(&mut self, id: ViewId, callback: impl FnOnce() + 'static) {
        if let Some(n) = self.node_mut(id) {
            n.on_detach.push(Box::new(callback));
        }
    }

    /// The binding of a view.
    pub fn binding(&self, id: ViewId) -> Option<&Binding> {
        self.node(id).and_then(|n| n.binding.as_ref())
    }

    /// The model a view is bound to.
    pub fn bound_model(&self, id: ViewId) -> Option<Rc<dyn ViewModel>> {
        self.binding(id).and_then(|b| b.model.clone())
    }

    /// Bind a view.
    pub fn set_binding(&mut self, id: ViewId, binding: Binding) {
        if let Some(n) = self.node_mut(id) {
            n.binding = Some(binding);
        }
    }

    /// True if the view is bound, and bound to `model` (by identity).
    ///
    /// `None` matches a view bound without a model.
    pub fn is_bound_to(&self, id: ViewId, model: Option<&Rc<dyn ViewModel>>) -> bool {
        match (self.binding(id), model) {
            (Some(Binding { model: Some(bound), .. }), Some(model)) => Rc::ptr_eq(bound, model),
            (Some(Binding { model: None, .. }), None) => true,
            _ => false,
        }
    }

    /// Iterate a view's descendants in depth-first pre-order, excluding the view itself.
    pub fn descendants(&self, id: ViewId) -> Vec<ViewId> {
        let mut out = Vec::new();
        let mut stack: Vec<ViewId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    // --- internals ---

    fn node(&self, id: ViewId) -> Option<&Node> {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .filter(|n| n.generation == id.1)
    }

    fn node_mut(&mut self, id: ViewId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }

    fn link(&mut self, id: ViewId, parent: ViewId, front: bool) {
        if let Some(p) = self.node_mut(parent) {
            if front {
                p.children.insert(0, id);
            } else {
                p.children.push(id);
            }
        }
        if let Some(n) = self.node_mut(id) {
            n.parent = Some(parent);
        }
    }

    fn free_subtree(&mut self, id: ViewId, detached: &mut Detached) {
        for child in self.children(id).to_vec() {
            self.free_subtree(child, detached);
        }
        if let Some(node) = self.nodes[id.idx()].take() {
            detached.callbacks.extend(node.on_detach);
            self.free_list.push(id.idx());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    fn el(tag: &str) -> ViewNode {
        ViewNode::new(tag)
    }

    #[test]
    fn insert_and_structure() {
        let mut tree = ViewTree::new();
        let host = tree.insert(None, el("host"));
        let a = tree.insert(Some(host), el("a"));
        let b = tree.insert(Some(host), el("b"));
        assert_eq!(tree.children(host), &[a, b]);
        assert_eq!(tree.parent(a), Some(host));
        assert!(tree.is_visible(a));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn stale_ids_do_not_alias() {
        let mut tree = ViewTree::new();
        let a = tree.insert(None, el("a"));
        tree.remove(a).run();
        assert!(!tree.is_alive(a));
        let b = tree.insert(None, el("b"));
        assert_eq!(a.0, b.0);
        assert!(!tree.is_alive(a));
        assert!(tree.is_alive(b));
        assert!(tree.get(a).is_none());
    }

    #[test]
    fn prepend_moves_to_front() {
        let mut tree = ViewTree::new();
        let host = tree.insert(None, el("host"));
        let a = tree.insert(Some(host), el("a"));
        let b = tree.insert(None, el("b"));
        tree.prepend(host, b);
        assert_eq!(tree.children(host), &[b, a]);
        tree.prepend(host, a);
        assert_eq!(tree.children(host), &[a, b]);
    }

    #[test]
    fn remove_runs_detach_callbacks_for_subtree() {
        let mut tree = ViewTree::new();
        let host = tree.insert(None, el("host"));
        let view = tree.insert(Some(host), el("view"));
        let inner = tree.insert(Some(view), el("inner"));
        let hits = Rc::new(Cell::new(0));
        for id in [view, inner] {
            let hits = hits.clone();
            tree.add_detach_callback(id, move || hits.set(hits.get() + 1));
        }

        let detached = tree.empty(host);
        assert_eq!(detached.len(), 2);
        assert_eq!(hits.get(), 0);
        detached.run();
        assert_eq!(hits.get(), 2);
        assert!(tree.children(host).is_empty());
        assert!(!tree.is_alive(inner));
    }

    #[test]
    fn replace_keeps_position() {
        let mut tree = ViewTree::new();
        let host = tree.insert(None, el("host"));
        let a = tree.insert(Some(host), el("a"));
        let b = tree.insert(Some(host), el("b"));
        let c = tree.insert(Some(host), el("c"));
        let d = tree.insert(None, el("d"));

        tree.replace(b, d).run();
        assert_eq!(tree.children(host), &[a, d, c]);
        assert!(!tree.is_alive(b));
    }

    #[test]
    fn deep_clone_copies_data_only() {
        let mut tree = ViewTree::new();
        let view = tree.insert(None, el("view").with_view_id("shell"));
        let part = tree.insert(Some(view), el("header").with_part("header"));
        tree.set_binding(
            view,
            Binding {
                model: None,
                alias: None,
            },
        );

        let copy = tree.deep_clone(view).unwrap();
        assert_ne!(copy, view);
        assert_eq!(tree.view_id(copy), Some("shell"));
        assert!(tree.binding(copy).is_none());
        let copied_part = tree.children(copy)[0];
        assert_ne!(copied_part, part);
        assert_eq!(tree.part(copied_part), Some("header"));
    }

    #[test]
    fn flags_and_descendants() {
        let mut tree = ViewTree::new();
        let root = tree.insert(None, el("root"));
        let a = tree.insert(Some(root), el("a"));
        let a1 = tree.insert(Some(a), el("a1"));
        let b = tree.insert(Some(root), el("b"));

        assert_eq!(tree.descendants(root), vec![a, a1, b]);

        tree.hide(a);
        tree.set_active(b, true);
        assert!(!tree.is_visible(a));
        assert!(tree.is_active(b));
        tree.show(a);
        tree.set_active(b, false);
        assert!(tree.is_visible(a));
        assert!(!tree.is_active(b));
    }
}
