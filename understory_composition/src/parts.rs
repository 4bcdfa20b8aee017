// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Replaceable parts.
//!
//! A view marks elements as named parts through [`ViewNode::part`](crate::view::ViewNode::part).
//! A templated composition supplies replacement fragments carrying the same names; each
//! fragment is cloned and swapped in for the matching part of the composed view.

use std::collections::BTreeMap;

use tracing::warn;

use crate::view::{Detached, ViewFlags, ViewId, ViewTree};

/// Collect the named parts within `roots`, keyed by part name.
///
/// A root may itself be a part. The search does not descend into nested compose hosts,
/// whose parts belong to their own composition. Later elements win on duplicate names.
pub fn find_parts(tree: &ViewTree, roots: &[ViewId]) -> BTreeMap<String, ViewId> {
    let mut parts = BTreeMap::new();
    for &root in roots {
        collect(tree, root, &mut parts);
    }
    parts
}

fn collect(tree: &ViewTree, id: ViewId, parts: &mut BTreeMap<String, ViewId>) {
    let Some(node) = tree.get(id) else {
        return;
    };
    if let Some(name) = &node.part {
        parts.insert(name.clone(), id);
    }
    if node.flags.contains(ViewFlags::COMPOSE_HOST) {
        return;
    }
    for &child in tree.children(id) {
        collect(tree, child, parts);
    }
}

/// Splice clones of the `replacements` into the matching parts of `view`.
///
/// Standard parts are looked up with [`find_parts`]; a name not found there is searched
/// for in every descendant, nested hosts included. Names with no match are logged and skipped.
pub fn replace_parts(tree: &mut ViewTree, view: ViewId, replacements: &[ViewId]) -> Detached {
    let clones: Vec<ViewId> = replacements
        .iter()
        .filter_map(|&r| tree.deep_clone(r))
        .collect();
    let incoming = find_parts(tree, &clones);
    let standard = find_parts(tree, &[view]);

    let mut detached = Detached::default();
    for (name, replacement) in incoming {
        let target = standard.get(&name).copied().or_else(|| {
            tree.descendants(view)
                .into_iter()
                .find(|&d| tree.part(d) == Some(name.as_str()))
        });
        let Some(target) = target else {
            warn!(part = %name, "no part to override");
            continue;
        };
        detached.absorb(tree.replace(target, replacement));
    }

    // Clones which did not land in the view are dropped.
    for clone in clones {
        if tree.is_alive(clone) && tree.parent(clone).is_none() {
            detached.absorb(tree.remove(clone));
        }
    }
    detached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ViewNode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer};
    use tracing_subscriber::prelude::*;

    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn shell(tree: &mut ViewTree) -> (ViewId, ViewId, ViewId) {
        let view = tree.insert(None, ViewNode::new("shell"));
        let header = tree.insert(Some(view), ViewNode::new("h1").with_part("header"));
        let body = tree.insert(Some(view), ViewNode::new("div").with_part("body"));
        (view, header, body)
    }

    #[test]
    fn parts_stop_at_nested_hosts() {
        let mut tree = ViewTree::new();
        let (view, header, _) = shell(&mut tree);
        let nested = tree.insert(
            Some(view),
            ViewNode::new("div")
                .with_part("nested")
                .with_flags(ViewFlags::COMPOSE_HOST),
        );
        tree.insert(Some(nested), ViewNode::new("span").with_part("hidden"));

        let parts = find_parts(&tree, &[view]);
        assert_eq!(parts.get("header"), Some(&header));
        assert_eq!(parts.get("nested"), Some(&nested));
        assert!(!parts.contains_key("hidden"));
    }

    #[test]
    fn replacements_are_cloned_into_place() {
        let mut tree = ViewTree::new();
        let (view, header, body) = shell(&mut tree);
        let fragment = tree.insert(None, ViewNode::new("h2").with_part("header"));

        replace_parts(&mut tree, view, &[fragment]).run();

        let children = tree.children(view).to_vec();
        assert_eq!(children.len(), 2);
        assert!(!tree.is_alive(header));
        assert_eq!(tree.get(children[0]).unwrap().tag, "h2");
        assert_eq!(children[1], body);
        // The caller's fragment stays reusable.
        assert!(tree.is_alive(fragment));
        assert!(tree.parent(fragment).is_none());
    }

    #[test]
    fn parts_inside_nested_hosts_are_found_by_fallback() {
        let mut tree = ViewTree::new();
        let (view, _, _) = shell(&mut tree);
        let nested = tree.insert(
            Some(view),
            ViewNode::new("div").with_flags(ViewFlags::COMPOSE_HOST),
        );
        let deep = tree.insert(Some(nested), ViewNode::new("span").with_part("deep"));
        let fragment = tree.insert(None, ViewNode::new("em").with_part("deep"));

        replace_parts(&mut tree, view, &[fragment]).run();
        assert!(!tree.is_alive(deep));
        assert_eq!(tree.get(tree.children(nested)[0]).unwrap().tag, "em");
    }

    #[test]
    fn unmatched_part_warns_and_skips() {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(count.clone()));
        tracing::subscriber::with_default(subscriber, || {
            let mut tree = ViewTree::new();
            let (view, _, _) = shell(&mut tree);
            let before = tree.len();
            let fragment = tree.insert(None, ViewNode::new("aside").with_part("sidebar"));
            replace_parts(&mut tree, view, &[fragment]).run();
            assert_eq!(tree.len(), before + 1);
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
