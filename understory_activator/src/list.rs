// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! List mode: one activator managing activation among a shared collection.
//!
//! ## Overview
//!
//! [`Activator::for_items`] turns an activator into the host of a tab strip or
//! document list. In this mode:
//!
//! - Deactivating the outgoing item does not close it (`close_on_deactivate` is false).
//! - Activating an item that is not in the list appends it; activating an equal item
//!   reuses the list's instance.
//! - Activating `None` picks a neighbor of the current item, see [`next_item_after_removal`].
//! - Closing an item removes it from the list instead of emptying the slot.
//! - [`Activator::can_deactivate`] and [`Activator::deactivate`] with `close = true` fan out
//!   across every item concurrently.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::join_all;
use tracing::debug;

use crate::activator::Activator;
use crate::participant::Participant;
use crate::tick::yield_now;
use crate::types::ActivationOptions;

/// A shared, ordered collection of items managed by a list-mode activator.
///
/// Cloning produces another handle to the same list. Membership is by identity.
pub struct ItemList<T: ?Sized> {
    items: Rc<RefCell<Vec<Rc<T>>>>,
}

impl<T: ?Sized> Clone for ItemList<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<T: ?Sized> Default for ItemList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> core::fmt::Debug for ItemList<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ItemList")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<T: ?Sized> ItemList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            items: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Create a list holding `items` in order.
    pub fn from_items(items: impl IntoIterator<Item = Rc<T>>) -> Self {
        Self {
            items: Rc::new(RefCell::new(items.into_iter().collect())),
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// True if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// The item at `index`.
    pub fn get(&self, index: usize) -> Option<Rc<T>> {
        self.items.borrow().get(index).cloned()
    }

    /// Index of `item`, compared by identity.
    pub fn position(&self, item: &Rc<T>) -> Option<usize> {
        self.items.borrow().iter().position(|i| Rc::ptr_eq(i, item))
    }

    /// True if `item` is in the list.
    pub fn contains(&self, item: &Rc<T>) -> bool {
        self.position(item).is_some()
    }

    /// Append an item.
    pub fn push(&self, item: Rc<T>) {
        self.items.borrow_mut().push(item);
    }

    /// Remove `item`, returning the index it occupied.
    pub fn remove(&self, item: &Rc<T>) -> Option<usize> {
        let index = self.position(item)?;
        let removed = self.items.borrow_mut().remove(index);
        drop(removed);
        Some(index)
    }

    /// A copy of the current contents.
    pub fn snapshot(&self) -> Vec<Rc<T>> {
        self.items.borrow().clone()
    }
}

/// Pick the item to activate when the item at `index` of `items` goes away.
///
/// `items` is the list as it was before the removal:
/// - removing index 0 from a list of more than one item picks index 1;
/// - removing an interior item picks the item that slides into its index;
/// - anything else picks nothing.
///
/// Closing the last item does not fall back to its predecessor, so closing the final tab
/// leaves the activator empty.
pub fn next_item_after_removal<T: ?Sized>(items: &[Rc<T>], index: usize) -> Option<Rc<T>> {
    let len = items.len();
    if index == 0 && len > 1 {
        return Some(items[1].clone());
    }
    if index > 0 && index + 1 < len {
        return Some(items[index + 1].clone());
    }
    None
}

pub(crate) struct ListState<T: ?Sized> {
    pub(crate) items: ItemList<T>,
    // Index freed by the most recent close, for picking a neighbor afterwards.
    last_removed: Cell<Option<usize>>,
}

impl<T: ?Sized> ListState<T> {
    pub(crate) fn new(items: ItemList<T>) -> Self {
        Self {
            items,
            last_removed: Cell::new(None),
        }
    }
}

impl<T: ?Sized + Participant + 'static> Activator<T> {
    /// Switch this activator to list mode over `items`.
    ///
    /// See the [module docs](crate::list) for the resulting behavior.
    pub fn for_items(self, items: ItemList<T>) -> Self {
        self.inner.settings.borrow_mut().close_on_deactivate = false;
        *self.inner.list.borrow_mut() = Some(Rc::new(ListState::new(items)));
        self
    }

    /// The managed list, when in list mode.
    pub fn items(&self) -> Option<ItemList<T>> {
        self.list_state().map(|state| state.items.clone())
    }

    pub(crate) fn list_state(&self) -> Option<Rc<ListState<T>>> {
        self.inner.list.borrow().clone()
    }

    pub(crate) fn list_before_activate(
        &self,
        state: &ListState<T>,
        new_item: Option<Rc<T>>,
    ) -> Option<Rc<T>> {
        match new_item {
            Some(item) => {
                state.last_removed.set(None);
                match state.items.position(&item) {
                    Some(index) => state.items.get(index),
                    None => {
                        state.items.push(item.clone());
                        Some(item)
                    }
                }
            }
            None => {
                let snapshot = state.items.snapshot();
                let current = self.active_item();
                match current.and_then(|c| snapshot.iter().position(|i| Rc::ptr_eq(i, &c))) {
                    Some(index) => next_item_after_removal(&snapshot, index),
                    // The current item was already closed; its neighbor now sits at its old index.
                    None => state
                        .last_removed
                        .take()
                        .and_then(|index| snapshot.get(index).cloned()),
                }
            }
        }
    }

    pub(crate) fn list_after_deactivate(&self, state: &ListState<T>, item: &Rc<T>, close: bool) {
        if close && let Some(index) = state.items.remove(item) {
            debug!(index, "closed item removed from list");
            state.last_removed.set(Some(index));
        }
    }

    pub(crate) async fn can_deactivate_all(&self, items: &ItemList<T>) -> bool {
        let list = items.snapshot();
        let checks = list
            .iter()
            .map(|item| self.can_deactivate_item(Some(item), true, ActivationOptions::default()));
        join_all(checks).await.into_iter().all(|ok| ok)
    }

    pub(crate) async fn deactivate_all(&self, items: &ItemList<T>) -> bool {
        let list = items.snapshot();
        let steps = list.iter().enumerate().map(|(i, item)| async move {
            // Stagger so removals land on successive turns.
            for _ in 0..=i {
                yield_now().await;
            }
            self.deactivate_item(Some(item), true).await
        });
        let all_closed = join_all(steps).await.into_iter().fold(true, |acc, ok| acc && ok);

        if let Some(current) = self.active_item()
            && !items.contains(&current)
        {
            self.force_active_item(None);
        }
        all_closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Log, Probe, entries};
    use crate::types::{ActivationData, Response};
    use futures::executor::block_on;

    fn list_of(names: &[&'static str], log: &Log) -> Vec<Rc<Probe>> {
        names.iter().map(|&n| Rc::new(Probe::new(n, log))).collect()
    }

    #[test]
    fn next_item_policy() {
        let log = Log::default();
        let items = list_of(&["a", "b", "c"], &log);
        let name = |p: Option<Rc<Probe>>| p.map(|p| p.name);

        assert_eq!(name(next_item_after_removal(&items, 0)), Some("b"));
        assert_eq!(name(next_item_after_removal(&items, 1)), Some("c"));
        assert_eq!(name(next_item_after_removal(&items, 2)), None);
        assert_eq!(name(next_item_after_removal(&items[..1], 0)), None);
        assert_eq!(name(next_item_after_removal::<Probe>(&[], 0)), None);
    }

    #[test]
    fn item_list_identity_membership() {
        let log = Log::default();
        let items = list_of(&["a", "b"], &log);
        let list = ItemList::from_items(items.clone());
        let stranger = Rc::new(Probe::new("a", &log));

        assert!(list.contains(&items[0]));
        assert!(!list.contains(&stranger));
        assert_eq!(list.remove(&items[0]), Some(0));
        assert_eq!(list.remove(&items[0]), None);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn aggregate_guard_requires_every_item() {
        let log = Log::default();
        let items = vec![
            Rc::new(Probe::new("i1", &log)),
            Rc::new(Probe::new("i2", &log).with_can_deactivate(false)),
            Rc::new(Probe::new("i3", &log)),
        ];
        let list = ItemList::from_items(items.clone());
        let activator: Activator<Probe> = Activator::new().for_items(list.clone());

        assert!(!block_on(activator.can_deactivate(true)));
        assert_eq!(list.len(), 3);
        let asked: Vec<_> = entries(&log)
            .into_iter()
            .filter(|e| e.ends_with("can_deactivate"))
            .collect();
        assert_eq!(asked.len(), 3);

        items[1].set_can_deactivate(Response::from("yes"));
        assert!(block_on(activator.can_deactivate(true)));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn deactivate_all_closes_every_item() {
        let log = Log::default();
        let items = list_of(&["a", "b", "c"], &log);
        let list = ItemList::from_items(items.clone());
        let activator: Activator<Probe> = Activator::new().for_items(list.clone());
        assert!(block_on(activator.activate_item(
            Some(items[1].clone()),
            ActivationData::None,
            ActivationOptions::default()
        )));

        assert!(block_on(activator.deactivate(true)));
        assert!(list.is_empty());
        assert!(activator.active_item().is_none());
        let closed: Vec<_> = entries(&log)
            .into_iter()
            .filter(|e| e.ends_with(".deactivate(close)"))
            .collect();
        assert_eq!(
            closed,
            vec!["a.deactivate(close)", "b.deactivate(close)", "c.deactivate(close)"]
        );
    }

    #[test]
    fn refusing_item_stays_in_list() {
        let log = Log::default();
        let items = vec![
            Rc::new(Probe::new("a", &log)),
            Rc::new(Probe::new("b", &log).with_can_deactivate(false)),
        ];
        let list = ItemList::from_items(items.clone());
        let activator: Activator<Probe> = Activator::new().for_items(list.clone());

        assert!(!block_on(activator.deactivate(true)));
        assert_eq!(list.snapshot().len(), 1);
        assert!(list.contains(&items[1]));
    }

    #[test]
    fn activating_unknown_item_appends_it() {
        let log = Log::default();
        let list: ItemList<Probe> = ItemList::new();
        let activator = Activator::new().for_items(list.clone());
        let a = Rc::new(Probe::new("a", &log));

        assert!(block_on(activator.activate_item(
            Some(a.clone()),
            ActivationData::None,
            ActivationOptions::default()
        )));
        assert_eq!(list.len(), 1);
        assert!(list.contains(&a));
        // Switching away does not close the outgoing item.
        let b = Rc::new(Probe::new("b", &log));
        assert!(block_on(activator.activate_item(
            Some(b),
            ActivationData::None,
            ActivationOptions::default()
        )));
        assert_eq!(list.len(), 2);
        assert!(entries(&log).contains(&"a.deactivate(keep)".to_string()));
    }

    #[test]
    fn closing_current_then_activating_none_picks_neighbor() {
        let log = Log::default();
        let items = list_of(&["a", "b", "c"], &log);
        let list = ItemList::from_items(items.clone());
        let activator: Activator<Probe> = Activator::new().for_items(list.clone());
        assert!(block_on(activator.activate_item(
            Some(items[1].clone()),
            ActivationData::None,
            ActivationOptions::default()
        )));

        assert!(block_on(activator.deactivate_item(Some(&items[1]), true)));
        assert_eq!(list.len(), 2);

        assert!(block_on(activator.activate_item(
            None,
            ActivationData::None,
            ActivationOptions::default()
        )));
        let active = activator.active_item().unwrap();
        assert!(Rc::ptr_eq(&active, &items[2]));
    }

    #[test]
    fn activating_none_from_first_item_picks_second() {
        let log = Log::default();
        let items = list_of(&["a", "b"], &log);
        let list = ItemList::from_items(items.clone());
        let activator: Activator<Probe> = Activator::new().for_items(list);
        assert!(block_on(activator.activate_item(
            Some(items[0].clone()),
            ActivationData::None,
            ActivationOptions::default()
        )));

        assert!(block_on(activator.activate_item(
            None,
            ActivationData::None,
            ActivationOptions::default()
        )));
        assert!(Rc::ptr_eq(&activator.active_item().unwrap(), &items[1]));
    }
}
