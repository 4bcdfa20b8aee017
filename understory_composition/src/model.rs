// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! View models: participants that can be composed into a view.

use std::rc::Rc;

use understory_activator::activator::Activator;
use understory_activator::participant::Participant;
use understory_activator::types::LifecycleError;

use crate::view::ViewId;

/// A lifecycle participant that composition can bind to a view.
///
/// The activation hooks come from [`Participant`]; composition only calls
/// [`Participant::activate`], and only when the request asks for activation.
/// The hooks below are synchronous and run with the view tree unborrowed, so they may
/// start nested compositions.
pub trait ViewModel: Participant {
    /// Name of the view to compose for this model when the request does not name one.
    fn view(&self) -> Option<String> {
        None
    }

    /// The model's view was attached to `parent`.
    ///
    /// Runs for newly composed views, and for reused cached views when the request sets
    /// [`ALWAYS_TRIGGER_ATTACH`](crate::request::CompositionFlags::ALWAYS_TRIGGER_ATTACH).
    fn attached(&self, _view: ViewId, _parent: ViewId) -> Result<(), LifecycleError> {
        Ok(())
    }

    /// The model's view was removed from the tree.
    fn detached(&self, _view: ViewId, _parent: ViewId) -> Result<(), LifecycleError> {
        Ok(())
    }

    /// The model to compose in place of this one.
    ///
    /// Only consulted when [`Participant::is_activator`] is true: composing an activator
    /// composes its current item instead, without activating it again.
    fn active_view_model(&self) -> Option<Rc<dyn ViewModel>> {
        None
    }

    /// Every composition in the transaction that composed this model's view has finished.
    fn composition_complete(
        &self,
        _view: Option<ViewId>,
        _parent: ViewId,
    ) -> Result<(), LifecycleError> {
        Ok(())
    }
}

impl ViewModel for Activator<dyn ViewModel> {
    fn active_view_model(&self) -> Option<Rc<dyn ViewModel>> {
        self.active_item()
    }
}
