//! Accept/reject bookkeeping on top of the diff engine.
//!
//! The engine never marks hunks accepted or rejected itself; this layer owns
//! that state and drives the engine's merge, revert and delete primitives.

use crate::zone::{DiffStateSource, EditEvent};
use hunkwise_core::{
    DiffAreaId, DiffAreaStore, DiffId, DiffService, DiffState, LineDiffOracle, TextBuffers, Uri,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared per-hunk resolution state. Clones see the same map, so one copy
/// can sit in the zone synchronizer while the session updates another.
#[derive(Debug, Clone, Default)]
pub struct DiffStates {
    inner: Rc<RefCell<HashMap<DiffId, DiffState>>>,
}

impl DiffStates {
    pub fn get(&self, diff_id: DiffId) -> Option<DiffState> {
        self.inner.borrow().get(&diff_id).copied()
    }

    pub fn set(&self, diff_id: DiffId, state: DiffState) {
        self.inner.borrow_mut().insert(diff_id, state);
    }

    pub fn resolved(&self, state: DiffState) -> usize {
        self.inner.borrow().values().filter(|s| **s == state).count()
    }
}

impl DiffStateSource for DiffStates {
    fn diff_state(&self, diff_id: DiffId) -> Option<DiffState> {
        self.get(diff_id)
    }
}

#[derive(Debug, Default)]
pub struct ReviewSession {
    states: DiffStates,
}

impl ReviewSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> DiffStates {
        self.states.clone()
    }

    /// Keep one hunk: fold it into the baseline and stop tracking it
    pub fn accept_diff<B: TextBuffers, O: LineDiffOracle>(
        &mut self,
        service: &mut DiffService<B, O>,
        diff_area_id: DiffAreaId,
        diff_id: DiffId,
    ) -> bool {
        let Some(diff) = self.unresolved(service, diff_area_id, diff_id) else {
            return false;
        };
        if !service.merge_accepted_diff_into_baseline(diff_area_id, &diff)
            || service.delete_diff(diff_area_id, diff_id).is_none()
        {
            return false;
        }
        self.states.set(diff_id, DiffState::Accepted);
        true
    }

    /// Drop one hunk: put its original text back into the buffer
    pub fn reject_diff<B: TextBuffers, O: LineDiffOracle>(
        &mut self,
        service: &mut DiffService<B, O>,
        diff_area_id: DiffAreaId,
        diff_id: DiffId,
    ) -> bool {
        if self.unresolved(service, diff_area_id, diff_id).is_none() {
            return false;
        }
        if !service.revert_diff(diff_area_id, diff_id) {
            return false;
        }
        self.states.set(diff_id, DiffState::Rejected);
        true
    }

    /// Keep everything proposed for a file
    pub fn accept_file<B: TextBuffers, O: LineDiffOracle>(
        &mut self,
        service: &mut DiffService<B, O>,
        uri: &Uri,
    ) -> EditEvent {
        for area in service.diff_areas_for_uri(uri) {
            for diff_id in area.diffs.keys() {
                self.states.set(*diff_id, DiffState::Accepted);
            }
        }
        service.delete_diff_areas_for_uri(uri);
        EditEvent::AcceptFile(uri.clone())
    }

    /// Revert everything proposed for a file
    pub fn reject_file<B: TextBuffers, O: LineDiffOracle>(
        &mut self,
        service: &mut DiffService<B, O>,
        uri: &Uri,
    ) -> EditEvent {
        let targets: Vec<(DiffAreaId, DiffId)> = service
            .diff_areas_for_uri(uri)
            .into_iter()
            .flat_map(|area| {
                // Bottom-up, so reverting one hunk never moves the next
                area.sorted_diffs()
                    .into_iter()
                    .rev()
                    .map(|d| (area.diff_area_id, d.diff_id))
                    .collect::<Vec<_>>()
            })
            .collect();

        for (diff_area_id, diff_id) in targets {
            if service.revert_diff(diff_area_id, diff_id) {
                self.states.set(diff_id, DiffState::Rejected);
            } else {
                log::warn!("could not revert {diff_id} in {uri}");
            }
        }
        service.delete_diff_areas_for_uri(uri);
        EditEvent::RejectFile(uri.clone())
    }

    pub fn accept_all<B: TextBuffers, O: LineDiffOracle>(
        &mut self,
        service: &mut DiffService<B, O>,
    ) -> EditEvent {
        for uri in service.uris() {
            self.accept_file(service, &uri);
        }
        EditEvent::AcceptAll
    }

    pub fn reject_all<B: TextBuffers, O: LineDiffOracle>(
        &mut self,
        service: &mut DiffService<B, O>,
    ) -> EditEvent {
        for uri in service.uris() {
            self.reject_file(service, &uri);
        }
        EditEvent::RejectAll
    }

    /// The hunk, if it exists and has not been resolved yet
    fn unresolved<B: TextBuffers, O: LineDiffOracle>(
        &self,
        service: &DiffService<B, O>,
        diff_area_id: DiffAreaId,
        diff_id: DiffId,
    ) -> Option<hunkwise_core::Diff> {
        if self.states.get(diff_id).is_some_and(|s| !s.is_active()) {
            log::warn!("{diff_id} was already resolved");
            return None;
        }
        let diff = service
            .diff_area_by_id(diff_area_id)
            .and_then(|area| area.diffs.get(&diff_id))
            .cloned();
        if diff.is_none() {
            log::warn!("{diff_id} is not tracked in {diff_area_id}");
        }
        diff
    }
}
