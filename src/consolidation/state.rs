//! The editable identity state: live tracks plus their lineage.

use serde::{Deserialize, Serialize};

use crate::consolidation::identity::TrackId;
use crate::consolidation::lineage::LineageResolver;
use crate::consolidation::rect::Rect;
use crate::consolidation::role::{Cast, Role};
use crate::consolidation::store::TrackStore;
use crate::consolidation::track::Track;
use crate::error::{ConsolidationError, RecordError, Result};

/// Self-contained (TrackStore, LineageResolver) pair.
///
/// This is the unit the history manager snapshots, spills and restores, so
/// equality here means bit-for-bit equality of the editable state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityState {
    pub(crate) store: TrackStore,
    pub(crate) lineage: LineageResolver,
}

/// A validated role assignment, ready to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct RolePlan {
    pub master: TrackId,
    pub role: Role,
}

impl IdentityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    pub fn lineage(&self) -> &LineageResolver {
        &self.lineage
    }

    /// Ingest one detection.
    pub fn append(&mut self, id: TrackId, frame: u64, rect: Rect) -> std::result::Result<(), RecordError> {
        self.store.append(id, frame, rect)?;
        self.lineage.register(id);
        Ok(())
    }

    pub fn resolve(&self, id: TrackId) -> Result<TrackId> {
        self.lineage.resolve(id)
    }

    /// Resolve `id` and return its master together with the live track.
    pub fn track(&self, id: TrackId) -> Result<(TrackId, &Track)> {
        let master = self.lineage.resolve(id)?;
        let track = self
            .store
            .get(master)
            .ok_or(ConsolidationError::UnknownIdentity(id))?;
        Ok((master, track))
    }

    pub fn plan_set_role(&self, id: TrackId, role: &str, cast: &Cast) -> Result<RolePlan> {
        let (master, _) = self.track(id)?;
        let role = cast.role(role)?;
        Ok(RolePlan { master, role })
    }

    pub fn apply_set_role(&mut self, plan: RolePlan) {
        if let Some(track) = self.store.get_mut(plan.master) {
            track.role = plan.role;
        }
    }

    /// Label the track `id` belongs to.
    pub fn set_role(&mut self, id: TrackId, role: &str, cast: &Cast) -> Result<TrackId> {
        let plan = self.plan_set_role(id, role, cast)?;
        let master = plan.master;
        self.apply_set_role(plan);
        Ok(master)
    }
}
