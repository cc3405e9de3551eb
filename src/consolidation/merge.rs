//! Combining tracks under one identity.

use tracing::debug;

use crate::consolidation::identity::TrackId;
use crate::consolidation::role::Cast;
use crate::consolidation::state::IdentityState;
use crate::error::{ConsolidationError, Result};

/// A validated merge of two distinct live tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePlan {
    pub master: TrackId,
    pub slave: TrackId,
}

impl IdentityState {
    /// Check that `master` and `slave` resolve to distinct live tracks.
    pub fn plan_merge(&self, master: TrackId, slave: TrackId) -> Result<MergePlan> {
        let (master, _) = self.track(master)?;
        let (slave, _) = self.track(slave)?;
        if master == slave {
            return Err(ConsolidationError::SelfMerge(master));
        }
        Ok(MergePlan { master, slave })
    }

    pub fn apply_merge(&mut self, plan: MergePlan) {
        let Some(slave_track) = self.store.remove(plan.slave) else {
            return;
        };
        let Some(master_track) = self.store.get_mut(plan.master) else {
            // plans are only built against live tracks
            self.store.insert(plan.slave, slave_track);
            return;
        };
        master_track.absorb(plan.slave, slave_track);
        self.lineage.reassign(plan.slave, plan.master);
        debug!(master = plan.master, slave = plan.slave, "merged tracks");
    }

    /// Fold `slave` into `master`. Returns the resolved master identity.
    pub fn merge(&mut self, master: TrackId, slave: TrackId) -> Result<TrackId> {
        let plan = self.plan_merge(master, slave)?;
        self.apply_merge(plan);
        Ok(plan.master)
    }

    /// Merge plans folding a selection into its lowest resolved identity.
    ///
    /// Identities that already share a master are collapsed first, so the
    /// plans never contain a self-merge. At least two distinct tracks are
    /// required.
    pub fn plan_merge_many(&self, ids: &[TrackId]) -> Result<Vec<MergePlan>> {
        let mut masters = Vec::with_capacity(ids.len());
        for &id in ids {
            let (master, _) = self.track(id)?;
            masters.push(master);
        }
        masters.sort_unstable();
        masters.dedup();

        let Some((&master, slaves)) = masters.split_first() else {
            return Ok(Vec::new());
        };
        if slaves.is_empty() {
            return Err(ConsolidationError::SelfMerge(master));
        }
        Ok(slaves
            .iter()
            .map(|&slave| MergePlan { master, slave })
            .collect())
    }

    /// For every cast role, plans folding all tracks carrying it into the
    /// lowest such identity.
    pub fn plan_merge_by_role(&self, cast: &Cast) -> Vec<MergePlan> {
        let mut plans = Vec::new();
        for role in cast.roles() {
            let mut ids = self
                .store
                .iter()
                .filter(|(_, track)| track.role() == role)
                .map(|(&id, _)| id);
            if let Some(master) = ids.next() {
                plans.extend(ids.map(|slave| MergePlan { master, slave }));
            }
        }
        plans
    }

    pub fn apply_merges(&mut self, plans: &[MergePlan]) {
        for &plan in plans {
            self.apply_merge(plan);
        }
    }
}
