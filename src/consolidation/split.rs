//! Partitioning one track in two at a frame boundary.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consolidation::identity::TrackId;
use crate::consolidation::state::IdentityState;
use crate::error::{ConsolidationError, Result};

/// Where a split track's merge provenance (`absorbed`) ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitProvenance {
    /// The original identity keeps the whole set; the new identity starts
    /// with none.
    #[default]
    StayWithOriginal,
    /// The set travels with the tail piece, whichever identity holds it.
    FollowTail,
}

/// A validated split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPlan {
    pub master: TrackId,
    /// Index of the first frame of the tail.
    pub cut: usize,
    pub keep_head: bool,
    pub new_id: TrackId,
}

impl IdentityState {
    /// Locate the cut for `split_frame` on the track `id` belongs to.
    ///
    /// Frames strictly before `split_frame` form the head. Both pieces must
    /// be non-empty.
    pub fn plan_split(&self, id: TrackId, split_frame: u64, keep_head: bool) -> Result<SplitPlan> {
        let (master, track) = self.track(id)?;
        let cut = track.frames().partition_point(|&frame| frame < split_frame);
        if cut == 0 || cut == track.len() {
            return Err(ConsolidationError::SplitOutOfRange {
                track: master,
                frame: split_frame,
            });
        }
        Ok(SplitPlan {
            master,
            cut,
            keep_head,
            new_id: self.store.peek_next_id()?,
        })
    }

    /// Apply a split plan and return the new identity.
    pub fn apply_split(&mut self, plan: SplitPlan, provenance: SplitProvenance) -> Result<TrackId> {
        if !self.store.contains(plan.master) {
            return Err(ConsolidationError::UnknownIdentity(plan.master));
        }
        let new_id = self.store.allocate_id()?;
        let Some(track) = self.store.get_mut(plan.master) else {
            return Err(ConsolidationError::UnknownIdentity(plan.master));
        };
        let mut tail = track.split_off(plan.cut);
        if provenance == SplitProvenance::FollowTail && plan.keep_head {
            tail.absorbed = std::mem::take(&mut track.absorbed);
        }
        if !plan.keep_head {
            // the original identity keeps the tail, so swap frames and boxes
            std::mem::swap(&mut track.frames, &mut tail.frames);
            std::mem::swap(&mut track.boxes, &mut tail.boxes);
        }
        self.store.insert(new_id, tail);
        self.lineage.register(new_id);
        debug!(
            original = plan.master,
            new_id,
            keep_head = plan.keep_head,
            "split track"
        );
        Ok(new_id)
    }

    /// Split the track `id` belongs to at `split_frame`.
    ///
    /// With `keep_head` the original identity keeps the frames before the
    /// cut; otherwise it keeps the rest and the new identity takes the head,
    /// which is the usual fix for an ID switch mid-track.
    pub fn split(
        &mut self,
        id: TrackId,
        split_frame: u64,
        keep_head: bool,
        provenance: SplitProvenance,
    ) -> Result<TrackId> {
        let plan = self.plan_split(id, split_frame, keep_head)?;
        self.apply_split(plan, provenance)
    }
}
