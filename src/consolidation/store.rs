//! Track-oriented aggregation of per-frame detections.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use crate::consolidation::identity::{SYNTHETIC_BASE, TrackId, is_synthetic};
use crate::consolidation::rect::Rect;
use crate::consolidation::role::Role;
use crate::consolidation::track::Track;
use crate::error::{ConsolidationError, RecordError, Result};

/// Owns every live track, keyed by identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackStore {
    tracks: BTreeMap<TrackId, Track>,
    /// Highest native or split identity ever allocated. Never decreases,
    /// so deleted identities are not handed out again.
    highest_allocated: Option<TrackId>,
}

/// One row of the track listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub id: TrackId,
    pub detections: usize,
    pub duration_secs: f64,
    pub role: Role,
    pub absorbed: Vec<TrackId>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one detection of `id` at `frame`, creating the track on first
    /// sight. Amortised O(1) for in-order frames.
    pub fn append(&mut self, id: TrackId, frame: u64, rect: Rect) -> std::result::Result<(), RecordError> {
        let track = self.tracks.entry(id).or_default();
        if !track.push(frame, rect) {
            return Err(RecordError::DuplicateFrame { id, frame });
        }
        if !is_synthetic(id) {
            self.note_allocated(id);
        }
        Ok(())
    }

    fn note_allocated(&mut self, id: TrackId) {
        self.highest_allocated = Some(self.highest_allocated.map_or(id, |h| h.max(id)));
    }

    /// The identity the next split will receive.
    pub fn peek_next_id(&self) -> Result<TrackId> {
        let next = self.highest_allocated.map_or(0, |h| h + 1);
        if next >= SYNTHETIC_BASE {
            return Err(ConsolidationError::IdentityExhausted);
        }
        Ok(next)
    }

    pub(crate) fn allocate_id(&mut self) -> Result<TrackId> {
        let id = self.peek_next_id()?;
        self.note_allocated(id);
        Ok(id)
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.tracks.contains_key(&id)
    }

    pub(crate) fn insert(&mut self, id: TrackId, track: Track) {
        self.tracks.insert(id, track);
    }

    pub(crate) fn remove(&mut self, id: TrackId) -> Option<Track> {
        self.tracks.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Live tracks in ascending identity order.
    pub fn iter(&self) -> btree_map::Iter<'_, TrackId, Track> {
        self.tracks.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks.keys().copied()
    }

    /// Per-track listing. With `hide_short`, unlabelled tracks shorter than
    /// `min_secs` are left out.
    pub fn summaries(&self, fps: f64, hide_short: bool, min_secs: f64) -> Vec<TrackSummary> {
        self.tracks
            .iter()
            .filter_map(|(&id, track)| {
                let duration_secs = track.duration_secs(fps);
                if hide_short && duration_secs < min_secs && track.role().is_default() {
                    return None;
                }
                Some(TrackSummary {
                    id,
                    detections: track.len(),
                    duration_secs,
                    role: track.role().clone(),
                    absorbed: track.absorbed().iter().copied().collect(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::identity::synthetic_id;

    #[test]
    fn test_append_groups_by_identity() {
        let mut store = TrackStore::new();
        for f in [10, 11, 12] {
            store.append(5, f, Rect::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        }
        store.append(7, 20, Rect::default()).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(5).unwrap().frames(), &[10, 11, 12]);
        assert_eq!(
            store.append(5, 11, Rect::default()),
            Err(RecordError::DuplicateFrame { id: 5, frame: 11 })
        );
    }

    #[test]
    fn test_allocation_skips_synthetic_and_never_reuses() {
        let mut store = TrackStore::new();
        assert_eq!(store.peek_next_id().unwrap(), 0);

        store.append(7, 1, Rect::default()).unwrap();
        store.append(synthetic_id(1, 0).unwrap(), 1, Rect::default()).unwrap();
        assert_eq!(store.peek_next_id().unwrap(), 8);

        assert_eq!(store.allocate_id().unwrap(), 8);
        store.remove(7);
        assert_eq!(store.peek_next_id().unwrap(), 9);
    }

    #[test]
    fn test_allocation_exhausted() {
        let mut store = TrackStore::new();
        store.append(SYNTHETIC_BASE - 1, 0, Rect::default()).unwrap();
        assert!(matches!(
            store.peek_next_id(),
            Err(ConsolidationError::IdentityExhausted)
        ));
    }

    #[test]
    fn test_summaries_hide_short() {
        let mut store = TrackStore::new();
        for f in 0..30 {
            store.append(1, f, Rect::default()).unwrap();
        }
        store.append(2, 0, Rect::default()).unwrap();

        let all = store.summaries(30.0, false, 1.0);
        assert_eq!(all.len(), 2);
        assert!((all[0].duration_secs - 1.0).abs() < 1e-9);

        let listed = store.summaries(30.0, true, 1.0);
        assert_eq!(listed.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1]);
    }
}
