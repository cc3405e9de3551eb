//! Single consolidated track.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::consolidation::identity::TrackId;
use crate::consolidation::rect::Rect;
use crate::consolidation::role::Role;

/// Detections believed to belong to one physical subject.
///
/// `frames` is sorted ascending and parallel to `boxes`. Frames are unique
/// except where a merge brought two detections of the same frame together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub(crate) frames: Vec<u64>,
    pub(crate) boxes: Vec<Rect>,
    pub(crate) role: Role,
    /// Identities merged into this track.
    pub(crate) absorbed: BTreeSet<TrackId>,
}

impl Track {
    pub fn frames(&self) -> &[u64] {
        &self.frames
    }

    pub fn boxes(&self) -> &[Rect] {
        &self.boxes
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn absorbed(&self) -> &BTreeSet<TrackId> {
        &self.absorbed
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn start_frame(&self) -> Option<u64> {
        self.frames.first().copied()
    }

    pub fn end_frame(&self) -> Option<u64> {
        self.frames.last().copied()
    }

    pub fn first_box(&self) -> Option<Rect> {
        self.boxes.first().copied()
    }

    pub fn last_box(&self) -> Option<Rect> {
        self.boxes.last().copied()
    }

    pub fn duration_secs(&self, fps: f64) -> f64 {
        self.frames.len() as f64 / fps
    }

    /// Append one detection. Returns `false` if `frame` is already present.
    ///
    /// In-order frames are pushed; a late frame is inserted at its sorted
    /// position.
    pub(crate) fn push(&mut self, frame: u64, rect: Rect) -> bool {
        match self.frames.last() {
            Some(&last) if frame <= last => match self.frames.binary_search(&frame) {
                Ok(_) => false,
                Err(pos) => {
                    self.frames.insert(pos, frame);
                    self.boxes.insert(pos, rect);
                    true
                }
            },
            _ => {
                self.frames.push(frame);
                self.boxes.push(rect);
                true
            }
        }
    }

    /// Take over every detection of `other`, which was known as `other_id`.
    ///
    /// Same-frame detections are all kept; the stable sort leaves this
    /// track's entry ahead of the absorbed one.
    pub(crate) fn absorb(&mut self, other_id: TrackId, other: Track) {
        let mut combined: Vec<(u64, Rect)> = self
            .frames
            .drain(..)
            .zip(self.boxes.drain(..))
            .chain(other.frames.into_iter().zip(other.boxes))
            .collect();
        combined.sort_by_key(|(frame, _)| *frame);
        (self.frames, self.boxes) = combined.into_iter().unzip();

        self.absorbed.insert(other_id);
        self.absorbed.extend(other.absorbed);
        if self.role.is_default() {
            self.role = other.role;
        }
    }

    /// Cut the track before index `at`, keeping the head in `self` and
    /// returning the tail. The tail starts with the default role and no
    /// merge provenance.
    pub(crate) fn split_off(&mut self, at: usize) -> Track {
        Track {
            frames: self.frames.split_off(at),
            boxes: self.boxes.split_off(at),
            role: Role::default(),
            absorbed: BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(frames: &[u64]) -> Track {
        let mut t = Track::default();
        for &f in frames {
            assert!(t.push(f, Rect::new(f as f32, 0.0, 1.0, 1.0)));
        }
        t
    }

    #[test]
    fn test_push_keeps_order() {
        let mut t = track(&[1, 3]);
        assert!(t.push(2, Rect::new(2.0, 0.0, 1.0, 1.0)));
        assert!(!t.push(3, Rect::default()));
        assert_eq!(t.frames(), &[1, 2, 3]);
        assert_eq!(t.boxes()[1].x, 2.0);
    }

    #[test]
    fn test_absorb_keeps_duplicates_and_role() {
        let mut a = track(&[1, 2, 5]);
        let mut b = track(&[2, 3]);
        b.role = Role::new("Target");
        b.absorbed.insert(40);
        b.boxes[0].y = 9.0;

        a.absorb(7, b);

        assert_eq!(a.frames(), &[1, 2, 2, 3, 5]);
        assert_eq!(a.boxes()[1].y, 0.0);
        assert_eq!(a.boxes()[2].y, 9.0);
        assert_eq!(a.role(), &Role::new("Target"));
        assert_eq!(a.absorbed().iter().copied().collect::<Vec<_>>(), vec![7, 40]);
    }

    #[test]
    fn test_absorb_does_not_overwrite_role() {
        let mut a = track(&[1]);
        a.role = Role::new("Target");
        let mut b = track(&[2]);
        b.role = Role::new("Confederate_1");
        a.absorb(2, b);
        assert_eq!(a.role(), &Role::new("Target"));
    }

    #[test]
    fn test_split_off() {
        let mut a = track(&[10, 11, 12]);
        a.role = Role::new("Target");
        let tail = a.split_off(1);
        assert_eq!(a.frames(), &[10]);
        assert_eq!(tail.frames(), &[11, 12]);
        assert!(tail.role().is_default());
        assert_eq!(a.boxes().len(), 1);
        assert_eq!(tail.boxes().len(), 2);
    }
}
