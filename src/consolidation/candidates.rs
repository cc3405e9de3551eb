//! Candidate scoring shared by auto-stitching and noise absorption.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::consolidation::identity::TrackId;
use crate::consolidation::rect::{Rect, center_distance_batch};
use crate::consolidation::state::IdentityState;

/// Endpoints of one live track, as seen by the scorer.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub id: TrackId,
    pub start: u64,
    pub end: u64,
    pub first_box: Rect,
    pub last_box: Rect,
    /// Whether the track carries a non-default role.
    pub labelled: bool,
}

/// A proposed join: `successor` continues where `predecessor` ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub predecessor: TrackId,
    pub successor: TrackId,
    pub gap_secs: f64,
    pub distance: f32,
}

/// Acceptance limits for a candidate. Both comparisons are strict.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub time_gap_secs: f64,
    pub distance: f32,
    /// Only consider this many fragments after the predecessor, in start order.
    pub lookahead: Option<usize>,
}

/// Live tracks sorted by start frame, then identity.
pub fn fragments(state: &IdentityState) -> Vec<Fragment> {
    let mut fragments: Vec<Fragment> = state
        .store()
        .iter()
        .filter_map(|(&id, track)| {
            Some(Fragment {
                id,
                start: track.start_frame()?,
                end: track.end_frame()?,
                first_box: track.first_box()?,
                last_box: track.last_box()?,
                labelled: !track.role().is_default(),
            })
        })
        .collect();
    fragments.sort_by_key(|f| (f.start, f.id));
    fragments
}

/// Score every (predecessor, successor) pair with `successor.start >
/// predecessor.end` that passes `accept` and both thresholds.
///
/// The result is ordered by ascending gap, then distance, then identities,
/// so the most confident joins come first.
pub fn score_pairs<F>(
    fragments: &[Fragment],
    fps: f64,
    thresholds: Thresholds,
    accept: F,
) -> Vec<Candidate>
where
    F: Fn(&Fragment, &Fragment) -> bool,
{
    let mut candidates = Vec::new();
    for (i, pred) in fragments.iter().enumerate() {
        let first = fragments.partition_point(|f| f.start <= pred.end);
        let mut last = fragments.len();
        if let Some(lookahead) = thresholds.lookahead {
            last = last.min(i + 1 + lookahead);
        }
        if first >= last {
            continue;
        }

        // starts are sorted, so the window ends at the first gap too wide
        let window: Vec<&Fragment> = fragments[first..last]
            .iter()
            .take_while(|succ| gap_secs(pred, succ, fps) < thresholds.time_gap_secs)
            .collect();
        if window.is_empty() {
            continue;
        }

        let firsts: Vec<Rect> = window.iter().map(|f| f.first_box).collect();
        let dists = center_distance_batch(&[pred.last_box], &firsts);
        for (j, succ) in window.into_iter().enumerate() {
            let distance = dists[[0, j]];
            if distance < thresholds.distance && accept(pred, succ) {
                candidates.push(Candidate {
                    predecessor: pred.id,
                    successor: succ.id,
                    gap_secs: gap_secs(pred, succ, fps),
                    distance,
                });
            }
        }
    }
    candidates.sort_by(compare);
    candidates
}

fn gap_secs(pred: &Fragment, succ: &Fragment, fps: f64) -> f64 {
    (succ.start - pred.end) as f64 / fps
}

fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    a.gap_secs
        .total_cmp(&b.gap_secs)
        .then(a.distance.total_cmp(&b.distance))
        .then(a.predecessor.cmp(&b.predecessor))
        .then(a.successor.cmp(&b.successor))
}

/// Which fragment ends are already spoken for in one greedy pass.
#[derive(Debug, Default)]
pub struct EndpointClaims {
    tails: HashSet<TrackId>,
    heads: HashSet<TrackId>,
}

impl EndpointClaims {
    /// Claim the predecessor's tail and the successor's head. Fails if either
    /// was already claimed, which would fork a chain.
    pub fn claim(&mut self, candidate: &Candidate) -> bool {
        if self.tails.contains(&candidate.predecessor) || self.heads.contains(&candidate.successor) {
            return false;
        }
        self.tails.insert(candidate.predecessor);
        self.heads.insert(candidate.successor);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(id: TrackId, start: u64, end: u64, x0: f32, x1: f32) -> Fragment {
        Fragment {
            id,
            start,
            end,
            first_box: Rect::new(x0, 0.0, 10.0, 10.0),
            last_box: Rect::new(x1, 0.0, 10.0, 10.0),
            labelled: false,
        }
    }

    const LOOSE: Thresholds = Thresholds {
        time_gap_secs: 2.0,
        distance: 150.0,
        lookahead: None,
    };

    #[test]
    fn test_ordering_by_gap_then_distance() {
        let fragments = vec![
            fragment(1, 0, 10, 0.0, 0.0),
            fragment(2, 15, 20, 5.0, 5.0),
            fragment(3, 12, 30, 100.0, 100.0),
            fragment(4, 12, 30, 50.0, 50.0),
        ];
        let mut sorted = fragments.clone();
        sorted.sort_by_key(|f| (f.start, f.id));
        let candidates = score_pairs(&sorted, 10.0, LOOSE, |_, _| true);
        let pairs: Vec<_> = candidates
            .iter()
            .map(|c| (c.predecessor, c.successor))
            .collect();
        assert_eq!(pairs, vec![(1, 4), (1, 3), (1, 2)]);
        assert!((candidates[0].gap_secs - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let fragments = vec![fragment(1, 0, 10, 0.0, 0.0), fragment(2, 30, 40, 150.0, 0.0)];
        // gap is exactly 2.0 s and distance exactly 150 px
        assert!(score_pairs(&fragments, 10.0, LOOSE, |_, _| true).is_empty());
    }

    #[test]
    fn test_overlapping_tracks_are_not_candidates() {
        let fragments = vec![fragment(1, 0, 10, 0.0, 0.0), fragment(2, 10, 20, 0.0, 0.0)];
        assert!(score_pairs(&fragments, 10.0, LOOSE, |_, _| true).is_empty());
    }

    #[test]
    fn test_lookahead_window() {
        let fragments = vec![
            fragment(1, 0, 5, 0.0, 0.0),
            fragment(2, 1, 3, 500.0, 500.0),
            fragment(3, 6, 9, 0.0, 0.0),
        ];
        let narrow = Thresholds {
            lookahead: Some(1),
            ..LOOSE
        };
        let candidates = score_pairs(&fragments, 10.0, narrow, |_, _| true);
        assert!(candidates.iter().all(|c| c.predecessor != 1));
        let wide = score_pairs(&fragments, 10.0, LOOSE, |_, _| true);
        assert!(wide.iter().any(|c| c.predecessor == 1 && c.successor == 3));
    }

    #[test]
    fn test_claims_prevent_forks() {
        let mut claims = EndpointClaims::default();
        let c = |p, s| Candidate {
            predecessor: p,
            successor: s,
            gap_secs: 0.0,
            distance: 0.0,
        };
        assert!(claims.claim(&c(1, 2)));
        assert!(!claims.claim(&c(1, 3)));
        assert!(!claims.claim(&c(4, 2)));
        assert!(claims.claim(&c(2, 3)));
    }
}
