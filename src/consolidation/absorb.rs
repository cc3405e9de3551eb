//! Folding unlabelled fragments into role-bearing tracks.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consolidation::candidates::{self, Candidate, EndpointClaims, Thresholds};
use crate::consolidation::merge::MergePlan;
use crate::consolidation::state::IdentityState;
use crate::consolidation::stitch::{StitchReport, StitchedPair};

/// Configuration for noise absorption.
///
/// The distance limit must stay tighter than auto-stitching's: a false
/// positive here corrupts an already labelled track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbsorbConfig {
    pub time_gap_threshold: f64,
    pub distance_threshold: f32,
}

impl Default for AbsorbConfig {
    fn default() -> Self {
        Self {
            time_gap_threshold: 2.0,
            distance_threshold: 100.0,
        }
    }
}

impl IdentityState {
    /// Candidates pairing an unlabelled fragment with an adjacent labelled
    /// one, on either side. Does not mutate.
    pub fn plan_absorb_noise(&self, config: &AbsorbConfig, fps: f64) -> Vec<Candidate> {
        let thresholds = Thresholds {
            time_gap_secs: config.time_gap_threshold,
            distance: config.distance_threshold,
            lookahead: None,
        };
        let fragments = candidates::fragments(self);
        candidates::score_pairs(&fragments, fps, thresholds, |pred, succ| {
            pred.labelled != succ.labelled
        })
    }

    /// The merge a candidate implies right now: the labelled side absorbs
    /// the unlabelled one. `None` if that no longer holds.
    fn absorption(&self, candidate: &Candidate) -> Option<MergePlan> {
        let (pred, pred_track) = self.track(candidate.predecessor).ok()?;
        let (succ, succ_track) = self.track(candidate.successor).ok()?;
        match (pred_track.role().is_default(), succ_track.role().is_default()) {
            (false, true) => Some(MergePlan {
                master: pred,
                slave: succ,
            }),
            (true, false) => Some(MergePlan {
                master: succ,
                slave: pred,
            }),
            _ => None,
        }
    }

    /// Absorb in rounds, starting from `first_round`, until no candidate is
    /// left. Each round is greedy like auto-stitching; rescoring between
    /// rounds lets a labelled track keep growing across consecutive
    /// fragments.
    pub fn apply_absorb_noise(
        &mut self,
        first_round: Vec<Candidate>,
        config: &AbsorbConfig,
        fps: f64,
    ) -> StitchReport {
        let mut report = StitchReport::default();
        let mut round = first_round;
        while !round.is_empty() {
            let mut claims = EndpointClaims::default();
            let before = report.len();
            for candidate in &round {
                let Some(plan) = self.absorption(candidate) else {
                    continue;
                };
                if !claims.claim(candidate) {
                    continue;
                }
                self.apply_merge(plan);
                report.merges.push(StitchedPair {
                    master: plan.master,
                    absorbed: plan.slave,
                    gap_secs: candidate.gap_secs,
                    distance: candidate.distance,
                });
            }
            debug!(absorbed = report.len() - before, "noise absorption round");
            if report.len() == before {
                break;
            }
            round = self.plan_absorb_noise(config, fps);
        }
        info!(absorbed = report.len(), "noise absorption batch applied");
        report
    }

    pub fn absorb_noise(&mut self, config: &AbsorbConfig, fps: f64) -> StitchReport {
        let first_round = self.plan_absorb_noise(config, fps);
        self.apply_absorb_noise(first_round, config, fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::identity::{TrackId, synthetic_id};
    use crate::consolidation::rect::Rect;
    use crate::consolidation::role::{Cast, Role};

    fn add(state: &mut IdentityState, id: TrackId, frames: std::ops::Range<u64>, x: f32) {
        for f in frames {
            state.append(id, f, Rect::new(x, 0.0, 10.0, 10.0)).unwrap();
        }
    }

    #[test]
    fn test_noise_on_both_sides_is_absorbed() {
        let mut state = IdentityState::new();
        let before_noise = synthetic_id(0, 0).unwrap();
        add(&mut state, before_noise, 0..5, 0.0);
        add(&mut state, 1, 8..20, 10.0);
        add(&mut state, 2, 22..25, 20.0);
        add(&mut state, 3, 27..30, 30.0);
        state.set_role(1, "Target", &Cast::default()).unwrap();

        let report = state.absorb_noise(&AbsorbConfig::default(), 30.0);

        assert_eq!(report.len(), 3);
        assert_eq!(state.store().len(), 1);
        let target = state.store().get(1).unwrap();
        assert_eq!(target.role(), &Role::new("Target"));
        assert_eq!(target.len(), 5 + 12 + 3 + 3);
        assert_eq!(state.resolve(before_noise).unwrap(), 1);
        assert!(target.absorbed().contains(&3));
    }

    #[test]
    fn test_unlabelled_pairs_are_not_absorbed() {
        let mut state = IdentityState::new();
        add(&mut state, 1, 0..10, 0.0);
        add(&mut state, 2, 12..20, 0.0);
        assert!(state.absorb_noise(&AbsorbConfig::default(), 30.0).is_empty());
        assert_eq!(state.store().len(), 2);
    }

    #[test]
    fn test_labelled_pairs_are_not_absorbed() {
        let mut state = IdentityState::new();
        add(&mut state, 1, 0..10, 0.0);
        add(&mut state, 2, 12..20, 0.0);
        let cast = Cast::default();
        state.set_role(1, "Target", &cast).unwrap();
        state.set_role(2, "Confederate_1", &cast).unwrap();
        assert!(state.absorb_noise(&AbsorbConfig::default(), 30.0).is_empty());
    }

    #[test]
    fn test_tighter_distance_than_stitching() {
        let mut state = IdentityState::new();
        add(&mut state, 1, 0..10, 0.0);
        add(&mut state, 2, 12..20, 120.0);
        state.set_role(1, "Target", &Cast::default()).unwrap();

        assert!(state.absorb_noise(&AbsorbConfig::default(), 30.0).is_empty());
        let stitched = state.auto_stitch(&crate::consolidation::stitch::StitchConfig::default(), 30.0);
        assert_eq!(stitched.len(), 1);
    }
}
