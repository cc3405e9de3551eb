//! Automatic merging of temporally and spatially adjacent fragments.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consolidation::candidates::{self, Candidate, EndpointClaims, Thresholds};
use crate::consolidation::identity::TrackId;
use crate::consolidation::state::IdentityState;

/// Configuration for auto-stitching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    /// Largest tolerated occlusion between fragments, in seconds.
    pub time_gap_threshold: f64,
    /// Largest centre distance between the end of one fragment and the
    /// start of the next, in pixels.
    pub distance_threshold: f32,
    /// Restrict candidates to this many fragments after the predecessor.
    pub lookahead: Option<usize>,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            time_gap_threshold: 2.0,
            distance_threshold: 150.0,
            lookahead: None,
        }
    }
}

impl StitchConfig {
    fn thresholds(&self) -> Thresholds {
        Thresholds {
            time_gap_secs: self.time_gap_threshold,
            distance: self.distance_threshold,
            lookahead: self.lookahead,
        }
    }
}

/// One join committed by a batch, with the scores it was accepted on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StitchedPair {
    pub master: TrackId,
    pub absorbed: TrackId,
    pub gap_secs: f64,
    pub distance: f32,
}

/// What one auto-stitch or noise-absorption batch did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StitchReport {
    pub merges: Vec<StitchedPair>,
}

impl StitchReport {
    pub fn len(&self) -> usize {
        self.merges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merges.is_empty()
    }
}

impl IdentityState {
    /// Candidates for an auto-stitch batch, best first. Does not mutate.
    pub fn plan_auto_stitch(&self, config: &StitchConfig, fps: f64) -> Vec<Candidate> {
        let fragments = candidates::fragments(self);
        candidates::score_pairs(&fragments, fps, config.thresholds(), |_, _| true)
    }

    /// Commit candidates greedily. A fragment whose tail (or head) was used
    /// by an earlier join in the batch is skipped, so chains never fork.
    pub fn apply_auto_stitch(&mut self, candidates: &[Candidate]) -> StitchReport {
        let mut claims = EndpointClaims::default();
        let mut report = StitchReport::default();
        for candidate in candidates {
            if !claims.claim(candidate) {
                continue;
            }
            let Ok(plan) = self.plan_merge(candidate.predecessor, candidate.successor) else {
                continue;
            };
            self.apply_merge(plan);
            report.merges.push(StitchedPair {
                master: plan.master,
                absorbed: plan.slave,
                gap_secs: candidate.gap_secs,
                distance: candidate.distance,
            });
        }
        info!(merged = report.len(), "auto-stitch batch applied");
        report
    }

    pub fn auto_stitch(&mut self, config: &StitchConfig, fps: f64) -> StitchReport {
        let candidates = self.plan_auto_stitch(config, fps);
        self.apply_auto_stitch(&candidates)
    }
}
