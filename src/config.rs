use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consolidation::{AbsorbConfig, Cast, SplitProvenance, StitchConfig};
use crate::error::{ConsolidationError, Result};
use crate::history::{AutosaveConfig, HistoryConfig};

/// Everything a consolidation session is tuned by.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Video frame rate, used to turn frame gaps into seconds.
    pub fps: f64,
    pub stitch: StitchConfig,
    pub absorb: AbsorbConfig,
    pub cast: Cast,
    pub split_provenance: SplitProvenance,
    /// Unlabelled tracks shorter than this are hidden from listings.
    pub min_listed_secs: f64,
    pub history: HistoryConfig,
    /// `None` disables autosave.
    pub autosave: Option<AutosaveConfig>,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            stitch: StitchConfig::default(),
            absorb: AbsorbConfig::default(),
            cast: Cast::default(),
            split_provenance: SplitProvenance::default(),
            min_listed_secs: 1.0,
            history: HistoryConfig::default(),
            autosave: None,
        }
    }
}

impl ConsolidationConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(invalid(format!("fps must be positive, got {}", self.fps)));
        }
        if !(self.stitch.time_gap_threshold > 0.0 && self.stitch.distance_threshold > 0.0) {
            return Err(invalid("stitch thresholds must be positive".into()));
        }
        if !(self.absorb.time_gap_threshold > 0.0 && self.absorb.distance_threshold > 0.0) {
            return Err(invalid("absorb thresholds must be positive".into()));
        }
        if self.absorb.distance_threshold >= self.stitch.distance_threshold {
            return Err(invalid(format!(
                "absorb distance ({}) must be tighter than stitch distance ({})",
                self.absorb.distance_threshold, self.stitch.distance_threshold
            )));
        }
        if self.stitch.lookahead == Some(0) {
            return Err(invalid("stitch lookahead must be at least 1".into()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConsolidationError {
    ConsolidationError::InvalidConfig(message)
}
