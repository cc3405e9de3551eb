mod absorb;
mod candidates;
mod identity;
mod lineage;
mod merge;
mod rect;
mod role;
mod split;
mod state;
mod stitch;
mod store;
mod track;

pub use absorb::AbsorbConfig;
pub use candidates::{Candidate, Fragment, Thresholds};
pub use identity::{
    MAX_DETECTIONS_PER_FRAME, MAX_SYNTHETIC_FRAME, SYNTHETIC_BASE, TrackId, UNASSIGNED,
    is_synthetic, resolve_raw_id, synthetic_id, synthetic_origin,
};
pub use lineage::LineageResolver;
pub use merge::MergePlan;
pub use rect::{Rect, center_distance_batch};
pub use role::{Cast, IGNORE, Role};
pub use split::{SplitPlan, SplitProvenance};
pub use state::{IdentityState, RolePlan};
pub use stitch::{StitchConfig, StitchReport, StitchedPair};
pub use store::{TrackStore, TrackSummary};
pub use track::Track;
