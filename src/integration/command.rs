//! Edits submitted to a [`Session`](crate::integration::Session).

use serde::{Deserialize, Serialize};

use crate::consolidation::{StitchReport, TrackId};

/// One edit, as submitted by a UI or read from a command script.
///
/// Serialized with an `op` tag, e.g. `{"op": "split", "track": 5, "frame": 11}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Merge {
        master: TrackId,
        slave: TrackId,
    },
    /// Merge a selection into its lowest identity.
    MergeMany {
        ids: Vec<TrackId>,
    },
    /// Merge all tracks sharing a cast role.
    MergeByRole,
    Split {
        track: TrackId,
        frame: u64,
        #[serde(default)]
        keep_head: bool,
    },
    SetRole {
        track: TrackId,
        role: String,
    },
    AutoStitch,
    AbsorbNoise,
    Undo,
    Redo,
    RestoreAutosave,
}

/// What a command did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Merged { master: TrackId, merged: usize },
    Split { original: TrackId, new_id: TrackId },
    RoleSet { master: TrackId },
    Stitched(StitchReport),
    Absorbed(StitchReport),
    Undone,
    Redone,
    Restored,
    /// Nothing to do; no history entry was recorded.
    Unchanged,
}
