//! Error types shared across the crate.

use thiserror::Error;

use crate::consolidation::TrackId;

/// Errors surfaced to callers of the consolidation engine.
///
/// Precondition violations (`UnknownIdentity`, `SelfMerge`, `SplitOutOfRange`,
/// `UnknownRole`) are always raised before any state is touched.
#[derive(Debug, Error)]
pub enum ConsolidationError {
    #[error("identity {0} does not resolve to a live track")]
    UnknownIdentity(TrackId),

    #[error("identity {0} cannot be merged into itself")]
    SelfMerge(TrackId),

    #[error("splitting track {track} at frame {frame} would leave an empty piece")]
    SplitOutOfRange { track: TrackId, frame: u64 },

    #[error("role `{0}` is not part of the cast")]
    UnknownRole(String),

    /// Internal consistency failure: merges never create cycles.
    #[error("lineage cycle detected while resolving identity {0}")]
    LineageCycle(TrackId),

    #[error("native identity range exhausted")]
    IdentityExhausted,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("state encoding failed: {0}")]
    Codec(#[from] bincode::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConsolidationError>;

impl From<tempfile::PersistError> for ConsolidationError {
    fn from(err: tempfile::PersistError) -> Self {
        ConsolidationError::Io(err.error)
    }
}

/// Why a single input record or detection was skipped.
///
/// Never escapes the streaming passes; it is logged and counted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("line is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),

    #[error("track id {0} is outside the native identity range")]
    TrackIdOutOfRange(i64),

    #[error("frame {frame} / detection {index} cannot be given a synthetic identity")]
    SyntheticOutOfRange { frame: u64, index: usize },

    #[error("identity {id} already has a detection at frame {frame}")]
    DuplicateFrame { id: TrackId, frame: u64 },
}
