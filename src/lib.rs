//! Consolidation of fragmented multi-object tracker identities.
//!
//! A tracker run leaves one person split across many short tracks and a
//! cloud of unassigned detections. This crate loads such a feed, lets an
//! operator (or the automatic passes) merge, split and label tracks with a
//! reversible history, and resolves every original identity to its final
//! master and role.
//!
//! ```no_run
//! use track_lineage::config::ConsolidationConfig;
//! use track_lineage::integration::{CancelToken, Command, Session, load_path};
//!
//! # fn main() -> track_lineage::error::Result<()> {
//! let (state, _report) = load_path("feed.jsonl".as_ref(), &CancelToken::new())?;
//! let mut session = Session::new(state, ConsolidationConfig::default())?;
//! session.apply(Command::AutoStitch)?;
//! session.merge(5, 7)?;
//! session.undo()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consolidation;
pub mod error;
pub mod history;
pub mod integration;

pub use config::ConsolidationConfig;
pub use consolidation::{IdentityState, Rect, Role, Track, TrackId};
pub use error::{ConsolidationError, RecordError, Result};
pub use history::HistoryManager;
pub use integration::{Command, Outcome, Session};
