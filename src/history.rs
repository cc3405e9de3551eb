//! Reversible editing: snapshot history with disk spill, and autosave.

mod autosave;
mod manager;
mod spill;

pub use autosave::{Autosave, AutosaveConfig};
pub use manager::{HistoryConfig, HistoryManager};
pub use spill::SpillStack;
