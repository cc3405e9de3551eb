//! Undo/redo over full state snapshots with a bounded memory footprint.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::consolidation::IdentityState;
use crate::error::Result;
use crate::history::spill::SpillStack;

const SESSION_PREFIX: &str = "session-";
/// Held exclusively by the owning manager for the life of the session.
const LOCK_FILE: &str = ".lock";

/// Configuration for the undo history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Snapshots kept in memory per stack; older ones go to disk.
    pub capacity: usize,
    /// Directory holding per-session spill directories. Defaults to
    /// `<system temp>/track-lineage`.
    pub spill_root: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 5,
            spill_root: None,
        }
    }
}

impl HistoryConfig {
    pub fn spill_root(&self) -> PathBuf {
        self.spill_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("track-lineage"))
    }
}

/// Snapshot history for one editing session.
///
/// Spill files live in a private directory that is removed when the manager
/// is dropped, including during unwinding. The directory carries a lock file
/// held for the manager's lifetime; [`HistoryManager::new`] sweeps only
/// directories whose lock nobody holds any more, i.e. whose owner died.
#[derive(Debug)]
pub struct HistoryManager {
    undo: SpillStack,
    redo: SpillStack,
    // field order is drop order: files, then the lock, then the directory
    _lock: File,
    spill_dir: TempDir,
}

impl HistoryManager {
    pub fn new(config: &HistoryConfig) -> Result<Self> {
        let root = config.spill_root();
        fs::create_dir_all(&root)?;
        sweep_stale_sessions(&root);
        let spill_dir = tempfile::Builder::new()
            .prefix(&session_prefix())
            .tempdir_in(&root)?;
        let lock = lock_session(spill_dir.path())?;
        debug!(dir = %spill_dir.path().display(), "history spill directory created");
        Ok(Self {
            undo: SpillStack::new(config.capacity),
            redo: SpillStack::new(config.capacity),
            _lock: lock,
            spill_dir,
        })
    }

    pub fn spill_dir(&self) -> &Path {
        self.spill_dir.path()
    }

    /// Record `state` as the point to return to. Call immediately before a
    /// mutation. Clears the redo stack.
    ///
    /// On a spill write failure the error is returned, the history is left as
    /// it was and `state` is not touched.
    pub fn snapshot(&mut self, state: &IdentityState) -> Result<()> {
        self.undo
            .push(Box::new(state.clone()), self.spill_dir.path())?;
        self.redo.clear();
        Ok(())
    }

    /// Swap `live` for the most recent snapshot. Returns `false` when there
    /// is nothing to undo.
    pub fn undo(&mut self, live: &mut IdentityState) -> Result<bool> {
        let moved = step(&mut self.undo, &mut self.redo, live, self.spill_dir.path())?;
        if moved {
            info!(undo = self.undo.len(), redo = self.redo.len(), "undo");
        }
        Ok(moved)
    }

    /// Reapply the most recently undone state. Returns `false` when there is
    /// nothing to redo.
    pub fn redo(&mut self, live: &mut IdentityState) -> Result<bool> {
        let moved = step(&mut self.redo, &mut self.undo, live, self.spill_dir.path())?;
        if moved {
            info!(undo = self.undo.len(), redo = self.redo.len(), "redo");
        }
        Ok(moved)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Snapshots currently held in memory, across both stacks.
    pub fn resident_count(&self) -> usize {
        self.undo.resident_count() + self.redo.resident_count()
    }

    /// Snapshots currently written to disk, across both stacks.
    pub fn spilled_count(&self) -> usize {
        self.undo.spilled_count() + self.redo.spilled_count()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

/// Pop from `from`, park the live state on `to`, and install the popped one.
fn step(
    from: &mut SpillStack,
    to: &mut SpillStack,
    live: &mut IdentityState,
    dir: &Path,
) -> Result<bool> {
    let Some(popped) = from.pop() else {
        return Ok(false);
    };
    let previous = popped?;
    if let Err(err) = to.push(Box::new(live.clone()), dir) {
        from.restore(previous, dir);
        return Err(err);
    }
    *live = *previous;
    Ok(true)
}

fn session_prefix() -> String {
    format!("{SESSION_PREFIX}{}-", std::process::id())
}

/// Take the ownership lock of `dir`. The file only appears under its final
/// name once locked, so a concurrent sweep never sees it free.
fn lock_session(dir: &Path) -> Result<File> {
    let pending = tempfile::Builder::new()
        .prefix(".lock-")
        .tempfile_in(dir)?;
    pending.as_file().try_lock_exclusive()?;
    Ok(pending.persist(dir.join(LOCK_FILE))?)
}

/// Whether the session owning `dir` is gone. A directory without a lock file
/// is kept: its owner may still be starting up.
fn is_abandoned(dir: &Path) -> bool {
    let Ok(lock) = File::open(dir.join(LOCK_FILE)) else {
        return false;
    };
    lock.try_lock_exclusive().is_ok()
}

/// Remove spill directories whose owning process has exited.
fn sweep_stale_sessions(root: &Path) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        if !entry.file_name().to_string_lossy().starts_with(SESSION_PREFIX) {
            continue;
        }
        let dir = entry.path();
        if !dir.is_dir() || !is_abandoned(&dir) {
            continue;
        }
        match fs::remove_dir_all(&dir) {
            Ok(()) => info!(dir = %dir.display(), "removed stale history spill directory"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(dir = %dir.display(), error = %err, "could not remove stale spill directory"),
        }
    }
}
