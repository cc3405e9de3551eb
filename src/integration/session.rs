//! Single-writer editing session over an [`IdentityState`].

use tracing::{info, warn};

use crate::config::ConsolidationConfig;
use crate::consolidation::{IdentityState, TrackId};
use crate::error::Result;
use crate::history::{Autosave, HistoryManager};
use crate::integration::command::{Command, Outcome};

/// Owns the live identity state, its undo history and the autosave timer.
///
/// Every mutating command is validated first; only commands that will
/// change something record a history snapshot, taken immediately before the
/// change. Callers serialize access; `&mut self` enforces one mutation at a
/// time.
pub struct Session {
    state: IdentityState,
    history: HistoryManager,
    autosave: Option<Autosave>,
    config: ConsolidationConfig,
}

impl Session {
    pub fn new(state: IdentityState, config: ConsolidationConfig) -> Result<Self> {
        config.validate()?;
        let history = HistoryManager::new(&config.history)?;
        let autosave = config.autosave.as_ref().map(Autosave::new);
        Ok(Self {
            state,
            history,
            autosave,
            config,
        })
    }

    pub fn state(&self) -> &IdentityState {
        &self.state
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// End the session, keeping the final state. Spill files are removed.
    pub fn into_state(self) -> IdentityState {
        self.state
    }

    /// Whether an autosave from an earlier session is waiting on disk.
    pub fn has_pending_autosave(&self) -> bool {
        self.autosave.as_ref().is_some_and(Autosave::pending)
    }

    /// Replace the live state with the pending autosave. The replaced state
    /// stays reachable through undo. Returns `false` if there is none.
    pub fn restore_from_autosave(&mut self) -> Result<bool> {
        let Some(autosave) = &self.autosave else {
            return Ok(false);
        };
        if !autosave.pending() {
            return Ok(false);
        }
        let restored = autosave.load()?;
        self.history.snapshot(&self.state)?;
        self.state = restored;
        info!(tracks = self.state.store().len(), "restored autosave");
        Ok(true)
    }

    /// Write the autosave now, regardless of the timer.
    pub fn save_autosave(&mut self) -> Result<()> {
        if let Some(autosave) = &mut self.autosave {
            autosave.save(&self.state)?;
        }
        Ok(())
    }

    /// Remove the autosave file, e.g. once outputs are safely written.
    pub fn discard_autosave(&self) -> Result<()> {
        match &self.autosave {
            Some(autosave) => autosave.discard(),
            None => Ok(()),
        }
    }

    pub fn merge(&mut self, master: TrackId, slave: TrackId) -> Result<Outcome> {
        self.apply(Command::Merge { master, slave })
    }

    pub fn split(&mut self, track: TrackId, frame: u64, keep_head: bool) -> Result<Outcome> {
        self.apply(Command::Split {
            track,
            frame,
            keep_head,
        })
    }

    pub fn undo(&mut self) -> Result<Outcome> {
        self.apply(Command::Undo)
    }

    pub fn redo(&mut self) -> Result<Outcome> {
        self.apply(Command::Redo)
    }

    /// Run one command.
    pub fn apply(&mut self, command: Command) -> Result<Outcome> {
        let outcome = self.execute(command)?;
        if outcome != Outcome::Unchanged {
            self.tick_autosave();
        }
        Ok(outcome)
    }

    fn execute(&mut self, command: Command) -> Result<Outcome> {
        let fps = self.config.fps;
        match command {
            Command::Merge { master, slave } => {
                let plan = self.state.plan_merge(master, slave)?;
                self.history.snapshot(&self.state)?;
                self.state.apply_merge(plan);
                Ok(Outcome::Merged {
                    master: plan.master,
                    merged: 1,
                })
            }
            Command::MergeMany { ids } => {
                let plans = self.state.plan_merge_many(&ids)?;
                let Some(first) = plans.first() else {
                    return Ok(Outcome::Unchanged);
                };
                let master = first.master;
                self.history.snapshot(&self.state)?;
                self.state.apply_merges(&plans);
                Ok(Outcome::Merged {
                    master,
                    merged: plans.len(),
                })
            }
            Command::MergeByRole => {
                let plans = self.state.plan_merge_by_role(&self.config.cast);
                if plans.is_empty() {
                    return Ok(Outcome::Unchanged);
                }
                self.history.snapshot(&self.state)?;
                self.state.apply_merges(&plans);
                info!(merged = plans.len(), "merged tracks by role");
                Ok(Outcome::Merged {
                    master: plans[0].master,
                    merged: plans.len(),
                })
            }
            Command::Split {
                track,
                frame,
                keep_head,
            } => {
                let plan = self.state.plan_split(track, frame, keep_head)?;
                self.history.snapshot(&self.state)?;
                let new_id = self
                    .state
                    .apply_split(plan, self.config.split_provenance)?;
                Ok(Outcome::Split {
                    original: plan.master,
                    new_id,
                })
            }
            Command::SetRole { track, role } => {
                let plan = self.state.plan_set_role(track, &role, &self.config.cast)?;
                let current = self.state.store().get(plan.master).map(|t| t.role());
                if current == Some(&plan.role) {
                    return Ok(Outcome::Unchanged);
                }
                let master = plan.master;
                self.history.snapshot(&self.state)?;
                self.state.apply_set_role(plan);
                Ok(Outcome::RoleSet { master })
            }
            Command::AutoStitch => {
                let candidates = self.state.plan_auto_stitch(&self.config.stitch, fps);
                if candidates.is_empty() {
                    return Ok(Outcome::Unchanged);
                }
                self.history.snapshot(&self.state)?;
                Ok(Outcome::Stitched(self.state.apply_auto_stitch(&candidates)))
            }
            Command::AbsorbNoise => {
                let candidates = self.state.plan_absorb_noise(&self.config.absorb, fps);
                if candidates.is_empty() {
                    return Ok(Outcome::Unchanged);
                }
                self.history.snapshot(&self.state)?;
                let report = self
                    .state
                    .apply_absorb_noise(candidates, &self.config.absorb, fps);
                Ok(Outcome::Absorbed(report))
            }
            Command::Undo => Ok(if self.history.undo(&mut self.state)? {
                Outcome::Undone
            } else {
                Outcome::Unchanged
            }),
            Command::Redo => Ok(if self.history.redo(&mut self.state)? {
                Outcome::Redone
            } else {
                Outcome::Unchanged
            }),
            Command::RestoreAutosave => Ok(if self.restore_from_autosave()? {
                Outcome::Restored
            } else {
                Outcome::Unchanged
            }),
        }
    }

    fn tick_autosave(&mut self) {
        let Some(autosave) = &mut self.autosave else {
            return;
        };
        // a failed autosave must not fail the edit that triggered it
        if let Err(err) = autosave.tick(&self.state) {
            warn!(path = %autosave.path().display(), error = %err, "autosave failed");
        }
    }
}
