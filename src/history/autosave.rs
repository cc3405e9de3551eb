//! Periodic full-state autosave and crash recovery.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::consolidation::IdentityState;
use crate::error::{ConsolidationError, Result};

const FORMAT_VERSION: u32 = 1;

/// Configuration for the autosave timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub path: PathBuf,
    /// Minimum wall-clock time between two autosaves.
    pub interval_secs: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("track-lineage.autosave"),
            interval_secs: 60,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AutosaveFile {
    version: u32,
    saved_at_secs: u64,
    state: IdentityState,
}

/// Writes the live state to a well-known path at most once per interval.
#[derive(Debug)]
pub struct Autosave {
    path: PathBuf,
    interval: Duration,
    last_save: Instant,
}

impl Autosave {
    pub fn new(config: &AutosaveConfig) -> Self {
        Self {
            path: config.path.clone(),
            interval: Duration::from_secs(config.interval_secs),
            last_save: Instant::now(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an autosave from an earlier session is waiting to be restored.
    pub fn pending(&self) -> bool {
        self.path.is_file()
    }

    pub fn is_due(&self) -> bool {
        self.last_save.elapsed() >= self.interval
    }

    /// Save if the interval has elapsed. Returns whether a save happened.
    pub fn tick(&mut self, state: &IdentityState) -> Result<bool> {
        if !self.is_due() {
            return Ok(false);
        }
        self.save(state)?;
        Ok(true)
    }

    /// Write `state` now. The file is replaced atomically, so a crash
    /// mid-write leaves the previous autosave intact.
    pub fn save(&mut self, state: &IdentityState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut file = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            let saved_at_secs = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            bincode::serialize_into(
                &mut writer,
                &AutosaveFile {
                    version: FORMAT_VERSION,
                    saved_at_secs,
                    state: state.clone(),
                },
            )?;
            writer.flush()?;
        }
        file.as_file().sync_all()?;
        file.persist(&self.path)?;
        self.last_save = Instant::now();
        info!(path = %self.path.display(), tracks = state.store().len(), "autosaved");
        Ok(())
    }

    /// Read the pending autosave.
    pub fn load(&self) -> Result<IdentityState> {
        let file = File::open(&self.path)?;
        let saved: AutosaveFile = bincode::deserialize_from(BufReader::new(file))?;
        if saved.version != FORMAT_VERSION {
            return Err(ConsolidationError::InvalidConfig(format!(
                "autosave {} has format version {}, expected {}",
                self.path.display(),
                saved.version,
                FORMAT_VERSION
            )));
        }
        debug!(path = %self.path.display(), saved_at = saved.saved_at_secs, "loaded autosave");
        Ok(saved.state)
    }

    /// Delete the autosave file, e.g. after a clean export.
    pub fn discard(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::Rect;

    #[test]
    fn test_save_load_discard() {
        let dir = tempfile::tempdir().unwrap();
        let config = AutosaveConfig {
            path: dir.path().join("nested").join("session.autosave"),
            interval_secs: 3600,
        };
        let mut autosave = Autosave::new(&config);
        assert!(!autosave.pending());

        let mut state = IdentityState::new();
        state.append(3, 7, Rect::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        autosave.save(&state).unwrap();

        assert!(autosave.pending());
        assert_eq!(autosave.load().unwrap(), state);

        autosave.discard().unwrap();
        assert!(!autosave.pending());
        autosave.discard().unwrap();
    }

    #[test]
    fn test_tick_respects_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.autosave");
        let mut slow = Autosave::new(&AutosaveConfig {
            path: path.clone(),
            interval_secs: 3600,
        });
        assert!(!slow.tick(&IdentityState::new()).unwrap());
        assert!(!path.exists());

        let mut eager = Autosave::new(&AutosaveConfig {
            path: path.clone(),
            interval_secs: 0,
        });
        assert!(eager.tick(&IdentityState::new()).unwrap());
        assert!(path.exists());
    }

    #[test]
    fn test_corrupt_autosave_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.autosave");
        fs::write(&path, b"\x01").unwrap();
        let autosave = Autosave::new(&AutosaveConfig {
            path,
            interval_secs: 60,
        });
        assert!(autosave.load().is_err());
    }
}
