//! A stack of states that keeps only the newest few in memory.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::consolidation::IdentityState;
use crate::error::Result;

/// One stack entry, either resident or written out to its own file.
///
/// Dropping a spilled slot deletes its file.
#[derive(Debug)]
enum Slot {
    Resident(Box<IdentityState>),
    Spilled(NamedTempFile),
}

/// Stack of snapshots with at most `capacity` resident entries.
///
/// Pushing past the budget writes the oldest resident entry to a file in
/// `dir` and releases it from memory. Popping a spilled entry reads it back
/// and removes the file.
#[derive(Debug)]
pub struct SpillStack {
    capacity: usize,
    slots: VecDeque<Slot>,
    resident: usize,
}

impl SpillStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: VecDeque::new(),
            resident: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn resident_count(&self) -> usize {
        self.resident
    }

    pub fn spilled_count(&self) -> usize {
        self.slots.len() - self.resident
    }

    /// Push `state` on top. If this pushes a resident entry past the budget
    /// and writing it out fails, the push is undone and the error returned.
    pub fn push(&mut self, state: Box<IdentityState>, dir: &Path) -> Result<()> {
        self.slots.push_back(Slot::Resident(state));
        self.resident += 1;
        if self.resident <= self.capacity {
            return Ok(());
        }
        if let Err(err) = self.spill_oldest_resident(dir) {
            self.slots.pop_back();
            self.resident -= 1;
            return Err(err);
        }
        Ok(())
    }

    /// Push back an entry that was just popped. Never fails: if the spill
    /// needed to stay within budget cannot be written, the entry stays
    /// resident and the stack runs over budget until the next pop.
    pub(crate) fn restore(&mut self, state: Box<IdentityState>, dir: &Path) {
        self.slots.push_back(Slot::Resident(state));
        self.resident += 1;
        if self.resident <= self.capacity {
            return;
        }
        if let Err(err) = self.spill_oldest_resident(dir) {
            warn!(error = %err, resident = self.resident, "history over its memory budget");
        }
    }

    /// Pop the newest entry. A read failure loses that entry.
    pub fn pop(&mut self) -> Option<Result<Box<IdentityState>>> {
        match self.slots.pop_back()? {
            Slot::Resident(state) => {
                self.resident -= 1;
                Some(Ok(state))
            }
            Slot::Spilled(file) => {
                let loaded = read_state(&file);
                if let Err(err) = &loaded {
                    warn!(path = %file.path().display(), error = %err, "spilled history entry lost");
                }
                Some(loaded.map(Box::new))
            }
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.resident = 0;
    }

    fn spill_oldest_resident(&mut self, dir: &Path) -> Result<()> {
        let Some(index) = self
            .slots
            .iter()
            .position(|slot| matches!(slot, Slot::Resident(_)))
        else {
            return Ok(());
        };
        let Slot::Resident(state) = &self.slots[index] else {
            return Ok(());
        };
        let file = write_state(state, dir)?;
        debug!(path = %file.path().display(), depth = index, "spilled history entry");
        self.slots[index] = Slot::Spilled(file);
        self.resident -= 1;
        Ok(())
    }
}

fn write_state(state: &IdentityState, dir: &Path) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("state-")
        .suffix(".bin")
        .tempfile_in(dir)?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        bincode::serialize_into(&mut writer, state)?;
        writer.flush()?;
    }
    file.as_file().sync_data()?;
    Ok(file)
}

fn read_state(file: &NamedTempFile) -> Result<IdentityState> {
    let mut handle: File = file.reopen()?;
    handle.seek(SeekFrom::Start(0))?;
    Ok(bincode::deserialize_from(BufReader::new(handle))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidation::Rect;

    fn state(tag: u64) -> Box<IdentityState> {
        let mut state = IdentityState::new();
        state.append(tag, tag, Rect::new(tag as f32, 0.0, 1.0, 1.0)).unwrap();
        Box::new(state)
    }

    fn files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_spills_oldest_past_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut stack = SpillStack::new(2);
        for tag in 0..5 {
            stack.push(state(tag), dir.path()).unwrap();
        }
        assert_eq!(stack.resident_count(), 2);
        assert_eq!(stack.spilled_count(), 3);
        assert_eq!(files_in(dir.path()), 3);

        for tag in (0..5).rev() {
            assert_eq!(stack.pop().unwrap().unwrap(), state(tag));
        }
        assert!(stack.pop().is_none());
        assert_eq!(files_in(dir.path()), 0);
    }

    #[test]
    fn test_failed_spill_undoes_push() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let mut stack = SpillStack::new(1);
        stack.push(state(1), &missing).unwrap();
        assert!(stack.push(state(2), &missing).is_err());
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.pop().unwrap().unwrap(), state(1));
    }

    #[test]
    fn test_restore_keeps_memory_budget() {
        let dir = tempfile::tempdir().unwrap();
        let mut stack = SpillStack::new(1);
        stack.push(state(1), dir.path()).unwrap();
        stack.push(state(2), dir.path()).unwrap();

        let newest = stack.pop().unwrap().unwrap();
        assert_eq!(newest, state(2));
        let oldest = stack.pop().unwrap().unwrap();
        stack.push(state(3), dir.path()).unwrap();
        stack.restore(oldest, dir.path());
        assert_eq!(stack.resident_count(), 1);
        assert_eq!(stack.spilled_count(), 1);

        let missing = dir.path().join("gone");
        stack.restore(newest, &missing);
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.resident_count(), 2);
        assert_eq!(stack.pop().unwrap().unwrap(), state(2));
    }

    #[test]
    fn test_unreadable_entry_is_lost() {
        let dir = tempfile::tempdir().unwrap();
        let mut stack = SpillStack::new(0);
        stack.push(state(1), dir.path()).unwrap();
        stack.push(state(2), dir.path()).unwrap();
        for entry in std::fs::read_dir(dir.path()).unwrap() {
            std::fs::write(entry.unwrap().path(), b"").unwrap();
        }

        assert!(stack.pop().unwrap().is_err());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_clear_deletes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut stack = SpillStack::new(0);
        stack.push(state(1), dir.path()).unwrap();
        assert_eq!(files_in(dir.path()), 1);
        stack.clear();
        assert_eq!(files_in(dir.path()), 0);
    }
}
