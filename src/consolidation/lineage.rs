//! Identity → master identity mapping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::consolidation::identity::TrackId;
use crate::error::{ConsolidationError, Result};

/// Maps every identity ever seen to the live track it now belongs to.
///
/// `reassign` repoints all entries directly, so a resolved chain is at most
/// one hop long in practice; `resolve` still walks pointers with a bound in
/// case that invariant is ever broken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineageResolver {
    parent: BTreeMap<TrackId, TrackId>,
}

impl LineageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a self-referencing entry for `id` if it has none yet.
    pub fn register(&mut self, id: TrackId) {
        self.parent.entry(id).or_insert(id);
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.parent.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Every identity ever registered, ascending.
    pub fn identities(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.parent.keys().copied()
    }

    /// Follow the pointer chain from `id` to its master.
    pub fn resolve(&self, id: TrackId) -> Result<TrackId> {
        let mut current = id;
        // a chain longer than the map itself must contain a cycle
        for _ in 0..=self.parent.len() {
            let next = *self
                .parent
                .get(&current)
                .ok_or(ConsolidationError::UnknownIdentity(id))?;
            if next == current {
                return Ok(current);
            }
            current = next;
        }
        Err(ConsolidationError::LineageCycle(id))
    }

    /// Repoint everything that currently resolves to `old_master` at
    /// `new_master`. Only merges call this.
    pub(crate) fn reassign(&mut self, old_master: TrackId, new_master: TrackId) {
        for target in self.parent.values_mut() {
            if *target == old_master {
                *target = new_master;
            }
        }
        self.parent.insert(old_master, new_master);
    }

    #[cfg(test)]
    pub(crate) fn link(&mut self, id: TrackId, target: TrackId) {
        self.parent.insert(id, target);
    }
}
