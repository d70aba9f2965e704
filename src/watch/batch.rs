// src/watch/batch.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::types::AppId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Fold a newer observation for the same path into a pending one.
    /// `None` means the two cancel out (created then deleted).
    pub fn merge(self, newer: ChangeKind) -> Option<ChangeKind> {
        use ChangeKind::*;
        match (self, newer) {
            (Added, Removed) => None,
            (Added, _) => Some(Added),
            (Removed, Added) | (Removed, Modified) => Some(Modified),
            (_, Removed) => Some(Removed),
            (Modified, _) => Some(Modified),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => f.write_str("added"),
            ChangeKind::Modified => f.write_str("modified"),
            ChangeKind::Removed => f.write_str("removed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl Change {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// A settled set of changes for one application.
///
/// Never empty: [`ChangeBatch::new`] refuses an empty change list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    app: AppId,
    cycle: u64,
    changes: Vec<Change>,
}

impl ChangeBatch {
    pub fn new(app: AppId, cycle: u64, changes: Vec<Change>) -> Option<Self> {
        if changes.is_empty() {
            return None;
        }
        Some(Self { app, cycle, changes })
    }

    pub fn app(&self) -> &AppId {
        &self.app
    }

    /// Scan cycle on which the batch settled.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn kind_of(&self, path: &Path) -> Option<ChangeKind> {
        self.changes.iter().find(|c| c.path == path).map(|c| c.kind)
    }

    /// Coalesce a later batch of the same application into this one.
    ///
    /// Per path the kinds are folded with [`ChangeKind::merge`]; a path whose
    /// kinds cancel out is dropped, but the merged batch keeps at least one
    /// entry so it still asks for a redeploy.
    pub fn merge(&mut self, later: ChangeBatch) {
        debug_assert_eq!(self.app, later.app);
        self.cycle = self.cycle.max(later.cycle);

        let mut by_path: BTreeMap<PathBuf, ChangeKind> = BTreeMap::new();
        let mut fallback = None;
        for change in self.changes.drain(..).chain(later.changes) {
            fallback = Some(change.clone());
            match by_path.remove(&change.path) {
                Some(prev) => {
                    if let Some(kind) = prev.merge(change.kind) {
                        by_path.insert(change.path, kind);
                    }
                }
                None => {
                    by_path.insert(change.path, change.kind);
                }
            }
        }

        self.changes = by_path
            .into_iter()
            .map(|(path, kind)| Change { path, kind })
            .collect();
        if self.changes.is_empty() {
            self.changes.extend(fallback);
        }
    }
}
