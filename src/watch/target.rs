// src/watch/target.rs

use std::path::{Path, PathBuf};

use crate::watch::patterns::PathFilter;

/// Default recursion limit for directory targets.
pub const DEFAULT_MAX_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    File,
    Directory,
}

/// One filesystem path to observe.
///
/// Targets are created by the watch-set builder and never mutated; a
/// reconfiguration replaces the whole [`WatchSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    path: PathBuf,
    kind: TargetKind,
    filter: Option<PathFilter>,
    max_depth: usize,
}

impl WatchTarget {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: TargetKind::File,
            filter: None,
            max_depth: 0,
        }
    }

    pub fn directory(path: impl Into<PathBuf>, filter: Option<PathFilter>, max_depth: usize) -> Self {
        Self {
            path: path.into(),
            kind: TargetKind::Directory,
            filter: filter.filter(|f| !f.is_empty()),
            max_depth: max_depth.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == TargetKind::Directory
    }

    pub fn filter(&self) -> Option<&PathFilter> {
        self.filter.as_ref()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Whether a descendant at `rel_path` counts toward change detection.
    pub fn accepts(&self, rel_path: &str) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(rel_path))
    }
}

/// Ordered, deduplicated list of targets for one application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    targets: Vec<WatchTarget>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a target unless one with the same path is already present.
    /// Returns whether the target was added.
    pub fn push(&mut self, target: WatchTarget) -> bool {
        if self.contains(target.path()) {
            return false;
        }
        self.targets.push(target);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.targets.iter().any(|t| t.path() == path)
    }

    pub fn targets(&self) -> &[WatchTarget] {
        &self.targets
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchTarget> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.targets.iter().map(|t| t.path()).collect()
    }
}

impl FromIterator<WatchTarget> for WatchSet {
    fn from_iter<I: IntoIterator<Item = WatchTarget>>(iter: I) -> Self {
        let mut set = WatchSet::new();
        for target in iter {
            set.push(target);
        }
        set
    }
}
