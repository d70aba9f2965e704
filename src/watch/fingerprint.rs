// src/watch/fingerprint.rs

//! Point-in-time fingerprints of watch targets and the diff between two of
//! them.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use crate::fs::{FileMeta, FileSystem};
use crate::watch::batch::{Change, ChangeKind};
use crate::watch::hash::compute_file_hash;
use crate::watch::path_utils::relative_str;
use crate::watch::target::{WatchSet, WatchTarget};

/// Observed state of one path.
///
/// Directory nodes have no size or mtime of their own; they compare by their
/// (filtered) children only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    pub exists: bool,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub digest: Option<String>,
    pub children: BTreeMap<OsString, Fingerprint>,
}

impl Fingerprint {
    pub fn missing() -> Self {
        Self::default()
    }

    fn file(meta: FileMeta, digest: Option<String>) -> Self {
        Self {
            exists: true,
            is_dir: false,
            size: meta.len,
            modified: meta.modified,
            digest,
            children: BTreeMap::new(),
        }
    }

    fn dir(children: BTreeMap<OsString, Fingerprint>) -> Self {
        Self {
            exists: true,
            is_dir: true,
            children,
            ..Self::default()
        }
    }

    /// Whether two file fingerprints differ. With digests on both sides only
    /// the content counts, so a bare timestamp bump is not a change.
    fn file_differs(&self, other: &Fingerprint) -> bool {
        match (&self.digest, &other.digest) {
            (Some(a), Some(b)) => a != b,
            _ => self.size != other.size || self.modified != other.modified,
        }
    }
}

/// Fingerprints of every target in a watch set, keyed by target path.
pub type Snapshot = BTreeMap<PathBuf, Fingerprint>;

#[derive(Debug, Clone)]
pub struct FingerprintStore {
    fs: Arc<dyn FileSystem>,
    use_hash: bool,
}

impl FingerprintStore {
    pub fn new(fs: Arc<dyn FileSystem>, use_hash: bool) -> Self {
        Self { fs, use_hash }
    }

    /// Fingerprint every target of `watch_set`.
    ///
    /// A target that cannot be read for any reason other than "not found"
    /// keeps its fingerprint from `previous`, so a transient I/O error never
    /// looks like a change.
    pub fn snapshot(&self, watch_set: &WatchSet, previous: Option<&Snapshot>) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for target in watch_set.iter() {
            let fp = match self.fingerprint_target(target) {
                Ok(fp) => fp,
                Err(err) => {
                    debug!(
                        path = ?target.path(),
                        error = %err,
                        "fingerprint failed; keeping previous state"
                    );
                    previous
                        .and_then(|prev| prev.get(target.path()).cloned())
                        .unwrap_or_else(Fingerprint::missing)
                }
            };
            snapshot.insert(target.path().to_path_buf(), fp);
        }
        snapshot
    }

    fn fingerprint_target(&self, target: &WatchTarget) -> io::Result<Fingerprint> {
        let meta = match self.fs.metadata(target.path()) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Fingerprint::missing());
            }
            Err(err) => return Err(err),
        };

        if meta.is_dir {
            let children = self.walk(target, target.path(), 1)?;
            Ok(Fingerprint::dir(children))
        } else {
            self.fingerprint_file(target.path(), meta)
        }
    }

    fn fingerprint_file(&self, path: &Path, meta: FileMeta) -> io::Result<Fingerprint> {
        let digest = if self.use_hash {
            Some(compute_file_hash(self.fs.as_ref(), path).map_err(io::Error::other)?)
        } else {
            None
        };
        Ok(Fingerprint::file(meta, digest))
    }

    /// Entries listed here sit at `depth` below the target root.
    fn walk(
        &self,
        target: &WatchTarget,
        dir: &Path,
        depth: usize,
    ) -> io::Result<BTreeMap<OsString, Fingerprint>> {
        let mut children = BTreeMap::new();

        for entry in self.fs.read_dir(dir)? {
            let Some(name) = entry.file_name().map(|n| n.to_os_string()) else {
                continue;
            };
            let Some(rel) = relative_str(target.path(), &entry) else {
                continue;
            };

            let meta = match self.fs.metadata(&entry) {
                Ok(meta) => meta,
                // Deleted between listing and stat.
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };

            if meta.is_dir {
                if depth >= target.max_depth() {
                    continue;
                }
                if target.filter().is_some_and(|f| f.prunes_dir(&rel)) {
                    continue;
                }
                let nested = self.walk(target, &entry, depth + 1)?;
                if !nested.is_empty() {
                    children.insert(name, Fingerprint::dir(nested));
                }
            } else if target.accepts(&rel) {
                children.insert(name, self.fingerprint_file(&entry, meta)?);
            }
        }

        Ok(children)
    }
}

/// Classify every difference between two snapshots.
///
/// Changes name the concrete file that differs; a whole directory appearing
/// or disappearing reports each file underneath it.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Vec<Change> {
    let missing = Fingerprint::missing();
    let keys: BTreeSet<&PathBuf> = old.keys().chain(new.keys()).collect();

    let mut changes = Vec::new();
    for path in keys {
        let before = old.get(path).unwrap_or(&missing);
        let after = new.get(path).unwrap_or(&missing);
        diff_node(path, before, after, &mut changes);
    }
    changes
}

fn diff_node(path: &Path, old: &Fingerprint, new: &Fingerprint, out: &mut Vec<Change>) {
    match (old.exists, new.exists) {
        (false, false) => {}
        (false, true) => collect_leaves(path, new, ChangeKind::Added, out),
        (true, false) => collect_leaves(path, old, ChangeKind::Removed, out),
        (true, true) => {
            if old.is_dir != new.is_dir {
                out.push(Change::new(path, ChangeKind::Modified));
            } else if new.is_dir {
                let names: BTreeSet<&OsString> =
                    old.children.keys().chain(new.children.keys()).collect();
                let missing = Fingerprint::missing();
                for name in names {
                    let before = old.children.get(name).unwrap_or(&missing);
                    let after = new.children.get(name).unwrap_or(&missing);
                    diff_node(&path.join(name), before, after, out);
                }
            } else if old.file_differs(new) {
                out.push(Change::new(path, ChangeKind::Modified));
            }
        }
    }
}

fn collect_leaves(path: &Path, fp: &Fingerprint, kind: ChangeKind, out: &mut Vec<Change>) {
    if fp.is_dir && !fp.children.is_empty() {
        for (name, child) in &fp.children {
            collect_leaves(&path.join(name), child, kind, out);
        }
    } else {
        out.push(Change::new(path, kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::watch::patterns::PathFilter;
    use crate::watch::target::DEFAULT_MAX_DEPTH;

    fn store(fs: &MockFileSystem, use_hash: bool) -> FingerprintStore {
        FingerprintStore::new(Arc::new(fs.clone()), use_hash)
    }

    fn classes_set(filter: Option<PathFilter>, max_depth: usize) -> WatchSet {
        let mut set = WatchSet::new();
        set.push(WatchTarget::file("/app/WEB-INF/web.xml"));
        set.push(WatchTarget::directory("/app/classes", filter, max_depth));
        set
    }

    #[test]
    fn unchanged_tree_has_no_diff() {
        let fs = MockFileSystem::new();
        fs.add_file("/app/WEB-INF/web.xml", "<web-app/>");
        fs.add_file("/app/classes/com/acme/A.class", "a");
        let set = classes_set(None, DEFAULT_MAX_DEPTH);

        let store = store(&fs, false);
        let first = store.snapshot(&set, None);
        let second = store.snapshot(&set, Some(&first));
        assert_eq!(first, second);
        assert!(diff(&first, &second).is_empty());
    }

    #[test]
    fn nested_file_changes_are_classified() {
        let fs = MockFileSystem::new();
        fs.add_file("/app/WEB-INF/web.xml", "<web-app/>");
        fs.add_file("/app/classes/com/acme/A.class", "a");
        fs.add_file("/app/classes/com/acme/B.class", "b");
        let set = classes_set(None, DEFAULT_MAX_DEPTH);
        let store = store(&fs, false);
        let before = store.snapshot(&set, None);

        fs.add_file("/app/classes/com/acme/A.class", "a2");
        fs.remove("/app/classes/com/acme/B.class");
        fs.add_file("/app/classes/com/acme/C.class", "c");
        let after = store.snapshot(&set, Some(&before));

        let changes = diff(&before, &after);
        assert_eq!(
            changes,
            vec![
                Change::new("/app/classes/com/acme/A.class", ChangeKind::Modified),
                Change::new("/app/classes/com/acme/B.class", ChangeKind::Removed),
                Change::new("/app/classes/com/acme/C.class", ChangeKind::Added),
            ]
        );
    }

    #[test]
    fn same_size_rewrite_is_seen_through_mtime() {
        let fs = MockFileSystem::new();
        fs.add_file("/app/WEB-INF/web.xml", "<web-app/>");
        let set = classes_set(None, DEFAULT_MAX_DEPTH);
        let store = store(&fs, false);
        let before = store.snapshot(&set, None);

        fs.add_file("/app/WEB-INF/web.xml", "<web-app/>");
        let after = store.snapshot(&set, Some(&before));
        assert_eq!(
            diff(&before, &after),
            vec![Change::new("/app/WEB-INF/web.xml", ChangeKind::Modified)]
        );
    }

    #[test]
    fn content_digest_ignores_touch() {
        let fs = MockFileSystem::new();
        fs.add_file("/app/WEB-INF/web.xml", "<web-app/>");
        let set = classes_set(None, DEFAULT_MAX_DEPTH);
        let store = store(&fs, true);
        let before = store.snapshot(&set, None);

        fs.touch("/app/WEB-INF/web.xml");
        let after = store.snapshot(&set, Some(&before));
        assert!(diff(&before, &after).is_empty());

        fs.add_file("/app/WEB-INF/web.xml", "<web-app version=\"3\"/>");
        let changed = store.snapshot(&set, Some(&after));
        assert_eq!(diff(&after, &changed).len(), 1);
    }

    #[test]
    fn filtered_out_files_are_invisible() {
        let fs = MockFileSystem::new();
        fs.add_file("/app/classes/A.class", "a");
        let filter = PathFilter::new(&["**/*.class".to_string()], &[]).unwrap();
        let set = classes_set(Some(filter), DEFAULT_MAX_DEPTH);
        let store = store(&fs, false);
        let before = store.snapshot(&set, None);

        fs.add_file("/app/classes/notes.txt", "scratch");
        fs.add_file("/app/classes/tmp/more.txt", "scratch");
        let after = store.snapshot(&set, Some(&before));
        assert!(diff(&before, &after).is_empty());
    }

    #[test]
    fn walk_stops_at_max_depth() {
        let fs = MockFileSystem::new();
        fs.add_file("/app/classes/A.class", "a");
        fs.add_file("/app/classes/deep/B.class", "b");
        let set = classes_set(None, 1);
        let snap = store(&fs, false).snapshot(&set, None);

        let classes = &snap[Path::new("/app/classes")];
        assert_eq!(classes.children.len(), 1);
        assert!(classes.children.contains_key(&OsString::from("A.class")));
    }

    #[test]
    fn io_error_keeps_previous_fingerprint() {
        let fs = MockFileSystem::new();
        fs.add_file("/app/WEB-INF/web.xml", "<web-app/>");
        fs.add_file("/app/classes/A.class", "a");
        let set = classes_set(None, DEFAULT_MAX_DEPTH);
        let store = store(&fs, false);
        let before = store.snapshot(&set, None);

        fs.add_file("/app/classes/A.class", "changed");
        fs.fail_path("/app/classes");
        let during = store.snapshot(&set, Some(&before));
        assert!(diff(&before, &during).is_empty());

        fs.clear_failures();
        let after = store.snapshot(&set, Some(&during));
        assert_eq!(
            diff(&during, &after),
            vec![Change::new("/app/classes/A.class", ChangeKind::Modified)]
        );
    }

    #[test]
    fn missing_target_reports_added_then_removed() {
        let fs = MockFileSystem::new();
        let mut set = WatchSet::new();
        set.push(WatchTarget::file("/app/late.xml"));
        let store = store(&fs, false);

        let empty = store.snapshot(&set, None);
        assert!(!empty[Path::new("/app/late.xml")].exists);

        fs.add_file("/app/late.xml", "x");
        let present = store.snapshot(&set, Some(&empty));
        assert_eq!(
            diff(&empty, &present),
            vec![Change::new("/app/late.xml", ChangeKind::Added)]
        );

        fs.remove("/app/late.xml");
        let gone = store.snapshot(&set, Some(&present));
        assert_eq!(
            diff(&present, &gone),
            vec![Change::new("/app/late.xml", ChangeKind::Removed)]
        );
    }
}
