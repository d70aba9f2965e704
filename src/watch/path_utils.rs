// src/watch/path_utils.rs

//! Utility functions for path handling in the scanner.

use std::path::{Path, PathBuf};

use crate::fs::FileSystem;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if `path` does not live under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Resolve a path to the form used as a watch-set key.
///
/// - Canonicalize through the filesystem when the path exists, so the same
///   file reached through different spellings (symlinks, `..`) dedups.
/// - Otherwise make it absolute against the current directory.
pub fn resolve_path(fs: &dyn FileSystem, path: &Path) -> PathBuf {
    if let Ok(canon) = fs.canonicalize(path) {
        return canon;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_str_uses_forward_slashes() {
        let rel = relative_str(Path::new("/app/classes"), Path::new("/app/classes/com/A.class"));
        assert_eq!(rel.as_deref(), Some("com/A.class"));
    }

    #[test]
    fn relative_str_outside_root_is_none() {
        assert!(relative_str(Path::new("/app/classes"), Path::new("/other/A.class")).is_none());
    }
}
