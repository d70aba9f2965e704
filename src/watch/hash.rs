use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;

use crate::fs::FileSystem;

/// Compute the blake3 hex digest of a single file's content.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading file for hashing: {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn hash_tracks_content_only() {
        let fs = MockFileSystem::new();
        fs.add_file("/app/a.txt", b"hello world");
        let first = compute_file_hash(&fs, Path::new("/app/a.txt")).unwrap();
        // blake3 hash of "hello world"
        assert_eq!(first, "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24");

        fs.touch("/app/a.txt");
        assert_eq!(compute_file_hash(&fs, Path::new("/app/a.txt")).unwrap(), first);

        fs.add_file("/app/a.txt", b"hello World");
        assert_ne!(compute_file_hash(&fs, Path::new("/app/a.txt")).unwrap(), first);
    }
}
