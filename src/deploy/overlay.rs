// src/deploy/overlay.rs

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, trace};

use crate::errors::{HotdeployError, Result};
use crate::fs::FileSystem;

/// Makes the content of a `war` overlay available as a directory.
pub trait OverlayMaterializer: Send + Sync + fmt::Debug {
    /// Materialize `source` into `target_dir` and return the directory to
    /// use as a base resource.
    fn unpack(&self, source: &Path, target_dir: &Path) -> Result<PathBuf>;
}

/// Mirrors an exploded overlay directory into the work directory.
///
/// Only files whose copy is missing or older than the source are written, so
/// repeated reconfigurations of an unchanged overlay do no I/O beyond stats.
/// Packed archives are not supported and fail with `UnpackError`.
#[derive(Debug, Clone)]
pub struct DirectoryOverlayMaterializer {
    fs: Arc<dyn FileSystem>,
}

impl DirectoryOverlayMaterializer {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    fn mirror(&self, source: &Path, target: &Path, copied: &mut usize) -> Result<()> {
        self.fs.create_dir_all(target)?;
        for entry in self.fs.read_dir(source)? {
            let Some(name) = entry.file_name() else {
                continue;
            };
            let dest = target.join(name);
            let meta = self.fs.metadata(&entry)?;
            if meta.is_dir {
                self.mirror(&entry, &dest, copied)?;
                continue;
            }

            let up_to_date = match self.fs.metadata(&dest) {
                Ok(existing) => existing.modified >= meta.modified && existing.len == meta.len,
                Err(_) => false,
            };
            if up_to_date {
                trace!(file = ?dest, "overlay file up to date");
                continue;
            }

            let mut contents = Vec::new();
            self.fs
                .open_read(&entry)?
                .read_to_end(&mut contents)
                .with_context(|| format!("reading overlay file {:?}", entry))?;
            self.fs.write(&dest, &contents)?;
            *copied += 1;
        }
        Ok(())
    }
}

impl OverlayMaterializer for DirectoryOverlayMaterializer {
    fn unpack(&self, source: &Path, target_dir: &Path) -> Result<PathBuf> {
        if !self.fs.exists(source) {
            return Err(HotdeployError::UnpackError(format!(
                "overlay {:?} does not exist",
                source
            )));
        }
        if !self.fs.is_dir(source) {
            return Err(HotdeployError::UnpackError(format!(
                "overlay {:?} is a packed archive; only exploded overlays are supported",
                source
            )));
        }

        let mut copied = 0;
        self.mirror(source, target_dir, &mut copied)?;
        debug!(source = ?source, target = ?target_dir, copied, "overlay materialized");
        Ok(target_dir.to_path_buf())
    }
}
