// src/deploy/resolver.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::deploy::metadata::Coordinate;
use crate::errors::{HotdeployError, Result};
use crate::fs::FileSystem;

/// Turns an artifact coordinate into a local file.
pub trait ArtifactResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, coordinate: &Coordinate) -> Result<PathBuf>;
}

/// Looks artifacts up in repository-layout directories:
/// `<root>/<group as path>/<artifact>/<version>/<artifact>-<version>.<type>`.
#[derive(Debug, Clone)]
pub struct LocalRepositoryResolver {
    roots: Vec<PathBuf>,
    fs: Arc<dyn FileSystem>,
}

impl LocalRepositoryResolver {
    pub fn new(roots: Vec<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self { roots, fs }
    }

    pub fn layout_path(coordinate: &Coordinate) -> PathBuf {
        let mut path: PathBuf = coordinate.group_id.split('.').collect();
        path.push(&coordinate.artifact_id);
        path.push(&coordinate.version);
        path.push(format!(
            "{}-{}.{}",
            coordinate.artifact_id, coordinate.version, coordinate.kind
        ));
        path
    }
}

impl ArtifactResolver for LocalRepositoryResolver {
    fn resolve(&self, coordinate: &Coordinate) -> Result<PathBuf> {
        let relative = Self::layout_path(coordinate);
        for root in &self.roots {
            let candidate = root.join(&relative);
            if self.fs.exists(&candidate) {
                debug!(%coordinate, path = ?candidate, "resolved artifact");
                return Ok(candidate);
            }
        }

        let searched = self
            .roots
            .iter()
            .map(|r| r.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(HotdeployError::ResolutionError {
            coordinate: coordinate.to_string(),
            searched,
        })
    }
}
