// src/watch/builder.rs

//! Assemble the watch set of one application from its settings.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::fs::FileSystem;
use crate::watch::path_utils::resolve_path;
use crate::watch::patterns::{PathFilter, ScanPattern};
use crate::watch::target::{WatchSet, WatchTarget};

/// Container-specific configuration files, in lookup order. The first one
/// present in the config directory is watched; the rest are ignored.
pub const CONTAINER_CONFIG_NAMES: [&str; 3] = ["jetty8-web.xml", "jetty-web.xml", "web-jetty.xml"];

/// A class output directory plus the optional classes filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDir {
    pub path: PathBuf,
    pub filter: Option<PathFilter>,
}

/// Everything a watch set is derived from.
#[derive(Debug, Clone, Default)]
pub struct WatchInputs {
    /// Deployment descriptor(s) of the application.
    pub descriptors: Vec<PathBuf>,
    /// Environment, defaults and override descriptors.
    pub env_descriptors: Vec<PathBuf>,
    /// Directory searched for [`CONTAINER_CONFIG_NAMES`], usually `WEB-INF`.
    pub container_config_dir: Option<PathBuf>,
    /// User-declared extra targets, including the project build file.
    pub extra_targets: Vec<PathBuf>,
    pub patterns: Vec<ScanPattern>,
    pub class_dirs: Vec<ClassDir>,
    /// Library jars and dependency class directories.
    pub libraries: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct WatchSetBuilder {
    fs: Arc<dyn FileSystem>,
    max_depth: usize,
}

impl WatchSetBuilder {
    pub fn new(fs: Arc<dyn FileSystem>, max_depth: usize) -> Self {
        Self { fs, max_depth }
    }

    /// Build the ordered, deduplicated watch set.
    ///
    /// Category order is fixed: descriptors, env descriptors, the container
    /// config file, extra targets, pattern directories, class directories,
    /// libraries. When a path shows up twice the first occurrence wins.
    /// Inputs that do not exist are skipped.
    pub fn build(&self, inputs: &WatchInputs) -> Result<WatchSet> {
        let mut set = WatchSet::new();

        for path in &inputs.descriptors {
            self.add(&mut set, path, None);
        }
        for path in &inputs.env_descriptors {
            self.add(&mut set, path, None);
        }
        if let Some(dir) = &inputs.container_config_dir {
            if let Some(found) = self.container_config(dir) {
                self.add(&mut set, &found, None);
            }
        }
        for path in &inputs.extra_targets {
            self.add(&mut set, path, None);
        }
        for pattern in &inputs.patterns {
            let filter = PathFilter::from_pattern(pattern)?;
            self.add(&mut set, &pattern.directory, Some(filter));
        }
        for class_dir in &inputs.class_dirs {
            self.add(&mut set, &class_dir.path, class_dir.filter.clone());
        }
        for path in &inputs.libraries {
            self.add(&mut set, path, None);
        }

        debug!(targets = set.len(), "built watch set");
        Ok(set)
    }

    fn container_config(&self, dir: &Path) -> Option<PathBuf> {
        CONTAINER_CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| self.fs.is_file(candidate))
    }

    fn add(&self, set: &mut WatchSet, path: &Path, filter: Option<PathFilter>) {
        let meta = match self.fs.metadata(path) {
            Ok(meta) => meta,
            Err(err) => {
                debug!(path = ?path, error = %err, "skipping watch input");
                return;
            }
        };

        let resolved = resolve_path(self.fs.as_ref(), path);
        let target = if meta.is_dir {
            WatchTarget::directory(resolved, filter, self.max_depth)
        } else {
            WatchTarget::file(resolved)
        };

        if !set.push(target) {
            debug!(path = ?path, "dropping duplicate watch input");
        }
    }
}
