// src/deploy/provision.rs

//! Provisioning: current build metadata in, ready-to-start context and
//! watch set out.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::deploy::configure::{AppConfigurator, AppSettings};
use crate::deploy::context::{ContainerContext, ContextFactory};
use crate::deploy::metadata::BuildMetadata;
use crate::errors::{HotdeployError, Result};
use crate::fs::FileSystem;
use crate::types::AppId;
use crate::watch::{ClassDir, PathFilter, ScanPattern, WatchInputs, WatchSet, WatchSetBuilder};

/// Result of provisioning one application.
#[derive(Debug)]
pub struct Provisioned {
    pub settings: AppSettings,
    pub context: Box<dyn ContainerContext>,
    pub watch_set: WatchSet,
}

/// Derives a fresh context and watch set for an application.
///
/// Called from a blocking thread, so implementations may do synchronous
/// filesystem work.
pub trait Provisioner: Send + Sync + fmt::Debug {
    fn provision(&self, app: &AppId) -> Result<Provisioned>;
}

/// User-level scan settings added to every application's watch set.
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    pub extra_targets: Vec<PathBuf>,
    pub patterns: Vec<ScanPattern>,
    pub classes_filter: Option<PathFilter>,
    pub max_depth: usize,
}

impl WatchOptions {
    /// Watch inputs for one application's settings.
    pub fn inputs_for(&self, settings: &AppSettings) -> WatchInputs {
        let mut extra_targets: Vec<PathBuf> = settings.build_file.iter().cloned().collect();
        extra_targets.extend(self.extra_targets.iter().cloned());

        WatchInputs {
            descriptors: settings.descriptor.iter().cloned().collect(),
            env_descriptors: settings.env_descriptors.clone(),
            container_config_dir: Some(settings.web_inf()),
            extra_targets,
            patterns: self.patterns.clone(),
            class_dirs: settings
                .classes_dir
                .iter()
                .map(|path| ClassDir {
                    path: path.clone(),
                    filter: self.classes_filter.clone(),
                })
                .collect(),
            libraries: settings.classpath.clone(),
        }
    }
}

/// Provisioner that works from the build manifest.
#[derive(Debug, Clone)]
pub struct BuildProvisioner {
    metadata: Arc<dyn BuildMetadata>,
    configurator: AppConfigurator,
    factory: Arc<dyn ContextFactory>,
    fs: Arc<dyn FileSystem>,
    watch: WatchOptions,
}

impl BuildProvisioner {
    pub fn new(
        metadata: Arc<dyn BuildMetadata>,
        configurator: AppConfigurator,
        factory: Arc<dyn ContextFactory>,
        fs: Arc<dyn FileSystem>,
        watch: WatchOptions,
    ) -> Self {
        Self {
            metadata,
            configurator,
            factory,
            fs,
            watch,
        }
    }

    /// Settings and watch set without creating a context (dry runs).
    pub fn describe(&self, app: &AppId) -> Result<(AppSettings, WatchSet)> {
        let settings = self.settings(app)?;
        let watch_set = self.watch_set(&settings)?;
        Ok((settings, watch_set))
    }

    fn settings(&self, app: &AppId) -> Result<AppSettings> {
        let projects = self.metadata.projects()?;
        let project = projects
            .iter()
            .find(|p| &p.id() == app)
            .ok_or_else(|| HotdeployError::AppNotFound(app.to_string()))?;
        self.configurator.configure(project, &projects)
    }

    fn watch_set(&self, settings: &AppSettings) -> Result<WatchSet> {
        let builder = WatchSetBuilder::new(Arc::clone(&self.fs), self.watch.max_depth);
        Ok(builder.build(&self.watch.inputs_for(settings))?)
    }
}

impl Provisioner for BuildProvisioner {
    fn provision(&self, app: &AppId) -> Result<Provisioned> {
        let settings = self.settings(app)?;
        let context = self.factory.create(&settings)?;
        let watch_set = self.watch_set(&settings)?;

        debug!(
            app = %app,
            context = %settings.context_path,
            targets = watch_set.len(),
            "provisioned application"
        );
        Ok(Provisioned {
            settings,
            context,
            watch_set,
        })
    }
}
