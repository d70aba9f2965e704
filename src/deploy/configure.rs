// src/deploy/configure.rs

//! Derive the settings of one web application from its build project.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::deploy::metadata::{Dependency, Project};
use crate::deploy::overlay::OverlayMaterializer;
use crate::errors::{HotdeployError, Result};
use crate::fs::FileSystem;
use crate::types::AppId;

/// Everything a container context and a watch set are built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    pub app_id: AppId,
    pub context_path: String,
    pub web_dir: PathBuf,
    pub descriptor: Option<PathBuf>,
    /// Override descriptors applied on top of the main one.
    pub env_descriptors: Vec<PathBuf>,
    pub classes_dir: Option<PathBuf>,
    /// Library jars and class directories of dependencies.
    pub classpath: Vec<PathBuf>,
    /// Web source dir first, then overlays in declaration order.
    pub base_resources: Vec<PathBuf>,
    pub build_file: Option<PathBuf>,
}

impl AppSettings {
    /// Own classes first, then dependencies.
    pub fn full_classpath(&self) -> Vec<PathBuf> {
        self.classes_dir
            .iter()
            .chain(self.classpath.iter())
            .cloned()
            .collect()
    }

    /// `WEB-INF` under the web source dir, where container config lives.
    pub fn web_inf(&self) -> PathBuf {
        self.web_dir.join("WEB-INF")
    }
}

/// Normalize a declared context path to start with exactly one `/`.
pub fn normalize_context_path(path: &str) -> String {
    format!("/{}", path.trim().trim_start_matches('/'))
}

#[derive(Debug, Clone)]
pub struct AppConfigurator {
    fs: Arc<dyn FileSystem>,
    overlays: Arc<dyn OverlayMaterializer>,
    work_dir: PathBuf,
}

impl AppConfigurator {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        overlays: Arc<dyn OverlayMaterializer>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fs,
            overlays,
            work_dir: work_dir.into(),
        }
    }

    /// Build the settings of `project`. `all` is the whole build, used to
    /// swap jar dependencies on sibling projects for their class output.
    pub fn configure(&self, project: &Project, all: &[Project]) -> Result<AppSettings> {
        let context_path = match &project.context_path {
            Some(declared) => normalize_context_path(declared),
            None => format!("/{}", project.artifact_id()),
        };

        let web_dir = self.web_dir(project)?;
        let classes_dir = project.output_dir.clone().or_else(|| {
            let default = project.base_dir.join("target").join("classes");
            self.fs.is_dir(&default).then_some(default)
        });
        let descriptor = self.descriptor(project, &web_dir)?;

        let mut settings = AppSettings {
            app_id: project.id(),
            context_path,
            web_dir: web_dir.clone(),
            descriptor,
            env_descriptors: project.override_descriptors.clone(),
            classes_dir,
            classpath: Vec::new(),
            base_resources: vec![web_dir],
            build_file: Some(project.build_file.clone()),
        };

        for dep in &project.dependencies {
            if !dep.scope.is_deployed() {
                continue;
            }
            if dep.coordinate.is_war() {
                self.add_overlay(&mut settings, dep)?;
            } else {
                self.add_library(&mut settings, dep, all);
            }
        }

        debug!(
            app = %settings.app_id,
            context = %settings.context_path,
            classpath = settings.classpath.len(),
            resources = settings.base_resources.len(),
            "configured application"
        );
        Ok(settings)
    }

    fn web_dir(&self, project: &Project) -> Result<PathBuf> {
        if let Some(declared) = &project.webapp_dir {
            return Ok(declared.clone());
        }
        let source = project.base_dir.join("src").join("main").join("webapp");
        if self.fs.is_dir(&source) {
            return Ok(source);
        }

        // No web sources at all: serve from an empty generated dir.
        let generated = project.base_dir.join("target").join("webapp");
        self.fs.create_dir_all(&generated.join("WEB-INF"))?;
        Ok(generated)
    }

    fn descriptor(&self, project: &Project, web_dir: &Path) -> Result<Option<PathBuf>> {
        if let Some(declared) = &project.descriptor {
            if !self.fs.is_file(declared) {
                return Err(HotdeployError::ConfigError(format!(
                    "descriptor {:?} of '{}' does not exist",
                    declared,
                    project.id()
                )));
            }
            return Ok(Some(declared.clone()));
        }
        let default = web_dir.join("WEB-INF").join("web.xml");
        Ok(self.fs.is_file(&default).then_some(default))
    }

    fn add_overlay(&self, settings: &mut AppSettings, dep: &Dependency) -> Result<()> {
        let Some(file) = &dep.file else {
            warn!(
                app = %settings.app_id,
                overlay = %dep.coordinate,
                "overlay has no file; skipping"
            );
            return Ok(());
        };
        let target = self
            .work_dir
            .join("overlays")
            .join(&dep.coordinate.artifact_id);
        let unpacked = self.overlays.unpack(file, &target)?;
        settings.base_resources.push(unpacked);
        Ok(())
    }

    fn add_library(&self, settings: &mut AppSettings, dep: &Dependency, all: &[Project]) {
        let sibling_output = all
            .iter()
            .find(|p| p.id() == dep.coordinate.app_id() && !p.is_war())
            .and_then(|p| p.output_dir.clone())
            .filter(|dir| self.fs.is_dir(dir));
        if let Some(dir) = sibling_output {
            debug!(
                app = %settings.app_id,
                dependency = %dep.coordinate,
                classes = ?dir,
                "using sibling project output instead of jar"
            );
            settings.classpath.push(dir);
            return;
        }

        match &dep.file {
            Some(file) if self.fs.exists(file) => settings.classpath.push(file.clone()),
            _ => warn!(
                app = %settings.app_id,
                dependency = %dep.coordinate,
                "dependency file missing; skipping"
            ),
        }
    }
}
