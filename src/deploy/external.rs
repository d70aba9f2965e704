// src/deploy/external.rs

//! Extra contexts deployed straight from resolved artifacts.
//!
//! They get no scanner and are never redeployed. A failure affects only the
//! context concerned.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::deploy::configure::{normalize_context_path, AppSettings};
use crate::deploy::context::ContextFactory;
use crate::deploy::metadata::Coordinate;
use crate::deploy::overlay::OverlayMaterializer;
use crate::deploy::resolver::ArtifactResolver;
use crate::engine::redeploy::bounded;
use crate::engine::registry::{AppKind, AppRecord, AppStatus, ApplicationRegistry};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::AppId;

/// One `[[external]]` entry:
///
/// ```toml
/// [[external]]
/// context_path = "/docs"
/// group_id = "org.acme"
/// artifact_id = "docs"
/// version = "2.0"
/// type = "war"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalSpec {
    pub context_path: String,
    #[serde(flatten)]
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone)]
pub struct ExternalDeployer {
    resolver: Arc<dyn ArtifactResolver>,
    overlays: Arc<dyn OverlayMaterializer>,
    factory: Arc<dyn ContextFactory>,
    fs: Arc<dyn FileSystem>,
    work_dir: PathBuf,
    step_timeout: Option<Duration>,
}

impl ExternalDeployer {
    pub fn new(
        resolver: Arc<dyn ArtifactResolver>,
        overlays: Arc<dyn OverlayMaterializer>,
        factory: Arc<dyn ContextFactory>,
        fs: Arc<dyn FileSystem>,
        work_dir: impl Into<PathBuf>,
        step_timeout: Option<Duration>,
    ) -> Self {
        Self {
            resolver,
            overlays,
            factory,
            fs,
            work_dir: work_dir.into(),
            step_timeout,
        }
    }

    /// Deploy every external context whose path is still free. Returns the
    /// ids that were started.
    pub async fn deploy_all(&self, registry: &ApplicationRegistry, specs: &[ExternalSpec]) -> Vec<AppId> {
        let mut started = Vec::new();
        for spec in specs {
            let context_path = normalize_context_path(&spec.context_path);
            if registry.context_path_in_use(&context_path).await {
                info!(
                    context = %context_path,
                    artifact = %spec.coordinate,
                    "context path already served by a project; skipping external artifact"
                );
                continue;
            }

            match self.deploy_one(registry, spec, &context_path).await {
                Ok(app) => started.push(app),
                Err(err) => error!(
                    context = %context_path,
                    artifact = %spec.coordinate,
                    error = %err,
                    "external context failed to deploy"
                ),
            }
        }
        started
    }

    async fn deploy_one(
        &self,
        registry: &ApplicationRegistry,
        spec: &ExternalSpec,
        context_path: &str,
    ) -> Result<AppId> {
        let artifact = self.resolver.resolve(&spec.coordinate)?;
        let web_dir = self.overlays.unpack(
            &artifact,
            &self.work_dir.join("external").join(&spec.coordinate.artifact_id),
        )?;

        let descriptor = web_dir.join("WEB-INF").join("web.xml");
        let classes = web_dir.join("WEB-INF").join("classes");
        let app = AppId::external(context_path);
        let settings = AppSettings {
            app_id: app.clone(),
            context_path: context_path.to_string(),
            web_dir: web_dir.clone(),
            descriptor: self.fs.is_file(&descriptor).then_some(descriptor),
            env_descriptors: Vec::new(),
            classes_dir: self.fs.is_dir(&classes).then_some(classes),
            classpath: Vec::new(),
            base_resources: vec![web_dir],
            build_file: None,
        };

        let mut context = self.factory.create(&settings)?;
        bounded(self.step_timeout, context.start())
            .await
            .map_err(|reason| anyhow::anyhow!("starting context failed: {reason}"))?;

        let mut record = AppRecord::new(app.clone(), context_path, AppKind::External);
        record.context = Some(context);
        record.status = AppStatus::Running;
        registry.register(record).await?;

        info!(context = %context_path, artifact = %spec.coordinate, "external context started");
        Ok(app)
    }
}
