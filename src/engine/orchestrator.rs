// src/engine/orchestrator.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::deploy::provision::{Provisioned, Provisioner};
use crate::engine::queue::RedeployQueue;
use crate::engine::redeploy::{bounded, provision_bounded, redeploy, RedeployOptions};
use crate::engine::registry::{AppKind, AppRecord, AppStatus, ApplicationRegistry};
use crate::engine::{OrchestratorEvent, RedeployOutcome, RedeployStep, RedeployTrigger};
use crate::errors::{HotdeployError, Result};
use crate::fs::FileSystem;
use crate::types::AppId;
use crate::watch::{spawn_scanner, ScannerConfig};

/// Capacity of the orchestrator event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorSettings {
    pub scanner: ScannerConfig,
    /// Attach a scanner to each launched application (automatic reload).
    pub scanning: bool,
    pub redeploy: RedeployOptions,
}

/// Consumes [`OrchestratorEvent`]s and runs one redeploy task per
/// application.
///
/// The loop itself never waits on redeploy work: each redeploy runs in its
/// own tokio task and reports back with `RedeployFinished`.
pub struct Orchestrator {
    registry: Arc<ApplicationRegistry>,
    provisioner: Arc<dyn Provisioner>,
    fs: Arc<dyn FileSystem>,
    settings: OrchestratorSettings,
    queue: RedeployQueue,
    events_tx: mpsc::Sender<OrchestratorEvent>,
    events_rx: mpsc::Receiver<OrchestratorEvent>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.settings)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ApplicationRegistry>,
        provisioner: Arc<dyn Provisioner>,
        fs: Arc<dyn FileSystem>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry,
            provisioner,
            fs,
            settings,
            queue: RedeployQueue::new(),
            events_tx,
            events_rx,
        }
    }

    /// Sender for scanners, the console and signal handlers.
    pub fn sender(&self) -> mpsc::Sender<OrchestratorEvent> {
        self.events_tx.clone()
    }

    pub fn registry(&self) -> &Arc<ApplicationRegistry> {
        &self.registry
    }

    /// Provision, start and register one application, then attach its
    /// scanner.
    ///
    /// A start failure still registers the application (as `Failed`, with
    /// its scanner) so a later change can bring it up; the error is returned
    /// so single-application hosts can treat it as fatal.
    pub async fn launch(&self, app: &AppId) -> Result<()> {
        let limit = self.settings.redeploy.step_timeout;
        let Provisioned {
            settings,
            mut context,
            watch_set,
        } = provision_bounded(Arc::clone(&self.provisioner), app, limit)
            .await
            .map_err(|reason| {
                HotdeployError::ConfigError(format!("provisioning {app} failed: {reason}"))
            })?;

        let started = bounded(limit, context.start()).await;

        let mut record = AppRecord::new(app.clone(), settings.context_path.clone(), AppKind::Project);
        record.watch_set = watch_set.clone();
        if self.settings.scanning {
            record.scanner = Some(spawn_scanner(
                app.clone(),
                watch_set,
                self.settings.scanner,
                Arc::clone(&self.fs),
                self.sender(),
            ));
        }

        let failure = match started {
            Ok(()) => {
                record.context = Some(context);
                record.status = AppStatus::Running;
                None
            }
            Err(reason) => {
                if let Err(e) = bounded(limit, context.stop()).await {
                    debug!(app = %app, error = %e, "cleanup of failed context failed");
                }
                error!(
                    app = %app,
                    context = %settings.context_path,
                    step = %RedeployStep::StartContext,
                    reason = %reason,
                    "initial start failed"
                );
                record.status = AppStatus::Failed {
                    step: RedeployStep::StartContext,
                    reason: reason.clone(),
                };
                Some(reason)
            }
        };

        self.registry.register(record).await?;
        match failure {
            None => {
                info!(app = %app, context = %settings.context_path, "application started");
                Ok(())
            }
            Some(reason) => Err(HotdeployError::Other(anyhow::anyhow!(
                "starting {app} at {} failed: {reason}",
                settings.context_path
            ))),
        }
    }

    /// Main event loop. Returns after a shutdown request, with every
    /// application stopped and unregistered.
    pub async fn run(mut self) -> Result<()> {
        let apps = self.registry.len().await;
        info!(apps, "orchestrator started");

        while let Some(event) = self.events_rx.recv().await {
            debug!(?event, "orchestrator received event");
            match event {
                OrchestratorEvent::ChangesDetected { app, batch } => {
                    if batch.app() != &app {
                        warn!(app = %app, batch_app = %batch.app(), "batch for a different app; ignoring");
                        continue;
                    }
                    self.dispatch(app, RedeployTrigger::Changes(batch)).await;
                }
                OrchestratorEvent::RedeployRequested { app: Some(app) } => {
                    self.dispatch(app, RedeployTrigger::Manual).await;
                }
                OrchestratorEvent::RedeployRequested { app: None } => {
                    for app in self.registry.project_ids().await {
                        self.dispatch(app, RedeployTrigger::Manual).await;
                    }
                }
                OrchestratorEvent::RedeployFinished { app, outcome } => {
                    match &outcome {
                        RedeployOutcome::Redeployed { generation } => {
                            debug!(app = %app, generation, "redeploy finished");
                        }
                        RedeployOutcome::Failed { step, .. } => {
                            debug!(app = %app, step = %step, "redeploy finished with failure");
                        }
                        RedeployOutcome::Unknown => {}
                    }
                    if let Some(next) = self.queue.finish(&app) {
                        self.spawn_redeploy(app, next);
                    }
                }
                OrchestratorEvent::ShutdownRequested => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        shutdown_all(&self.registry, self.settings.redeploy).await;
        info!("orchestrator exiting");
        Ok(())
    }

    async fn dispatch(&mut self, app: AppId, trigger: RedeployTrigger) {
        if self.registry.get(&app).await.is_none() {
            warn!(app = %app, "redeploy requested for unknown application");
            return;
        }
        if let Some(trigger) = self.queue.request(&app, trigger) {
            self.spawn_redeploy(app, trigger);
        }
    }

    fn spawn_redeploy(&self, app: AppId, trigger: RedeployTrigger) {
        let registry = Arc::clone(&self.registry);
        let provisioner = Arc::clone(&self.provisioner);
        let options = self.settings.redeploy;
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let outcome = redeploy(&registry, provisioner, &app, trigger, options).await;
            if tx
                .send(OrchestratorEvent::RedeployFinished { app, outcome })
                .await
                .is_err()
            {
                debug!("orchestrator gone before redeploy finished");
            }
        });
    }
}

/// Stop everything: all scanners first, then all contexts, then drop the
/// records.
pub async fn shutdown_all(registry: &ApplicationRegistry, options: RedeployOptions) {
    let apps = registry.app_ids().await;

    for app in &apps {
        if let Some(record) = registry.get(app).await {
            if let Some(scanner) = record.lock().await.scanner.as_mut() {
                scanner.shutdown().await;
            }
        }
    }

    for app in &apps {
        let Some(record) = registry.get(app).await else {
            continue;
        };
        let mut record = record.lock().await;
        if let Some(mut context) = record.context.take() {
            match bounded(options.step_timeout, context.stop()).await {
                Ok(()) => info!(app = %app, context = %record.context_path, "context stopped"),
                Err(reason) => warn!(
                    app = %app,
                    context = %record.context_path,
                    reason = %reason,
                    "context did not stop cleanly"
                ),
            }
        }
        record.status = AppStatus::Stopped;
    }

    for app in &apps {
        registry.unregister(app).await;
    }
}
