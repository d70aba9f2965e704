use std::sync::Arc;
use std::time::Duration;

use hotdeploy::deploy::AppSettings;
use hotdeploy::engine::{
    AppStatus, ApplicationRegistry, Orchestrator, OrchestratorEvent, OrchestratorSettings,
    RedeployOptions,
};
use hotdeploy::errors::Result;
use hotdeploy::fs::mock::MockFileSystem;
use hotdeploy::types::AppId;
use hotdeploy::watch::{ScannerConfig, WatchSet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::fake_context::RecordingContextFactory;
use crate::fake_provisioner::FakeProvisioner;
use crate::{eventually, with_timeout};

/// Settings that make scanners tick every 10 ms.
pub fn fast_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        scanner: ScannerConfig {
            interval: Duration::from_millis(10),
            settle_cycles: 1,
            report_existing: false,
            use_hash: false,
        },
        scanning: true,
        redeploy: RedeployOptions {
            step_timeout: Some(Duration::from_secs(2)),
        },
    }
}

/// A running orchestrator over a mock filesystem and recording contexts.
pub struct Harness {
    pub fs: MockFileSystem,
    pub factory: Arc<RecordingContextFactory>,
    pub provisioner: Arc<FakeProvisioner>,
    pub registry: Arc<ApplicationRegistry>,
    pub events: mpsc::Sender<OrchestratorEvent>,
    run: Option<JoinHandle<Result<()>>>,
}

impl Harness {
    /// Launch every app in order, then start the event loop. Launch results
    /// are returned in the same order.
    pub async fn start(
        fs: MockFileSystem,
        apps: Vec<AppSettings>,
        settings: OrchestratorSettings,
    ) -> (Self, Vec<Result<()>>) {
        let factory = Arc::new(RecordingContextFactory::new());
        Self::start_with_factory(fs, apps, settings, factory).await
    }

    pub async fn start_with_factory(
        fs: MockFileSystem,
        apps: Vec<AppSettings>,
        settings: OrchestratorSettings,
        factory: Arc<RecordingContextFactory>,
    ) -> (Self, Vec<Result<()>>) {
        let ids: Vec<AppId> = apps.iter().map(|s| s.app_id.clone()).collect();
        let mut provisioner = FakeProvisioner::new(Arc::new(fs.clone()), Arc::clone(&factory));
        for app in apps {
            provisioner = provisioner.with_app(app);
        }
        let provisioner = Arc::new(provisioner);
        let registry = Arc::new(ApplicationRegistry::new());

        let orchestrator = Orchestrator::new(
            Arc::clone(&registry),
            provisioner.clone(),
            Arc::new(fs.clone()),
            settings,
        );
        let mut results = Vec::new();
        for app in &ids {
            results.push(orchestrator.launch(app).await);
        }
        let events = orchestrator.sender();
        let run = tokio::spawn(orchestrator.run());

        (
            Self {
                fs,
                factory,
                provisioner,
                registry,
                events,
                run: Some(run),
            },
            results,
        )
    }

    pub async fn generation(&self, app: &str) -> u64 {
        self.registry
            .generation(&AppId::from(app))
            .await
            .expect("app is registered")
    }

    pub async fn status(&self, app: &str) -> AppStatus {
        self.registry
            .status(&AppId::from(app))
            .await
            .expect("app is registered")
    }

    pub async fn wait_for_generation(&self, app: &str, generation: u64) {
        eventually(|| async move { self.generation(app).await >= generation }).await
    }

    pub async fn wait_for_status(&self, app: &str, pred: impl Fn(&AppStatus) -> bool) {
        let pred = &pred;
        eventually(|| async move { pred(&self.status(app).await) }).await
    }

    /// Wait until the app's scanner has taken its baseline.
    pub async fn wait_for_baseline(&self, app: &str) {
        eventually(|| async move { self.scanner_cycles(app).await >= 1 }).await
    }

    pub async fn scanner_cycles(&self, app: &str) -> u64 {
        let record = self
            .registry
            .get(&AppId::from(app))
            .await
            .expect("app is registered");
        let record = record.lock().await;
        match record.scanner.as_ref() {
            Some(scanner) => scanner.cycles().await,
            None => 0,
        }
    }

    pub async fn scanner_watch_set(&self, app: &str) -> Option<WatchSet> {
        let record = self.registry.get(&AppId::from(app)).await?;
        let record = record.lock().await;
        match record.scanner.as_ref() {
            Some(scanner) => Some(scanner.watch_set().await),
            None => None,
        }
    }

    /// Run `edit` with the app's scanner paused, so every edit lands in the
    /// same scan cycle.
    pub async fn edit_paused(&self, app: &str, edit: impl FnOnce(&MockFileSystem)) {
        let record = self
            .registry
            .get(&AppId::from(app))
            .await
            .expect("app is registered");
        let record = record.lock().await;
        let scanner = record.scanner.as_ref().expect("app has a scanner");
        scanner.stop().await;
        edit(&self.fs);
        scanner.start().await;
    }

    pub async fn send(&self, event: OrchestratorEvent) {
        self.events.send(event).await.expect("orchestrator is running");
    }

    /// Request shutdown and wait for the event loop to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.events.send(OrchestratorEvent::ShutdownRequested).await;
        match self.run.take() {
            Some(run) => with_timeout(run).await.expect("orchestrator task panicked"),
            None => Ok(()),
        }
    }
}
