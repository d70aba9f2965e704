// src/lib.rs

pub mod cli;
pub mod config;
pub mod deploy;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::load_with_overrides;
use crate::config::model::ConfigFile;
use crate::deploy::{
    select_apps, AppConfigurator, BuildMetadata, BuildProvisioner, ContextFactory,
    DirectoryOverlayMaterializer, ExternalDeployer, LocalRepositoryResolver, OverlayMaterializer,
    ProcessContextFactory, TomlBuildMetadata, WatchOptions,
};
use crate::engine::console::spawn_console;
use crate::engine::orchestrator::shutdown_all;
use crate::engine::{Orchestrator, OrchestratorEvent, OrchestratorSettings, RedeployOptions};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::{AppId, ReloadMode};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and application selection
/// - provisioning from the build manifest
/// - the orchestrator with one scanner per application
/// - external artifact contexts
/// - the manual reload console
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_with_overrides(&config_path, &args.overrides())?;

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let metadata: Arc<dyn BuildMetadata> = Arc::new(TomlBuildMetadata::new(
        cfg.deploy.manifest.clone(),
        Arc::clone(&fs),
    ));
    let projects = metadata.projects()?;
    let apps = select_apps(&cfg.deploy.strategy, &projects)?;
    info!(
        apps = ?apps.iter().map(AppId::as_str).collect::<Vec<_>>(),
        strategy = ?cfg.deploy.strategy,
        "selected applications"
    );

    let overlays: Arc<dyn OverlayMaterializer> =
        Arc::new(DirectoryOverlayMaterializer::new(Arc::clone(&fs)));
    let factory: Arc<dyn ContextFactory> = Arc::new(ProcessContextFactory::new(
        cfg.deploy.launch.clone(),
        cfg.deploy.ready_on_stdout.clone(),
    ));
    let provisioner = Arc::new(BuildProvisioner::new(
        metadata,
        AppConfigurator::new(
            Arc::clone(&fs),
            Arc::clone(&overlays),
            cfg.deploy.work_dir.clone(),
        ),
        Arc::clone(&factory),
        Arc::clone(&fs),
        WatchOptions {
            extra_targets: cfg.scan.targets.clone(),
            patterns: cfg.scan.patterns.clone(),
            classes_filter: cfg.classes_filter.clone(),
            max_depth: cfg.scan.max_depth,
        },
    ));

    if args.dry_run {
        print_dry_run(&cfg, &provisioner, &apps);
        return Ok(());
    }

    let settings = OrchestratorSettings {
        scanner: cfg.scan.scanner_config(),
        scanning: cfg.scan.reload == ReloadMode::Automatic,
        redeploy: RedeployOptions {
            step_timeout: cfg.deploy.step_timeout,
        },
    };
    if settings.scanning && !settings.scanner.is_enabled() {
        info!("scan interval is zero; changes will not be detected");
    }

    let orchestrator = Orchestrator::new(
        Arc::new(engine::ApplicationRegistry::new()),
        provisioner,
        Arc::clone(&fs),
        settings,
    );

    for app in &apps {
        if let Err(err) = orchestrator.launch(app).await {
            if cfg.deploy.strategy.is_aggregated() {
                error!(app = %app, error = %err, "application failed to start; continuing");
            } else {
                shutdown_all(orchestrator.registry(), settings.redeploy).await;
                return Err(err.into());
            }
        }
    }

    if !cfg.external.is_empty() {
        let deployer = ExternalDeployer::new(
            Arc::new(LocalRepositoryResolver::new(
                cfg.deploy.repositories.clone(),
                Arc::clone(&fs),
            )),
            overlays,
            factory,
            Arc::clone(&fs),
            cfg.deploy.work_dir.clone(),
            cfg.deploy.step_timeout,
        );
        let started = deployer
            .deploy_all(orchestrator.registry(), &cfg.external)
            .await;
        debug!(started = started.len(), "external contexts deployed");
    }

    if cfg.scan.reload == ReloadMode::Manual {
        spawn_console(Arc::clone(orchestrator.registry()), orchestrator.sender());
    }

    // Ctrl-C → graceful shutdown.
    {
        let tx = orchestrator.sender();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(OrchestratorEvent::ShutdownRequested).await;
        });
    }

    orchestrator.run().await?;
    Ok(())
}

/// Dry-run output: the selected applications with their settings and watch
/// sets, plus the external contexts.
fn print_dry_run(cfg: &ConfigFile, provisioner: &BuildProvisioner, apps: &[AppId]) {
    println!("hotdeploy dry-run");
    println!("  scan.interval = {:?}", cfg.scan.interval);
    println!("  scan.reload = {}", cfg.scan.reload);
    println!("  scan.settle_cycles = {}", cfg.scan.settle_cycles);
    println!("  deploy.strategy = {:?}", cfg.deploy.strategy);
    println!("  deploy.launch = {}", cfg.deploy.launch);
    println!();

    println!("applications ({}):", apps.len());
    for app in apps {
        println!("  - {app}");
        match provisioner.describe(app) {
            Ok((settings, watch_set)) => {
                println!("      context: {}", settings.context_path);
                println!("      web dir: {}", settings.web_dir.display());
                if let Some(ref descriptor) = settings.descriptor {
                    println!("      descriptor: {}", descriptor.display());
                }
                if let Some(ref classes) = settings.classes_dir {
                    println!("      classes: {}", classes.display());
                }
                if !settings.classpath.is_empty() {
                    println!("      classpath: {} entries", settings.classpath.len());
                }
                println!("      watch ({}):", watch_set.len());
                for target in watch_set.iter() {
                    println!("        {:?} {}", target.kind(), target.path().display());
                }
            }
            Err(err) => println!("      error: {err}"),
        }
    }

    if !cfg.external.is_empty() {
        println!();
        println!("external ({}):", cfg.external.len());
        for external in &cfg.external {
            println!("  - {} -> {}", external.context_path, external.coordinate);
        }
    }

    debug!("dry-run complete (nothing started)");
}
