// src/engine/redeploy.rs

//! One redeploy cycle for one application.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::MutexGuard;
use tracing::{debug, error, info, warn};

use crate::deploy::provision::{Provisioned, Provisioner};
use crate::engine::registry::{AppKind, AppRecord, AppStatus, ApplicationRegistry};
use crate::engine::{RedeployOutcome, RedeployStep, RedeployTrigger};
use crate::errors::{HotdeployError, Result};
use crate::types::AppId;

/// Default bound for each container step and for reconfiguration.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeployOptions {
    /// `None` leaves steps unbounded.
    pub step_timeout: Option<Duration>,
}

impl Default for RedeployOptions {
    fn default() -> Self {
        Self {
            step_timeout: Some(DEFAULT_STEP_TIMEOUT),
        }
    }
}

/// Run `fut` under the optional step bound. Errors and timeouts both come
/// back as a failure reason.
pub(crate) async fn bounded<T, F>(limit: Option<Duration>, fut: F) -> std::result::Result<T, String>
where
    F: Future<Output = Result<T>>,
{
    let result = match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => return Err(format!("timed out after {}s", limit.as_secs_f64())),
        },
        None => fut.await,
    };
    result.map_err(|e| e.to_string())
}

/// Provision on a blocking thread, bounded like any other step.
pub(crate) async fn provision_bounded(
    provisioner: Arc<dyn Provisioner>,
    app: &AppId,
    limit: Option<Duration>,
) -> std::result::Result<Provisioned, String> {
    let app = app.clone();
    bounded(limit, async move {
        tokio::task::spawn_blocking(move || provisioner.provision(&app))
            .await
            .map_err(|e| HotdeployError::Other(e.into()))?
    })
    .await
}

/// Stop, reconfigure and restart one application.
///
/// Runs entirely under the application's record lock. A failing step leaves
/// the application `Failed` with no context serving; the scanner is resumed
/// so the next detected change retries. Nothing propagates to the caller.
pub async fn redeploy(
    registry: &ApplicationRegistry,
    provisioner: Arc<dyn Provisioner>,
    app: &AppId,
    trigger: RedeployTrigger,
    options: RedeployOptions,
) -> RedeployOutcome {
    let Some(record) = registry.get(app).await else {
        warn!(app = %app, "redeploy requested for unknown application");
        return RedeployOutcome::Unknown;
    };
    let mut record = record.lock().await;

    if record.kind == AppKind::External {
        debug!(app = %app, "external contexts are not redeployed");
        return RedeployOutcome::Unknown;
    }

    match &trigger {
        RedeployTrigger::Manual => info!(
            app = %app,
            context = %record.context_path,
            generation = record.generation,
            "manual redeploy"
        ),
        RedeployTrigger::Changes(batch) => info!(
            app = %app,
            context = %record.context_path,
            generation = record.generation,
            cycle = batch.cycle(),
            changes = batch.len(),
            "redeploying after changes"
        ),
    }

    // 1. Stop the scanner so no comparison runs during the swap.
    if let Some(scanner) = &record.scanner {
        scanner.stop().await;
    }
    debug!(app = %app, step = %RedeployStep::StopScanner, "step done");

    // 2. Stop the live context.
    let stopped = match record.context.as_mut() {
        Some(context) => bounded(options.step_timeout, context.stop()).await,
        None => Ok(()),
    };
    if let Err(reason) = stopped {
        // Dropping the context tears it down.
        record.context = None;
        return fail(&mut record, RedeployStep::StopContext, reason).await;
    }
    record.status = AppStatus::Stopped;
    debug!(app = %app, step = %RedeployStep::StopContext, "step done");

    // 3. Re-read build metadata into a fresh context and watch set.
    let provisioned =
        match provision_bounded(provisioner, app, options.step_timeout).await {
            Ok(provisioned) => provisioned,
            Err(reason) => return fail(&mut record, RedeployStep::Reconfigure, reason).await,
        };
    let Provisioned {
        settings,
        mut context,
        watch_set,
    } = provisioned;

    if settings.context_path != record.context_path {
        warn!(
            app = %app,
            context = %record.context_path,
            declared = %settings.context_path,
            "context path changed in build; keeping the registered one until restart"
        );
    }

    if watch_set != record.watch_set {
        info!(
            app = %app,
            targets = watch_set.len(),
            "watch set changed; replacing"
        );
        if let Some(scanner) = &record.scanner {
            scanner.replace_watch_set(watch_set.clone()).await;
        }
        record.watch_set = watch_set;
    }
    debug!(app = %app, step = %RedeployStep::Reconfigure, "step done");

    // 4. Start the new context; only then drop the old one.
    if let Err(reason) = bounded(options.step_timeout, context.start()).await {
        if let Err(e) = bounded(options.step_timeout, context.stop()).await {
            debug!(app = %app, error = %e, "cleanup of failed context failed");
        }
        return fail(&mut record, RedeployStep::StartContext, reason).await;
    }
    let _old = record.replace_context(context);
    debug!(app = %app, step = %RedeployStep::StartContext, "step done");

    // 5. Resume scanning.
    if let Some(scanner) = &record.scanner {
        scanner.start().await;
    }
    debug!(app = %app, step = %RedeployStep::RestartScanner, "step done");

    info!(
        app = %app,
        context = %record.context_path,
        generation = record.generation,
        "redeploy complete"
    );
    RedeployOutcome::Redeployed {
        generation: record.generation,
    }
}

async fn fail(
    record: &mut MutexGuard<'_, AppRecord>,
    step: RedeployStep,
    reason: String,
) -> RedeployOutcome {
    error!(
        app = %record.app_id,
        context = %record.context_path,
        step = %step,
        reason = %reason,
        "redeploy failed; application left stopped until the next change"
    );
    record.status = AppStatus::Failed {
        step,
        reason: reason.clone(),
    };
    if let Some(scanner) = &record.scanner {
        scanner.start().await;
    }
    RedeployOutcome::Failed { step, reason }
}
