// src/engine/mod.rs

//! Redeploy orchestration.
//!
//! This module ties together:
//! - the application registry (one record per deployed context)
//! - the redeploy queue (what happens when requests arrive for an app whose
//!   redeploy is already running)
//! - the redeploy cycle itself (stop scanner, stop context, reconfigure,
//!   start context, restart scanner)
//! - the orchestrator event loop that reacts to:
//!   - settled change batches from scanners
//!   - manual redeploy requests from the console
//!   - redeploy completion
//!   - shutdown signals

use std::fmt;

use crate::watch::ChangeBatch;

pub use crate::types::AppId;

/// The five steps of a redeploy, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedeployStep {
    StopScanner,
    StopContext,
    Reconfigure,
    StartContext,
    RestartScanner,
}

impl fmt::Display for RedeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RedeployStep::StopScanner => "stop-scanner",
            RedeployStep::StopContext => "stop-context",
            RedeployStep::Reconfigure => "reconfigure",
            RedeployStep::StartContext => "start-context",
            RedeployStep::RestartScanner => "restart-scanner",
        };
        f.write_str(name)
    }
}

/// What caused a redeploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeployTrigger {
    /// Console request.
    Manual,
    /// Settled filesystem changes.
    Changes(ChangeBatch),
}

impl RedeployTrigger {
    /// Coalesce a later trigger for the same application into this one.
    pub fn merge(self, later: RedeployTrigger) -> RedeployTrigger {
        match (self, later) {
            (RedeployTrigger::Changes(mut first), RedeployTrigger::Changes(second)) => {
                first.merge(second);
                RedeployTrigger::Changes(first)
            }
            (RedeployTrigger::Manual, other) | (other, RedeployTrigger::Manual) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeployOutcome {
    Redeployed { generation: u64 },
    Failed { step: RedeployStep, reason: String },
    /// The application is not (or no longer) registered.
    Unknown,
}

impl RedeployOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RedeployOutcome::Redeployed { .. })
    }
}

/// Events flowing into the orchestrator from scanners, the console and
/// redeploy tasks.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// A scanner settled a batch of changes.
    ChangesDetected { app: AppId, batch: ChangeBatch },
    /// Manual redeploy; `None` means every application.
    RedeployRequested { app: Option<AppId> },
    /// A redeploy task finished.
    RedeployFinished { app: AppId, outcome: RedeployOutcome },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod console;
pub mod orchestrator;
pub mod queue;
pub mod redeploy;
pub mod registry;

pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use queue::RedeployQueue;
pub use redeploy::{redeploy, RedeployOptions};
pub use registry::{AppKind, AppRecord, AppStatus, ApplicationRegistry};
