// src/engine/console.rs

//! Manual reload console.
//!
//! Reads lines from stdin: `r` / `reload` redeploys every application,
//! `r <app id or context path>` redeploys one.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::registry::ApplicationRegistry;
use crate::engine::OrchestratorEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    ReloadAll,
    Reload(String),
}

pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "r" | "reload" => match parts.next() {
            Some(target) => Some(ConsoleCommand::Reload(target.to_string())),
            None => Some(ConsoleCommand::ReloadAll),
        },
        _ => None,
    }
}

/// Spawn the console reader on stdin.
pub fn spawn_console(
    registry: Arc<ApplicationRegistry>,
    events_tx: mpsc::Sender<OrchestratorEvent>,
) -> JoinHandle<()> {
    info!("manual reload: type 'r' to redeploy all applications, 'r <app|context>' for one");
    tokio::spawn(console_loop(
        BufReader::new(tokio::io::stdin()),
        registry,
        events_tx,
    ))
}

/// Read commands until EOF or until the orchestrator goes away.
pub async fn console_loop<R>(
    reader: R,
    registry: Arc<ApplicationRegistry>,
    events_tx: mpsc::Sender<OrchestratorEvent>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = match parse_command(line) {
            Some(ConsoleCommand::ReloadAll) => OrchestratorEvent::RedeployRequested { app: None },
            Some(ConsoleCommand::Reload(target)) => match registry.find(&target).await {
                Some(app) => OrchestratorEvent::RedeployRequested { app: Some(app) },
                None => {
                    warn!(target = %target, "no application with that id or context path");
                    continue;
                }
            },
            None => {
                info!(input = %line, "unknown console command");
                continue;
            }
        };

        if events_tx.send(event).await.is_err() {
            break;
        }
    }
    debug!("console input closed");
}
