// src/deploy/process.rs

//! Container context backed by an external server process.
//!
//! The launch command runs under `sh -c` with the context settings exported
//! as environment variables. When a readiness regex is configured, `start`
//! only returns once a stdout line matches it.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{anyhow, Context};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::deploy::configure::AppSettings;
use crate::deploy::context::{apply_settings, ContainerContext, ContextFactory, LifecycleFuture};
use crate::errors::Result;

pub const ENV_CONTEXT_PATH: &str = "HOTDEPLOY_CONTEXT_PATH";
pub const ENV_DESCRIPTOR: &str = "HOTDEPLOY_DESCRIPTOR";
pub const ENV_CLASSPATH: &str = "HOTDEPLOY_CLASSPATH";
pub const ENV_BASE_RESOURCES: &str = "HOTDEPLOY_BASE_RESOURCES";

#[derive(Debug)]
pub struct ProcessContext {
    context_path: String,
    launch: String,
    ready_on_stdout: Option<Regex>,
    descriptor: Option<PathBuf>,
    classpath: Vec<PathBuf>,
    base_resources: Vec<PathBuf>,
    child: Option<Child>,
}

impl ProcessContext {
    pub fn new(context_path: impl Into<String>, launch: impl Into<String>) -> Self {
        Self {
            context_path: context_path.into(),
            launch: launch.into(),
            ready_on_stdout: None,
            descriptor: None,
            classpath: Vec::new(),
            base_resources: Vec::new(),
            child: None,
        }
    }

    pub fn with_ready_on_stdout(mut self, ready: Option<Regex>) -> Self {
        self.ready_on_stdout = ready;
        self
    }

    fn command(&self) -> Result<Command> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.launch);

        cmd.env(ENV_CONTEXT_PATH, &self.context_path)
            .env(
                ENV_DESCRIPTOR,
                self.descriptor.clone().unwrap_or_default(),
            )
            .env(ENV_CLASSPATH, join_paths(&self.classpath)?)
            .env(ENV_BASE_RESOURCES, join_paths(&self.base_resources)?)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }

    async fn start_inner(&mut self) -> Result<()> {
        if self.child.is_some() {
            debug!(context = %self.context_path, "context already running");
            return Ok(());
        }

        info!(
            context = %self.context_path,
            cmd = %self.launch,
            "starting context process"
        );

        let mut child = self
            .command()?
            .spawn()
            .with_context(|| format!("spawning process for context '{}'", self.context_path))?;

        if let Some(stderr) = child.stderr.take() {
            let context = self.context_path.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(context = %context, "stderr: {}", line);
                }
            });
        }

        let ready_rx = child
            .stdout
            .take()
            .map(|stdout| spawn_stdout_monitor(&self.context_path, stdout, self.ready_on_stdout.clone()));

        match (&self.ready_on_stdout, ready_rx) {
            (Some(_), Some(ready_rx)) => {
                tokio::select! {
                    ready = ready_rx => {
                        if ready.is_err() {
                            let _ = child.kill().await;
                            return Err(anyhow!(
                                "context '{}' closed stdout before becoming ready",
                                self.context_path
                            )
                            .into());
                        }
                    }
                    status = child.wait() => {
                        let status = status.with_context(|| {
                            format!("waiting for process of context '{}'", self.context_path)
                        })?;
                        return Err(anyhow!(
                            "context '{}' exited before becoming ready ({status})",
                            self.context_path
                        )
                        .into());
                    }
                }
            }
            _ => {
                if let Some(status) = child.try_wait().with_context(|| {
                    format!("polling process of context '{}'", self.context_path)
                })? {
                    return Err(anyhow!(
                        "context '{}' exited immediately ({status})",
                        self.context_path
                    )
                    .into());
                }
            }
        }

        info!(context = %self.context_path, pid = ?child.id(), "context started");
        self.child = Some(child);
        Ok(())
    }

    async fn stop_inner(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                warn!(context = %self.context_path, %status, "context process had already exited");
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => {
                debug!(context = %self.context_path, error = %e, "could not poll context process");
            }
        }

        child
            .kill()
            .await
            .with_context(|| format!("killing process of context '{}'", self.context_path))?;
        info!(context = %self.context_path, "context stopped");
        Ok(())
    }
}

fn join_paths(paths: &[PathBuf]) -> Result<std::ffi::OsString> {
    Ok(std::env::join_paths(paths).context("joining path list")?)
}

/// Forward stdout lines to debug logs. When `ready` is set, the returned
/// receiver fires on the first matching line.
fn spawn_stdout_monitor(
    context_path: &str,
    stdout: ChildStdout,
    ready: Option<Regex>,
) -> oneshot::Receiver<()> {
    let (ready_tx, ready_rx) = oneshot::channel();
    let context = context_path.to_string();

    tokio::spawn(async move {
        let mut ready_tx = Some(ready_tx);
        let mut lines = BufReader::new(stdout).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            debug!(context = %context, "stdout: {}", line);

            if let Some(re) = &ready {
                if re.is_match(&line) {
                    if let Some(tx) = ready_tx.take() {
                        debug!(context = %context, "stdout matched ready_on_stdout");
                        let _ = tx.send(());
                    }
                }
            }
        }
    });

    ready_rx
}

impl ContainerContext for ProcessContext {
    fn context_path(&self) -> &str {
        &self.context_path
    }

    fn set_descriptor(&mut self, descriptor: Option<PathBuf>) {
        self.descriptor = descriptor;
    }

    fn set_classpath(&mut self, classpath: Vec<PathBuf>) {
        self.classpath = classpath;
    }

    fn set_base_resources(&mut self, resources: Vec<PathBuf>) {
        self.base_resources = resources;
    }

    fn start(&mut self) -> LifecycleFuture<'_> {
        Box::pin(self.start_inner())
    }

    fn stop(&mut self) -> LifecycleFuture<'_> {
        Box::pin(self.stop_inner())
    }

    fn is_running(&self) -> bool {
        self.child.is_some()
    }
}

/// Creates one [`ProcessContext`] per application.
#[derive(Debug, Clone)]
pub struct ProcessContextFactory {
    launch: String,
    ready_on_stdout: Option<Regex>,
}

impl ProcessContextFactory {
    pub fn new(launch: impl Into<String>, ready_on_stdout: Option<Regex>) -> Self {
        Self {
            launch: launch.into(),
            ready_on_stdout,
        }
    }
}

impl ContextFactory for ProcessContextFactory {
    fn create(&self, settings: &AppSettings) -> Result<Box<dyn ContainerContext>> {
        let mut context = ProcessContext::new(settings.context_path.clone(), self.launch.clone())
            .with_ready_on_stdout(self.ready_on_stdout.clone());
        apply_settings(&mut context, settings);
        Ok(Box::new(context))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn start_waits_for_ready_line_and_stop_reaps() {
        let mut ctx = ProcessContext::new("/shop", "echo booting; echo \"ready on $HOTDEPLOY_CONTEXT_PATH\"; exec sleep 30")
            .with_ready_on_stdout(Some(Regex::new("^ready on /shop$").unwrap()));

        tokio::time::timeout(Duration::from_secs(5), ctx.start())
            .await
            .expect("start should not hang")
            .unwrap();
        assert!(ctx.is_running());

        ctx.stop().await.unwrap();
        assert!(!ctx.is_running());
        ctx.stop().await.unwrap();
    }

    #[tokio::test]
    async fn early_exit_fails_start() {
        let mut ctx = ProcessContext::new("/shop", "exit 3")
            .with_ready_on_stdout(Some(Regex::new("never").unwrap()));
        let result = tokio::time::timeout(Duration::from_secs(5), ctx.start())
            .await
            .expect("start should not hang");
        assert!(result.is_err());
        assert!(!ctx.is_running());
    }
}
