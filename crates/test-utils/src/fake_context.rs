use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hotdeploy::deploy::context::apply_settings;
use hotdeploy::deploy::{AppSettings, ContainerContext, ContextFactory, LifecycleFuture};
use hotdeploy::errors::{HotdeployError, Result};

/// One lifecycle call seen by a recording context. `instance` numbers
/// contexts in creation order, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextCall {
    Create { context_path: String, instance: u64 },
    Start { context_path: String, instance: u64 },
    Stop { context_path: String, instance: u64 },
}

pub type CallLog = Arc<Mutex<Vec<ContextCall>>>;

/// Knobs shared by a factory and every context it created, so a test can
/// change behaviour after the context exists.
#[derive(Debug, Default)]
pub struct ContextBehaviour {
    pub fail_start: AtomicBool,
    pub fail_stop: AtomicBool,
    pub start_delay: Mutex<Option<Duration>>,
}

impl ContextBehaviour {
    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn set_start_delay(&self, delay: Option<Duration>) {
        *self.start_delay.lock().unwrap() = delay;
    }
}

/// A context that records its calls and never spawns anything.
#[derive(Debug)]
pub struct RecordingContext {
    context_path: String,
    instance: u64,
    running: bool,
    pub descriptor: Option<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub base_resources: Vec<PathBuf>,
    log: CallLog,
    behaviour: Arc<ContextBehaviour>,
}

impl RecordingContext {
    pub fn instance(&self) -> u64 {
        self.instance
    }
}

impl ContainerContext for RecordingContext {
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
        Box::pin(async move {
            self.log.lock().unwrap().push(ContextCall::Start {
                context_path: self.context_path.clone(),
                instance: self.instance,
            });
            let delay = *self.behaviour.start_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.behaviour.fail_start.load(Ordering::SeqCst) {
                return Err(HotdeployError::Other(anyhow::anyhow!(
                    "context {} refused to start",
                    self.context_path
                )));
            }
            self.running = true;
            Ok(())
        })
    }

    fn stop(&mut self) -> LifecycleFuture<'_> {
        Box::pin(async move {
            if !self.running {
                return Ok(());
            }
            self.log.lock().unwrap().push(ContextCall::Stop {
                context_path: self.context_path.clone(),
                instance: self.instance,
            });
            if self.behaviour.fail_stop.load(Ordering::SeqCst) {
                return Err(HotdeployError::Other(anyhow::anyhow!(
                    "context {} refused to stop",
                    self.context_path
                )));
            }
            self.running = false;
            Ok(())
        })
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Factory of [`RecordingContext`]s sharing one call log.
#[derive(Debug, Default)]
pub struct RecordingContextFactory {
    log: CallLog,
    behaviour: Arc<ContextBehaviour>,
    created: AtomicU64,
}

impl RecordingContextFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> CallLog {
        Arc::clone(&self.log)
    }

    pub fn calls(&self) -> Vec<ContextCall> {
        self.log.lock().unwrap().clone()
    }

    pub fn behaviour(&self) -> Arc<ContextBehaviour> {
        Arc::clone(&self.behaviour)
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of `Start` calls for `context_path`.
    pub fn starts_of(&self, context_path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ContextCall::Start { context_path: p, .. } if p == context_path))
            .count()
    }
}

impl ContextFactory for RecordingContextFactory {
    fn create(&self, settings: &AppSettings) -> Result<Box<dyn ContainerContext>> {
        let instance = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.lock().unwrap().push(ContextCall::Create {
            context_path: settings.context_path.clone(),
            instance,
        });

        let mut context = RecordingContext {
            context_path: settings.context_path.clone(),
            instance,
            running: false,
            descriptor: None,
            classpath: Vec::new(),
            base_resources: Vec::new(),
            log: Arc::clone(&self.log),
            behaviour: Arc::clone(&self.behaviour),
        };
        apply_settings(&mut context, settings);
        Ok(Box::new(context))
    }
}
