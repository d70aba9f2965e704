// src/deploy/context.rs

//! Container context abstraction.
//!
//! The orchestrator talks to a `ContainerContext` instead of a concrete
//! server. Production code uses [`ProcessContext`](super::process::ProcessContext);
//! tests plug in recording fakes that never spawn anything.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::deploy::configure::AppSettings;
use crate::errors::Result;

/// Boxed future returned by lifecycle operations.
pub type LifecycleFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// One deployed web application as seen by the host container.
pub trait ContainerContext: Send + Sync + fmt::Debug {
    fn context_path(&self) -> &str;

    fn set_descriptor(&mut self, descriptor: Option<PathBuf>);

    fn set_classpath(&mut self, classpath: Vec<PathBuf>);

    /// Resource roots in priority order; earlier entries shadow later ones.
    fn set_base_resources(&mut self, resources: Vec<PathBuf>);

    fn start(&mut self) -> LifecycleFuture<'_>;

    /// Stop serving. Stopping a context that is not running is a no-op.
    fn stop(&mut self) -> LifecycleFuture<'_>;

    fn is_running(&self) -> bool;
}

/// Builds fresh contexts from derived application settings.
pub trait ContextFactory: Send + Sync + fmt::Debug {
    fn create(&self, settings: &AppSettings) -> Result<Box<dyn ContainerContext>>;
}

/// Push descriptor, classpath and resources of `settings` into `context`.
pub fn apply_settings(context: &mut dyn ContainerContext, settings: &AppSettings) {
    context.set_descriptor(settings.descriptor.clone());
    context.set_classpath(settings.full_classpath());
    context.set_base_resources(settings.base_resources.clone());
}
