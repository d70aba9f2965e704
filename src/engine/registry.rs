// src/engine/registry.rs

//! Application registry: the live state of every deployed context.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::deploy::context::ContainerContext;
use crate::engine::RedeployStep;
use crate::errors::{HotdeployError, Result};
use crate::types::AppId;
use crate::watch::{ScannerHandle, WatchSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppKind {
    /// Built from a project of the build; redeployable.
    Project,
    /// Resolved artifact deployed as-is; never redeployed.
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppStatus {
    Running,
    Stopped,
    Failed { step: RedeployStep, reason: String },
}

/// Live state of one application.
#[derive(Debug)]
pub struct AppRecord {
    pub app_id: AppId,
    pub context_path: String,
    pub kind: AppKind,
    pub context: Option<Box<dyn ContainerContext>>,
    pub scanner: Option<ScannerHandle>,
    pub watch_set: WatchSet,
    pub generation: u64,
    pub status: AppStatus,
}

impl AppRecord {
    pub fn new(app_id: AppId, context_path: impl Into<String>, kind: AppKind) -> Self {
        Self {
            app_id,
            context_path: context_path.into(),
            kind,
            context: None,
            scanner: None,
            watch_set: WatchSet::new(),
            generation: 0,
            status: AppStatus::Stopped,
        }
    }

    /// Install a freshly started context in place of the current one.
    ///
    /// Increments the generation and returns the previous context.
    pub fn replace_context(
        &mut self,
        context: Box<dyn ContainerContext>,
    ) -> Option<Box<dyn ContainerContext>> {
        let previous = self.context.replace(context);
        self.generation += 1;
        self.status = AppStatus::Running;
        previous
    }
}

#[derive(Debug)]
struct Entry {
    context_path: String,
    kind: AppKind,
    record: Arc<Mutex<AppRecord>>,
}

/// All registered applications.
///
/// Each record sits behind its own async mutex, which serializes redeploys
/// and administrative operations for that application while other
/// applications proceed independently.
#[derive(Debug, Default)]
pub struct ApplicationRegistry {
    apps: RwLock<BTreeMap<AppId, Entry>>,
}

impl ApplicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Fails when the id or the context path is taken.
    pub async fn register(&self, record: AppRecord) -> Result<Arc<Mutex<AppRecord>>> {
        let mut apps = self.apps.write().await;
        if apps.contains_key(&record.app_id) {
            return Err(HotdeployError::DuplicateApp(record.app_id.to_string()));
        }
        if let Some((owner, _)) = apps
            .iter()
            .find(|(_, e)| e.context_path == record.context_path)
        {
            return Err(HotdeployError::DuplicateApp(format!(
                "context path {} is already served by {}",
                record.context_path, owner
            )));
        }

        info!(
            app = %record.app_id,
            context = %record.context_path,
            generation = record.generation,
            "registered application"
        );
        let app_id = record.app_id.clone();
        let context_path = record.context_path.clone();
        let kind = record.kind;
        let record = Arc::new(Mutex::new(record));
        apps.insert(
            app_id,
            Entry {
                context_path,
                kind,
                record: Arc::clone(&record),
            },
        );
        Ok(record)
    }

    pub async fn get(&self, app: &AppId) -> Option<Arc<Mutex<AppRecord>>> {
        self.apps
            .read()
            .await
            .get(app)
            .map(|e| Arc::clone(&e.record))
    }

    pub async fn unregister(&self, app: &AppId) -> Option<Arc<Mutex<AppRecord>>> {
        let removed = self.apps.write().await.remove(app);
        if removed.is_some() {
            debug!(app = %app, "unregistered application");
        }
        removed.map(|e| e.record)
    }

    pub async fn app_ids(&self) -> Vec<AppId> {
        self.apps.read().await.keys().cloned().collect()
    }

    /// Ids of applications built from the build's projects.
    pub async fn project_ids(&self) -> Vec<AppId> {
        self.apps
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.kind == AppKind::Project)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.apps.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.apps.read().await.is_empty()
    }

    pub async fn context_path_in_use(&self, context_path: &str) -> bool {
        self.apps
            .read()
            .await
            .values()
            .any(|e| e.context_path == context_path)
    }

    /// Look an application up by id or by context path.
    pub async fn find(&self, key: &str) -> Option<AppId> {
        let apps = self.apps.read().await;
        apps.keys()
            .find(|id| id.as_str() == key)
            .or_else(|| {
                apps.iter()
                    .find(|(_, e)| e.context_path == key)
                    .map(|(id, _)| id)
            })
            .cloned()
    }

    pub async fn generation(&self, app: &AppId) -> Result<u64> {
        let record = self
            .get(app)
            .await
            .ok_or_else(|| HotdeployError::AppNotFound(app.to_string()))?;
        let generation = record.lock().await.generation;
        Ok(generation)
    }

    pub async fn status(&self, app: &AppId) -> Result<AppStatus> {
        let record = self
            .get(app)
            .await
            .ok_or_else(|| HotdeployError::AppNotFound(app.to_string()))?;
        let status = record.lock().await.status.clone();
        Ok(status)
    }
}
