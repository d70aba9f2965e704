use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use hotdeploy::deploy::{AppSettings, ContextFactory, Provisioned, Provisioner, WatchOptions};
use hotdeploy::errors::{HotdeployError, Result};
use hotdeploy::fs::FileSystem;
use hotdeploy::types::AppId;
use hotdeploy::watch::{WatchSetBuilder, DEFAULT_MAX_DEPTH};

use crate::fake_context::RecordingContextFactory;

/// Provisioner over scripted settings.
///
/// Watch sets are built from the current settings against the given
/// filesystem on every call, like the real provisioner does.
#[derive(Debug)]
pub struct FakeProvisioner {
    fs: Arc<dyn FileSystem>,
    factory: Arc<RecordingContextFactory>,
    watch: WatchOptions,
    apps: Mutex<BTreeMap<AppId, AppSettings>>,
    failing: Mutex<HashSet<AppId>>,
    calls: Mutex<Vec<AppId>>,
}

impl FakeProvisioner {
    pub fn new(fs: Arc<dyn FileSystem>, factory: Arc<RecordingContextFactory>) -> Self {
        Self {
            fs,
            factory,
            watch: WatchOptions {
                max_depth: DEFAULT_MAX_DEPTH,
                ..WatchOptions::default()
            },
            apps: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_watch_options(mut self, watch: WatchOptions) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_app(self, settings: AppSettings) -> Self {
        self.set_settings(settings);
        self
    }

    /// Replace the settings returned for `settings.app_id` from now on.
    pub fn set_settings(&self, settings: AppSettings) {
        self.apps
            .lock()
            .unwrap()
            .insert(settings.app_id.clone(), settings);
    }

    /// Make provisioning of `app` fail until cleared.
    pub fn set_failing(&self, app: &AppId, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(app.clone());
        } else {
            set.remove(app);
        }
    }

    pub fn calls(&self) -> Vec<AppId> {
        self.calls.lock().unwrap().clone()
    }
}

impl Provisioner for FakeProvisioner {
    fn provision(&self, app: &AppId) -> Result<Provisioned> {
        self.calls.lock().unwrap().push(app.clone());

        if self.failing.lock().unwrap().contains(app) {
            return Err(HotdeployError::ConfigError(format!(
                "scripted provisioning failure for {app}"
            )));
        }
        let settings = self
            .apps
            .lock()
            .unwrap()
            .get(app)
            .cloned()
            .ok_or_else(|| HotdeployError::AppNotFound(app.to_string()))?;

        let watch_set = WatchSetBuilder::new(Arc::clone(&self.fs), self.watch.max_depth)
            .build(&self.watch.inputs_for(&settings))?;
        let context = self.factory.create(&settings)?;

        Ok(Provisioned {
            settings,
            context,
            watch_set,
        })
    }
}
