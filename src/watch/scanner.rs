// src/watch/scanner.rs

//! Polling scanner: periodic fingerprinting, settle policy and batch
//! delivery.
//!
//! The settle rules live in the pure [`ScanCore`]; [`spawn_scanner`] wraps it
//! in a tokio task that ticks on an interval and forwards settled batches to
//! the orchestrator.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

use crate::engine::OrchestratorEvent;
use crate::fs::FileSystem;
use crate::types::AppId;
use crate::watch::batch::{Change, ChangeBatch, ChangeKind};
use crate::watch::fingerprint::{diff, FingerprintStore, Snapshot};
use crate::watch::target::WatchSet;

/// Where the core is within one scan cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Scanning,
    Settling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Time between scans. `Duration::ZERO` disables scanning entirely.
    pub interval: Duration,
    /// Consecutive unchanged scans a change must survive before it is
    /// reported.
    pub settle_cycles: u32,
    /// Report every existing entry as `Added` on the baseline scan.
    pub report_existing: bool,
    pub use_hash: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            settle_cycles: 1,
            report_existing: false,
            use_hash: false,
        }
    }
}

impl ScannerConfig {
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    kind: ChangeKind,
    stable: u32,
}

/// Settle state machine for one application's watch set.
#[derive(Debug)]
pub struct ScanCore {
    app: AppId,
    watch_set: WatchSet,
    store: FingerprintStore,
    settle_cycles: u32,
    report_existing: bool,
    previous: Option<Snapshot>,
    pending: BTreeMap<PathBuf, Pending>,
    phase: ScanPhase,
    cycles: u64,
}

impl ScanCore {
    pub fn new(
        app: AppId,
        watch_set: WatchSet,
        config: &ScannerConfig,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            app,
            watch_set,
            store: FingerprintStore::new(fs, config.use_hash),
            settle_cycles: config.settle_cycles,
            report_existing: config.report_existing,
            previous: None,
            pending: BTreeMap::new(),
            phase: ScanPhase::Idle,
            cycles: 0,
        }
    }

    pub fn app(&self) -> &AppId {
        &self.app
    }

    pub fn watch_set(&self) -> &WatchSet {
        &self.watch_set
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Run one scan cycle: snapshot, fold differences into the pending set,
    /// then emit whatever has settled.
    pub fn cycle(&mut self) -> Option<ChangeBatch> {
        self.cycles += 1;

        self.phase = ScanPhase::Scanning;
        let current = self.store.snapshot(&self.watch_set, self.previous.as_ref());

        self.phase = ScanPhase::Settling;
        let raw = match &self.previous {
            Some(previous) => diff(previous, &current),
            None if self.report_existing => diff(&Snapshot::new(), &current),
            None => {
                debug!(app = %self.app, cycle = self.cycles, "baseline scan");
                Vec::new()
            }
        };
        self.previous = Some(current);
        self.settle(raw);

        self.phase = ScanPhase::Idle;
        self.take_settled()
    }

    /// Swap in a new watch set and baseline it immediately.
    ///
    /// Targets present in both sets keep their last fingerprint, so edits
    /// that land between the swap and the next cycle are still seen. The
    /// pending set is dropped.
    pub fn replace_watch_set(&mut self, watch_set: WatchSet) {
        let fresh = self.store.snapshot(&watch_set, self.previous.as_ref());
        let baseline: Snapshot = fresh
            .into_iter()
            .map(|(path, fp)| {
                let kept = self
                    .previous
                    .as_ref()
                    .and_then(|prev| prev.get(&path).cloned())
                    .unwrap_or(fp);
                (path, kept)
            })
            .collect();

        debug!(
            app = %self.app,
            targets = watch_set.len(),
            "watch set replaced"
        );
        self.watch_set = watch_set;
        self.previous = Some(baseline);
        self.pending.clear();
    }

    fn settle(&mut self, raw: Vec<Change>) {
        let touched: Vec<PathBuf> = raw.iter().map(|c| c.path.clone()).collect();

        for (path, entry) in self.pending.iter_mut() {
            if !touched.contains(path) {
                entry.stable = entry.stable.saturating_add(1);
            }
        }

        for change in raw {
            match self.pending.remove(&change.path) {
                Some(prev) => {
                    if let Some(kind) = prev.kind.merge(change.kind) {
                        self.pending.insert(change.path, Pending { kind, stable: 0 });
                    } else {
                        trace!(path = ?change.path, "change cancelled out");
                    }
                }
                None => {
                    self.pending.insert(
                        change.path,
                        Pending {
                            kind: change.kind,
                            stable: 0,
                        },
                    );
                }
            }
        }
    }

    fn take_settled(&mut self) -> Option<ChangeBatch> {
        let ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, p)| p.stable >= self.settle_cycles)
            .map(|(path, _)| path.clone())
            .collect();

        let changes: Vec<Change> = ready
            .into_iter()
            .filter_map(|path| {
                let pending = self.pending.remove(&path)?;
                Some(Change::new(path, pending.kind))
            })
            .collect();

        ChangeBatch::new(self.app.clone(), self.cycles, changes)
    }
}

#[derive(Debug)]
struct Shared {
    core: ScanCore,
    state: ScannerState,
}

/// Control handle for one application's scanner task.
///
/// Dropping the handle aborts the task.
#[derive(Debug)]
pub struct ScannerHandle {
    app: AppId,
    enabled: bool,
    shared: Arc<Mutex<Shared>>,
    task: Option<JoinHandle<()>>,
}

/// Spawn the polling task for one application.
///
/// With a zero interval no task is spawned and the scanner stays `Stopped`
/// for good.
pub fn spawn_scanner(
    app: AppId,
    watch_set: WatchSet,
    config: ScannerConfig,
    fs: Arc<dyn FileSystem>,
    events_tx: mpsc::Sender<OrchestratorEvent>,
) -> ScannerHandle {
    let enabled = config.is_enabled();
    let core = ScanCore::new(app.clone(), watch_set, &config, fs);
    let state = if enabled {
        ScannerState::Running
    } else {
        ScannerState::Stopped
    };
    let shared = Arc::new(Mutex::new(Shared { core, state }));

    let task = if enabled {
        info!(
            app = %app,
            interval_ms = config.interval.as_millis() as u64,
            settle_cycles = config.settle_cycles,
            "scanner started"
        );
        Some(tokio::spawn(scan_loop(
            app.clone(),
            config.interval,
            Arc::clone(&shared),
            events_tx,
        )))
    } else {
        info!(app = %app, "scan interval is zero; scanner disabled");
        None
    };

    ScannerHandle {
        app,
        enabled,
        shared,
        task,
    }
}

async fn scan_loop(
    app: AppId,
    interval: Duration,
    shared: Arc<Mutex<Shared>>,
    events_tx: mpsc::Sender<OrchestratorEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let guard = Arc::clone(&shared).lock_owned().await;
        if guard.state != ScannerState::Running {
            continue;
        }

        // The lock is held across the scan and the send, so `stop()` cannot
        // return while a comparison is in flight.
        let (guard, batch) = match run_cycle(guard).await {
            Some(result) => result,
            None => break,
        };

        if let Some(batch) = batch {
            info!(
                app = %app,
                cycle = batch.cycle(),
                changes = batch.len(),
                "changes settled"
            );
            let event = OrchestratorEvent::ChangesDetected {
                app: app.clone(),
                batch,
            };
            if events_tx.send(event).await.is_err() {
                debug!(app = %app, "orchestrator channel closed; scanner exiting");
                break;
            }
        }
        drop(guard);
    }
}

async fn run_cycle(
    mut guard: OwnedMutexGuard<Shared>,
) -> Option<(OwnedMutexGuard<Shared>, Option<ChangeBatch>)> {
    let joined = tokio::task::spawn_blocking(move || {
        let batch = guard.core.cycle();
        (guard, batch)
    })
    .await;

    match joined {
        Ok(result) => Some(result),
        Err(err) => {
            error!(error = %err, "scan cycle panicked; scanner exiting");
            None
        }
    }
}

impl ScannerHandle {
    pub fn app(&self) -> &AppId {
        &self.app
    }

    /// False when the scanner was created with a zero interval.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn state(&self) -> ScannerState {
        self.shared.lock().await.state
    }

    /// Scan cycles run so far, the baseline included.
    pub async fn cycles(&self) -> u64 {
        self.shared.lock().await.core.cycles()
    }

    pub async fn watch_set(&self) -> WatchSet {
        self.shared.lock().await.core.watch_set().clone()
    }

    /// Pause scanning. Once this returns no cycle is running and none will
    /// start until [`start`](Self::start).
    pub async fn stop(&self) {
        let mut shared = self.shared.lock().await;
        if shared.state == ScannerState::Running {
            debug!(app = %self.app, "scanner stopped");
        }
        shared.state = ScannerState::Stopped;
    }

    /// Resume scanning from the retained snapshot.
    pub async fn start(&self) {
        if !self.enabled {
            debug!(app = %self.app, "scanner disabled; ignoring start");
            return;
        }
        let mut shared = self.shared.lock().await;
        if shared.state == ScannerState::Stopped {
            debug!(app = %self.app, "scanner resumed");
        }
        shared.state = ScannerState::Running;
    }

    pub async fn replace_watch_set(&self, watch_set: WatchSet) {
        let mut guard = Arc::clone(&self.shared).lock_owned().await;
        let joined = tokio::task::spawn_blocking(move || {
            guard.core.replace_watch_set(watch_set);
        })
        .await;
        if let Err(err) = joined {
            error!(app = %self.app, error = %err, "replacing watch set panicked");
        }
    }

    /// Stop for good and abort the polling task.
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.shared.lock().await.state = ScannerState::Stopped;
        debug!(app = %self.app, "scanner shut down");
    }
}

impl Drop for ScannerHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::watch::target::{WatchTarget, DEFAULT_MAX_DEPTH};
    use std::path::Path;

    fn watch_set() -> WatchSet {
        let mut set = WatchSet::new();
        set.push(WatchTarget::file("/app/WEB-INF/web.xml"));
        set.push(WatchTarget::directory("/app/WEB-INF/classes", None, DEFAULT_MAX_DEPTH));
        set
    }

    fn core(fs: &MockFileSystem, config: ScannerConfig) -> ScanCore {
        ScanCore::new(AppId::from("g:shop"), watch_set(), &config, Arc::new(fs.clone()))
    }

    fn seeded() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("/app/WEB-INF/web.xml", "<web-app/>");
        fs.add_file("/app/WEB-INF/classes/A.class", "a");
        fs
    }

    #[test]
    fn first_cycle_is_silent_baseline() {
        let fs = seeded();
        let mut core = core(&fs, ScannerConfig::default());
        assert!(core.cycle().is_none());
        assert!(core.has_baseline());
        assert_eq!(core.phase(), ScanPhase::Idle);
    }

    #[test]
    fn change_waits_for_a_quiet_cycle() {
        let fs = seeded();
        let mut core = core(&fs, ScannerConfig::default());
        core.cycle();

        fs.add_file("/app/WEB-INF/web.xml", "<web-app version=\"1\"/>");
        assert!(core.cycle().is_none());
        fs.add_file("/app/WEB-INF/web.xml", "<web-app version=\"2\"/>");
        assert!(core.cycle().is_none());

        let batch = core.cycle().expect("settled batch");
        assert_eq!(batch.cycle(), 4);
        assert_eq!(
            batch.kind_of(Path::new("/app/WEB-INF/web.xml")),
            Some(ChangeKind::Modified)
        );
        assert!(core.cycle().is_none());
    }

    #[test]
    fn zero_settle_cycles_reports_immediately() {
        let fs = seeded();
        let config = ScannerConfig {
            settle_cycles: 0,
            ..ScannerConfig::default()
        };
        let mut core = core(&fs, config);
        core.cycle();
        fs.add_file("/app/WEB-INF/classes/B.class", "b");
        let batch = core.cycle().expect("immediate batch");
        assert_eq!(batch.changes(), &[Change::new("/app/WEB-INF/classes/B.class", ChangeKind::Added)]);
    }

    #[test]
    fn report_existing_lists_everything_as_added() {
        let fs = seeded();
        let config = ScannerConfig {
            report_existing: true,
            ..ScannerConfig::default()
        };
        let mut core = core(&fs, config);
        assert!(core.cycle().is_none());
        let batch = core.cycle().expect("existing entries");
        assert_eq!(batch.len(), 2);
        assert!(batch.changes().iter().all(|c| c.kind == ChangeKind::Added));
    }

    #[test]
    fn create_then_delete_before_settling_is_dropped() {
        let fs = seeded();
        let mut core = core(&fs, ScannerConfig::default());
        core.cycle();

        fs.add_file("/app/WEB-INF/classes/Tmp.class", "t");
        assert!(core.cycle().is_none());
        fs.remove("/app/WEB-INF/classes/Tmp.class");
        assert!(core.cycle().is_none());
        assert_eq!(core.pending_len(), 0);
        assert!(core.cycle().is_none());
    }

    #[test]
    fn replacement_baselines_new_targets_silently() {
        let fs = seeded();
        fs.add_file("/app/build.toml", "[project]");
        let mut core = core(&fs, ScannerConfig::default());
        core.cycle();

        let mut next = watch_set();
        next.push(WatchTarget::file("/app/build.toml"));
        core.replace_watch_set(next);
        assert_eq!(core.watch_set().len(), 3);
        assert!(core.cycle().is_none());
        assert!(core.cycle().is_none());
    }
}
