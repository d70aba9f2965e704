// src/engine/queue.rs

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::engine::RedeployTrigger;
use crate::types::AppId;

/// Per-application bookkeeping of running and pending redeploys.
///
/// Semantics:
/// - At most one redeploy per application runs at a time.
/// - Requests that arrive while an application's redeploy is running are
///   coalesced into a single pending request (change batches merged).
/// - When the running redeploy finishes, the pending request (if any) is
///   handed back so it can start immediately.
///
/// Different applications never interact here.
#[derive(Debug, Default)]
pub struct RedeployQueue {
    in_flight: HashSet<AppId>,
    pending: BTreeMap<AppId, RedeployTrigger>,
}

impl RedeployQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self, app: &AppId) -> bool {
        self.in_flight.contains(app)
    }

    pub fn has_pending(&self, app: &AppId) -> bool {
        self.pending.contains_key(app)
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Record a redeploy request.
    ///
    /// Returns the trigger to run now, or `None` if the request was folded
    /// into the pending one because a redeploy is already running.
    pub fn request(&mut self, app: &AppId, trigger: RedeployTrigger) -> Option<RedeployTrigger> {
        if !self.in_flight.contains(app) {
            self.in_flight.insert(app.clone());
            return Some(trigger);
        }

        let merged = match self.pending.remove(app) {
            Some(existing) => existing.merge(trigger),
            None => trigger,
        };
        debug!(app = %app, "redeploy in flight; request coalesced");
        self.pending.insert(app.clone(), merged);
        None
    }

    /// Mark the running redeploy of `app` as finished.
    ///
    /// If a request is pending, the app stays in flight and that request is
    /// returned to be started.
    pub fn finish(&mut self, app: &AppId) -> Option<RedeployTrigger> {
        match self.pending.remove(app) {
            Some(next) => {
                debug!(app = %app, "starting coalesced redeploy");
                Some(next)
            }
            None => {
                self.in_flight.remove(app);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::{Change, ChangeBatch, ChangeKind};

    fn changes(app: &AppId, cycle: u64, path: &str) -> RedeployTrigger {
        RedeployTrigger::Changes(
            ChangeBatch::new(app.clone(), cycle, vec![Change::new(path, ChangeKind::Modified)])
                .unwrap(),
        )
    }

    #[test]
    fn requests_during_redeploy_coalesce_into_one() {
        let mut queue = RedeployQueue::new();
        let app = AppId::from("g:shop");

        assert!(queue.request(&app, changes(&app, 1, "/a")).is_some());
        assert!(queue.request(&app, changes(&app, 2, "/b")).is_none());
        assert!(queue.request(&app, changes(&app, 3, "/c")).is_none());

        let next = queue.finish(&app).expect("pending request");
        match next {
            RedeployTrigger::Changes(batch) => {
                assert_eq!(batch.len(), 2);
                assert_eq!(batch.cycle(), 3);
            }
            other => panic!("unexpected trigger {other:?}"),
        }
        assert!(queue.is_in_flight(&app));

        assert!(queue.finish(&app).is_none());
        assert!(!queue.is_in_flight(&app));
    }

    #[test]
    fn applications_are_independent() {
        let mut queue = RedeployQueue::new();
        let a = AppId::from("g:a");
        let b = AppId::from("g:b");

        assert!(queue.request(&a, RedeployTrigger::Manual).is_some());
        assert!(queue.request(&b, RedeployTrigger::Manual).is_some());
        assert_eq!(queue.in_flight_len(), 2);
        assert!(!queue.has_pending(&b));
    }

    #[test]
    fn manual_request_keeps_pending_changes() {
        let mut queue = RedeployQueue::new();
        let app = AppId::from("g:shop");
        queue.request(&app, RedeployTrigger::Manual);
        queue.request(&app, changes(&app, 4, "/web.xml"));
        queue.request(&app, RedeployTrigger::Manual);
        assert!(matches!(queue.finish(&app), Some(RedeployTrigger::Changes(_))));
    }
}
