//! Cancellation registry for in-flight check runs
//!
//! Every run registers a token under its check name for as long as it is
//! running. Shutdown cancels the registry's root token, which every run
//! token descends from, so runs that start after shutdown begin already
//! cancelled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Check name → cancellation token of its in-flight run
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    runs: Mutex<HashMap<String, (u64, CancellationToken)>>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run of `check`
    ///
    /// The entry is removed when the returned guard is dropped.
    pub fn register(self: &Arc<Self>, check: &str) -> RunRegistration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown.child_token();
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(check.to_string(), (id, token.clone()));

        RunRegistration {
            registry: Arc::clone(self),
            check: check.to_string(),
            id,
            token,
        }
    }

    /// Cancel every in-flight run and every run started from now on
    pub fn cancel_all(&self) {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        for (check, (_, token)) in runs.iter() {
            info!("cancelling in-flight run of {check}");
            token.cancel();
        }
        drop(runs);

        self.shutdown.cancel();
    }

    /// Token that fires once [`cancel_all`](Self::cancel_all) is called
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Names of checks with a run in flight
    pub fn active(&self) -> Vec<String> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = runs.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Registration of one in-flight run
pub struct RunRegistration {
    registry: Arc<CancellationRegistry>,
    check: String,
    id: u64,
    token: CancellationToken,
}

impl RunRegistration {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for RunRegistration {
    fn drop(&mut self) {
        debug!("run of {} finished, clearing cancellation", self.check);
        let mut runs = self.registry.runs.lock().unwrap_or_else(|e| e.into_inner());
        // A newer run of the same check may have replaced our entry
        if runs.get(&self.check).is_some_and(|(id, _)| *id == self.id) {
            runs.remove(&self.check);
        }
    }
}
