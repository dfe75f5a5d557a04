//! Scheduler - owns one runner per configured check
//!
//! ```text
//!                    ┌─> CheckRunnerActor (check A) ─┐
//! Scheduler::start ──┼─> CheckRunnerActor (check B) ─┼─> broadcast<CheckRunEvent>
//!                    └─> CheckRunnerActor (check C) ─┘
//! ```
//!
//! Shutdown cancels every in-flight run through the executor's
//! [`CancellationRegistry`](super::cancellation::CancellationRegistry) and
//! waits for all runners to exit.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::check::Check;

use super::check_runner::CheckHandle;
use super::executor::CheckExecutor;
use super::messages::CheckRunEvent;

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct Scheduler {
    executor: Arc<CheckExecutor>,
    handles: Vec<CheckHandle>,
    tasks: Vec<JoinHandle<()>>,
    event_tx: broadcast::Sender<CheckRunEvent>,
}

impl Scheduler {
    /// Spawn a runner for every check
    pub fn start(checks: Vec<Check>, executor: Arc<CheckExecutor>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut handles = Vec::with_capacity(checks.len());
        let mut tasks = Vec::with_capacity(checks.len());
        for check in checks {
            debug!("scheduling check {} every {:?}", check.name, check.interval);
            let (handle, task) =
                CheckHandle::spawn(Arc::new(check), Arc::clone(&executor), event_tx.clone());
            handles.push(handle);
            tasks.push(task);
        }

        info!("scheduler started with {} checks", handles.len());

        Self {
            executor,
            handles,
            tasks,
            event_tx,
        }
    }

    /// Receive an event for every finished run
    pub fn subscribe(&self) -> broadcast::Receiver<CheckRunEvent> {
        self.event_tx.subscribe()
    }

    pub fn handle(&self, check: &str) -> Option<&CheckHandle> {
        self.handles.iter().find(|h| h.check_name() == check)
    }

    /// Cancel in-flight runs and stop every runner
    pub async fn shutdown(self) {
        info!("shutting down scheduler");

        self.executor.cancellations().cancel_all();

        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                warn!("check runner task failed: {e}");
            }
        }

        debug!("all check runners stopped");
    }
}
