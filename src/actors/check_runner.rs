//! CheckRunnerActor - runs one check on its interval
//!
//! ## Lifecycle
//!
//! ```text
//! [immediate run] → stagger sleep → interval loop → shutdown
//!                                        ↑
//!                                        └─── Commands (RunNow)
//! ```
//!
//! Runs of one check never overlap: the actor performs each run inline, so a
//! slow run delays the next tick instead of queueing extra runs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::check::Check;

use super::executor::CheckExecutor;
use super::messages::{CheckCommand, CheckRunEvent, RunReport};

/// Actor driving a single check
pub struct CheckRunnerActor {
    check: Arc<Check>,

    executor: Arc<CheckExecutor>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<CheckCommand>,

    /// Broadcast sender for publishing run results
    event_tx: broadcast::Sender<CheckRunEvent>,

    /// Fires when the scheduler shuts down
    shutdown: CancellationToken,
}

impl CheckRunnerActor {
    pub fn new(
        check: Arc<Check>,
        executor: Arc<CheckExecutor>,
        command_rx: mpsc::Receiver<CheckCommand>,
        event_tx: broadcast::Sender<CheckRunEvent>,
    ) -> Self {
        let shutdown = executor.cancellations().shutdown_token();
        Self {
            check,
            executor,
            command_rx,
            event_tx,
            shutdown,
        }
    }

    /// Run the actor's main loop
    ///
    /// Exits on scheduler shutdown or when every handle has been dropped.
    #[instrument(skip(self), fields(check = %self.check.name))]
    pub async fn run(mut self) {
        debug!("starting check runner actor");

        if self.check.immediate && !self.shutdown.is_cancelled() {
            self.perform_run().await;
        }

        let stagger = stagger_delay(self.check.interval);
        debug!("staggering first tick by {stagger:?}");

        let stagger_sleep = sleep(stagger);
        tokio::pin!(stagger_sleep);
        loop {
            tokio::select! {
                _ = &mut stagger_sleep => break,
                _ = self.shutdown.cancelled() => {
                    debug!("shutdown during stagger");
                    return;
                }
                cmd = self.command_rx.recv() => {
                    if !self.handle_command(cmd).await {
                        return;
                    }
                }
            }
        }

        let mut ticker = interval_at(Instant::now() + self.check.interval, self.check.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("scheduler shutting down");
                    break;
                }

                // Timer tick - perform a run
                _ = ticker.tick() => {
                    self.perform_run().await;
                }

                cmd = self.command_rx.recv() => {
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
            }
        }

        debug!("check runner actor stopped");
    }

    /// Returns `false` when the actor should stop
    async fn handle_command(&mut self, cmd: Option<CheckCommand>) -> bool {
        match cmd {
            Some(CheckCommand::RunNow { respond_to }) => {
                debug!("received RunNow command");
                let report = self.perform_run().await;
                let _ = respond_to.send(report);
                true
            }
            None => {
                warn!("command channel closed, shutting down");
                false
            }
        }
    }

    async fn perform_run(&self) -> RunReport {
        let report = self.executor.run(&self.check).await;

        match &report.error {
            Some(e) => error!("check run failed: {e}"),
            None => info!(
                status = %report.status(),
                key = report.storage_key.as_deref().unwrap_or("-"),
                "check run finished"
            ),
        }
        for diagnostic in &report.diagnostics {
            warn!("{diagnostic}");
        }

        // No subscribers is fine
        let _ = self.event_tx.send(report.event(&self.check.name));

        report
    }
}

/// Uniform delay in `[0, interval)`
pub fn stagger_delay(interval: Duration) -> Duration {
    let nanos = interval.as_nanos().min(u64::MAX as u128) as u64;
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
}

/// Handle for controlling a CheckRunnerActor
#[derive(Clone)]
pub struct CheckHandle {
    sender: mpsc::Sender<CheckCommand>,
    check_name: String,
}

impl CheckHandle {
    /// Spawn a new runner for `check`
    pub fn spawn(
        check: Arc<Check>,
        executor: Arc<CheckExecutor>,
        event_tx: broadcast::Sender<CheckRunEvent>,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let check_name = check.name.clone();

        let actor = CheckRunnerActor::new(check, executor, cmd_rx, event_tx);
        let task = tokio::spawn(actor.run());

        (
            Self {
                sender: cmd_tx,
                check_name,
            },
            task,
        )
    }

    /// Run the check now and wait for its report
    pub async fn run_now(&self) -> Result<RunReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CheckCommand::RunNow { respond_to: tx })
            .await
            .context("check runner is not running")?;

        rx.await.context("check runner stopped before replying")
    }

    pub fn check_name(&self) -> &str {
        &self.check_name
    }
}
