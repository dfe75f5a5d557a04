//! Message types for actor communication
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to one runner via mpsc
//! 2. **Events**: Broadcast notifications published after every run
//! 3. **Immutability**: Events are cloneable for multi-subscriber patterns

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::check::{CheckOutput, CheckStatus};
use crate::error::RunError;

/// Event published when a check run finishes
///
/// Subscribers may lag and miss events; the history store is the
/// authoritative record.
#[derive(Debug, Clone)]
pub struct CheckRunEvent {
    pub check_name: String,

    pub status: CheckStatus,

    /// Key of the persisted output, `None` if nothing was stored
    pub storage_key: Option<String>,

    /// Failure reason, if the run had one
    pub error: Option<String>,

    pub finished_at: DateTime<Utc>,
}

/// Commands that can be sent to a CheckRunnerActor
#[derive(Debug)]
pub enum CheckCommand {
    /// Run the check now, outside its interval
    ///
    /// Queued behind a run already in progress; runs never overlap.
    RunNow {
        respond_to: oneshot::Sender<RunReport>,
    },
}

/// Everything a single check run produced
#[derive(Debug)]
pub struct RunReport {
    /// Output record of the run; `None` if the run aborted before one
    /// could be produced
    pub output: Option<CheckOutput>,

    /// Key the output was stored under
    pub storage_key: Option<String>,

    /// Why the run failed, if it failed for a reason other than the
    /// algorithm's return code
    pub error: Option<RunError>,

    /// Problems that did not change the run's classification (skipped
    /// actions, storage failures)
    pub diagnostics: Vec<RunError>,
}

impl RunReport {
    pub(crate) fn aborted(error: RunError) -> Self {
        Self {
            output: None,
            storage_key: None,
            error: Some(error),
            diagnostics: Vec::new(),
        }
    }

    pub fn status(&self) -> CheckStatus {
        match &self.output {
            Some(output) => output.status,
            None => CheckStatus::Failed,
        }
    }

    pub fn event(&self, check_name: &str) -> CheckRunEvent {
        CheckRunEvent {
            check_name: check_name.to_string(),
            status: self.status(),
            storage_key: self.storage_key.clone(),
            error: self.error.as_ref().map(ToString::to_string),
            finished_at: Utc::now(),
        }
    }
}
