//! Check data model
//!
//! Everything a check run consumes (datasources, measurements, plugin
//! references) and everything it produces (`CheckOutput`, `ActionOutput`).
//! Definitions are loaded once from the configuration file and are immutable
//! for the lifetime of the process; outputs are created once per run and
//! handed to the history store.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named metrics backend endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datasource {
    pub name: String,
    pub url: String,
}

/// One input a check needs: which datasource to ask and what to ask it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub datasource: String,
    pub query: String,
}

/// Outcome of evaluating one measurement at one instant
///
/// Maps the label-set text of every returned series to its value text.
/// Ordered so the JSON handed to algorithms is deterministic.
pub type MeasurementResult = BTreeMap<String, String>;

/// A remediation step attached to a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMeta {
    pub name: String,

    /// Type of the actioner that performs this step (e.g. "python")
    pub actioner: String,

    /// Action identifier passed to the actioner (script name for "python")
    pub action: String,

    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// A named, independently scheduled check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,

    #[serde(default)]
    pub inputs: Vec<Measurement>,

    pub algorithmer_type: String,

    pub algorithm: String,

    #[serde(default)]
    pub algorithm_params: HashMap<String, String>,

    /// Invoked in declaration order when a run fails
    #[serde(default)]
    pub actions: Vec<ActionMeta>,

    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Run once right away instead of waiting for the first interval
    #[serde(default)]
    pub immediate: bool,

    /// Log combined algorithm/action output at debug level
    #[serde(default)]
    pub debug: bool,
}

/// Classification of a check run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Successful,
    Failed,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Successful => "SUCCESSFUL",
            CheckStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted record of one check run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutput {
    /// Name of the check that produced this output
    #[serde(default)]
    pub name: String,

    pub status: CheckStatus,

    pub timestamp: DateTime<Utc>,

    /// Combined stdout/stderr of the algorithm
    #[serde(default)]
    pub combined_output: String,

    pub return_code: i32,

    /// Error text, empty when the run produced none
    #[serde(default)]
    pub error: String,

    /// Store keys of the action outputs produced during this run
    #[serde(default)]
    pub action_keys: Vec<String>,
}

impl CheckOutput {
    /// Build an output from an algorithm's raw result
    ///
    /// The status follows the return code; `name` and `action_keys` are
    /// filled in by the executor.
    pub fn from_return_code(
        timestamp: DateTime<Utc>,
        combined_output: String,
        return_code: i32,
        error: Option<String>,
    ) -> Self {
        let status = if return_code == 0 && error.is_none() {
            CheckStatus::Successful
        } else {
            CheckStatus::Failed
        };

        Self {
            name: String::new(),
            status,
            timestamp,
            combined_output,
            return_code,
            error: error.unwrap_or_default(),
            action_keys: Vec::new(),
        }
    }

    /// A failed output for a run that never got a result from its algorithm
    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: CheckStatus::Failed,
            timestamp: Utc::now(),
            combined_output: String::new(),
            return_code: -1,
            error: error.into(),
            action_keys: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == CheckStatus::Failed
    }
}

/// The persisted record of one action invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutput {
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub combined_output: String,

    pub return_code: i32,

    #[serde(default)]
    pub error: String,
}

impl ActionOutput {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            combined_output: String::new(),
            return_code: -1,
            error: error.into(),
        }
    }
}
