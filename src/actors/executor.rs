//! CheckExecutor - performs a single run of a check
//!
//! ## Run Flow
//!
//! ```text
//! resolve algorithmer → working dir → register cancellation → gather inputs
//!     → apply algorithm → [failure: dispatch every action] → persist output
//! ```
//!
//! The executor is shared by every runner. It never fails as a whole: each
//! problem ends up in the returned [`RunReport`], and the runner re-arms for
//! its next tick regardless.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

use crate::check::{ActionOutput, Check, CheckOutput, CheckStatus, Datasource};
use crate::datasource::DatasourceConnector;
use crate::error::{RunError, RunResult};
use crate::metrics::{CheckCounters, CheckMetrics};
use crate::plugins::{ActionerRegistry, AlgorithmerRegistry, Inputs};
use crate::storage::HistoryStore;

use super::cancellation::CancellationRegistry;
use super::messages::RunReport;

/// Shared context for check runs
pub struct CheckExecutor {
    datasources: HashMap<String, Datasource>,
    connector: Arc<dyn DatasourceConnector>,
    algorithmers: AlgorithmerRegistry,
    actioners: ActionerRegistry,
    store: Arc<dyn HistoryStore>,
    metrics: Arc<CheckMetrics>,
    cancellations: Arc<CancellationRegistry>,

    /// Parent of per-run working directories, system temp dir if `None`
    base_working_dir: Option<PathBuf>,
}

impl CheckExecutor {
    pub fn new(
        datasources: Vec<Datasource>,
        connector: Arc<dyn DatasourceConnector>,
        algorithmers: AlgorithmerRegistry,
        actioners: ActionerRegistry,
        store: Arc<dyn HistoryStore>,
        metrics: Arc<CheckMetrics>,
    ) -> Self {
        Self {
            datasources: datasources
                .into_iter()
                .map(|datasource| (datasource.name.clone(), datasource))
                .collect(),
            connector,
            algorithmers,
            actioners,
            store,
            metrics,
            cancellations: Arc::new(CancellationRegistry::new()),
            base_working_dir: None,
        }
    }

    pub fn with_base_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.base_working_dir = dir;
        self
    }

    pub fn cancellations(&self) -> &Arc<CancellationRegistry> {
        &self.cancellations
    }

    /// Run `check` once
    ///
    /// Counts the run as processed exactly once, whatever the outcome.
    #[instrument(skip_all, fields(check = %check.name))]
    pub async fn run(&self, check: &Check) -> RunReport {
        let counters = self.metrics.counters(&check.name);
        let report = self.execute(check, &counters).await;
        counters.inc_processed();
        report
    }

    async fn execute(&self, check: &Check, counters: &CheckCounters) -> RunReport {
        let Some(algorithmer) = self.algorithmers.get(&check.algorithmer_type) else {
            counters.inc_failed();
            return RunReport::aborted(RunError::AlgorithmerNotFound(
                check.algorithmer_type.clone(),
            ));
        };

        // Removed when dropped, on every exit path below
        let working_dir = match self.create_working_dir(&check.name) {
            Ok(dir) => dir,
            Err(e) => {
                warn!("unable to create working directory: {e}");
                counters.inc_failed();
                let mut diagnostics = Vec::new();
                let output = CheckOutput::failed(&check.name, e.to_string());
                let storage_key = self.persist(check, &output, &mut diagnostics).await;
                return RunReport {
                    output: Some(output),
                    storage_key,
                    error: Some(e),
                    diagnostics,
                };
            }
        };
        trace!("working directory {}", working_dir.path().display());

        let registration = self.cancellations.register(&check.name);
        let cancel = registration.token();

        let mut diagnostics = Vec::new();

        let inputs = match self.gather_inputs(check, cancel).await {
            Ok(inputs) => inputs,
            Err(e) => {
                warn!("unable to gather inputs: {e}");
                counters.inc_failed();
                let output = CheckOutput::failed(&check.name, e.to_string());
                let storage_key = self.persist(check, &output, &mut diagnostics).await;
                return RunReport {
                    output: Some(output),
                    storage_key,
                    error: Some(e),
                    diagnostics,
                };
            }
        };

        let (mut output, error) = match algorithmer
            .apply(
                cancel,
                &check.algorithm,
                &check.algorithm_params,
                &inputs,
                working_dir.path(),
            )
            .await
        {
            Ok(output) => (output, None),
            Err(e) => {
                let error = if cancel.is_cancelled() {
                    RunError::Cancelled
                } else {
                    RunError::Execution(format!("{e:#}"))
                };
                (CheckOutput::failed(&check.name, error.to_string()), Some(error))
            }
        };
        output.name = check.name.clone();

        if check.debug {
            debug!(
                return_code = output.return_code,
                "algorithm output:\n{}", output.combined_output
            );
        }

        if error.is_some() || output.return_code != 0 {
            output.status = CheckStatus::Failed;
            counters.inc_failed();
            self.dispatch_actions(check, &mut output, cancel, &working_dir, &mut diagnostics)
                .await;
        } else {
            counters.inc_succeeded();
        }

        let storage_key = self.persist(check, &output, &mut diagnostics).await;

        RunReport {
            output: Some(output),
            storage_key,
            error,
            diagnostics,
        }
    }

    /// Run every configured action in declaration order
    ///
    /// Unresolved actioners are skipped. Each action output is stored and
    /// its key appended to `output.action_keys`.
    async fn dispatch_actions(
        &self,
        check: &Check,
        output: &mut CheckOutput,
        cancel: &CancellationToken,
        working_dir: &TempDir,
        diagnostics: &mut Vec<RunError>,
    ) {
        let diagnostic_text = if output.combined_output.is_empty() {
            output.error.clone()
        } else {
            output.combined_output.clone()
        };

        for action in &check.actions {
            if cancel.is_cancelled() {
                warn!("run cancelled, skipping remaining actions");
                diagnostics.push(RunError::Cancelled);
                break;
            }

            let Some(actioner) = self.actioners.get(&action.actioner) else {
                error!("skipping action '{}': actioner type '{}' not found", action.name, action.actioner);
                diagnostics.push(RunError::ActionerNotFound(action.actioner.clone()));
                continue;
            };

            let action_output = match actioner
                .act(
                    cancel,
                    &action.action,
                    &diagnostic_text,
                    &action.params,
                    working_dir.path(),
                )
                .await
            {
                Ok(action_output) => action_output,
                Err(e) => {
                    error!("action '{}' failed: {e:#}", action.name);
                    ActionOutput::failed(format!("{e:#}"))
                }
            };

            if check.debug {
                debug!(
                    action = %action.name,
                    return_code = action_output.return_code,
                    "action output:\n{}", action_output.combined_output
                );
            }

            match self.store.put_action(&check.name, action, &action_output).await {
                Ok(key) => output.action_keys.push(key),
                Err(e) => {
                    error!("unable to store output of action '{}': {e}", action.name);
                    diagnostics.push(RunError::Storage(e));
                }
            }
        }
    }

    /// Query every input of `check` at one instant
    async fn gather_inputs(&self, check: &Check, cancel: &CancellationToken) -> RunResult<Inputs> {
        let at = Utc::now();
        let mut inputs = Inputs::new();

        for measurement in &check.inputs {
            let datasource = self
                .datasources
                .get(&measurement.datasource)
                .ok_or_else(|| RunError::DatasourceNotFound(measurement.datasource.clone()))?;

            let client = self.connector.connect(datasource).map_err(|e| {
                RunError::ClientConstruction {
                    datasource: datasource.name.clone(),
                    reason: format!("{e:#}"),
                }
            })?;

            let result = tokio::select! {
                result = client.query(&measurement.query, at) => {
                    result.map_err(|e| RunError::QueryFailed {
                        measurement: measurement.name.clone(),
                        reason: format!("{e:#}"),
                    })?
                }
                _ = cancel.cancelled() => return Err(RunError::Cancelled),
            };

            trace!("measurement '{}' returned {} series", measurement.name, result.len());
            inputs.insert(measurement.name.clone(), result);
        }

        Ok(inputs)
    }

    async fn persist(
        &self,
        check: &Check,
        output: &CheckOutput,
        diagnostics: &mut Vec<RunError>,
    ) -> Option<String> {
        match self.store.put_check(check, output).await {
            Ok(key) => Some(key),
            Err(e) => {
                error!("unable to store check output: {e}");
                diagnostics.push(RunError::Storage(e));
                None
            }
        }
    }

    fn create_working_dir(&self, check: &str) -> RunResult<TempDir> {
        let prefix = format!("algoguard-{}-", sanitize(check));
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match &self.base_working_dir {
            Some(base) => builder.tempdir_in(base)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

/// Keep check names usable as a directory-name prefix
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
