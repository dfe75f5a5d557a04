//! Python script backend for algorithmers and actioners
//!
//! Each invocation writes `inputs.json` and `params.json` into the run's
//! working directory and executes `<directory>/<name>.py --inputs inputs.json
//! --params params.json` with the working directory as cwd.
//!
//! ## Parameters
//!
//! - `directory`: where the scripts live
//! - `venv`: optional virtualenv, its `bin/python` is used as interpreter
//! - `interpreter`: explicit interpreter, overrides `venv`
//!
//! `env_override` entries are added to the inherited environment. The child
//! is killed as soon as the run is cancelled.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use super::{Actioner, Algorithmer, Inputs};
use crate::check::{ActionOutput, CheckOutput};
use crate::config::PluginConfig;

const INPUTS_FILE: &str = "inputs.json";
const PARAMS_FILE: &str = "params.json";

/// Runs scripts from one directory with one interpreter
#[derive(Debug, Clone)]
struct ScriptRunner {
    interpreter: PathBuf,
    directory: PathBuf,
    env_override: HashMap<String, String>,
}

/// Output of one script execution
struct ScriptOutcome {
    combined_output: String,
    return_code: i32,
}

impl ScriptRunner {
    fn new(config: &PluginConfig) -> Self {
        let interpreter = match (config.params.get("interpreter"), config.params.get("venv")) {
            (Some(interpreter), _) => PathBuf::from(interpreter),
            (None, Some(venv)) if !venv.is_empty() => Path::new(venv).join("bin").join("python"),
            _ => PathBuf::from("python"),
        };

        Self {
            interpreter,
            directory: config
                .params
                .get("directory")
                .map(PathBuf::from)
                .unwrap_or_default(),
            env_override: config.env_override.clone(),
        }
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        script: &str,
        inputs: &[u8],
        params: &HashMap<String, String>,
        working_dir: &Path,
    ) -> Result<ScriptOutcome> {
        let params = serde_json::to_vec(params).context("error marshalling params to JSON")?;

        tokio::fs::write(working_dir.join(INPUTS_FILE), inputs)
            .await
            .context("error writing inputs file")?;
        tokio::fs::write(working_dir.join(PARAMS_FILE), params)
            .await
            .context("error writing params file")?;

        let script_path = self.directory.join(format!("{script}.py"));
        trace!("running {} {}", self.interpreter.display(), script_path.display());

        let child = Command::new(&self.interpreter)
            .arg(&script_path)
            .args(["--inputs", INPUTS_FILE, "--params", PARAMS_FILE])
            .current_dir(working_dir)
            .envs(&self.env_override)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.interpreter.display()))?;

        let output = tokio::select! {
            output = child.wait_with_output() => output.context("failed to wait for script")?,
            _ = cancel.cancelled() => bail!("script '{script}' cancelled"),
        };

        let mut combined_output = String::from_utf8_lossy(&output.stdout).into_owned();
        combined_output.push_str(&String::from_utf8_lossy(&output.stderr));

        // `None` means the process was terminated by a signal
        let return_code = output.status.code().unwrap_or(-1);
        debug!("script '{script}' exited with {return_code}");

        Ok(ScriptOutcome {
            combined_output,
            return_code,
        })
    }
}

/// Algorithmer running Python scripts
#[derive(Debug, Clone)]
pub struct PythonAlgorithmer {
    runner: ScriptRunner,
}

impl PythonAlgorithmer {
    pub fn new(config: &PluginConfig) -> Self {
        Self {
            runner: ScriptRunner::new(config),
        }
    }
}

pub fn build_algorithmer(config: &PluginConfig) -> Arc<dyn Algorithmer> {
    Arc::new(PythonAlgorithmer::new(config))
}

#[async_trait]
impl Algorithmer for PythonAlgorithmer {
    #[instrument(skip_all, fields(algorithm = %algorithm))]
    async fn apply(
        &self,
        cancel: &CancellationToken,
        algorithm: &str,
        params: &HashMap<String, String>,
        inputs: &Inputs,
        working_dir: &Path,
    ) -> Result<CheckOutput> {
        let timestamp = Utc::now();
        let inputs = serde_json::to_vec(inputs).context("error marshalling inputs to JSON")?;

        let outcome = self
            .runner
            .run(cancel, algorithm, &inputs, params, working_dir)
            .await?;

        Ok(CheckOutput::from_return_code(
            timestamp,
            outcome.combined_output,
            outcome.return_code,
            None,
        ))
    }
}

/// Actioner running Python scripts
#[derive(Debug, Clone)]
pub struct PythonActioner {
    runner: ScriptRunner,
}

impl PythonActioner {
    pub fn new(config: &PluginConfig) -> Self {
        Self {
            runner: ScriptRunner::new(config),
        }
    }
}

pub fn build_actioner(config: &PluginConfig) -> Arc<dyn Actioner> {
    Arc::new(PythonActioner::new(config))
}

#[async_trait]
impl Actioner for PythonActioner {
    #[instrument(skip_all, fields(action = %action))]
    async fn act(
        &self,
        cancel: &CancellationToken,
        action: &str,
        diagnostic: &str,
        params: &HashMap<String, String>,
        working_dir: &Path,
    ) -> Result<ActionOutput> {
        let timestamp = Utc::now();

        let outcome = self
            .runner
            .run(cancel, action, diagnostic.as_bytes(), params, working_dir)
            .await?;

        Ok(ActionOutput {
            timestamp,
            combined_output: outcome.combined_output,
            return_code: outcome.return_code,
            error: String::new(),
        })
    }
}
