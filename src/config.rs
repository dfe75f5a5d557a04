use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::trace;

use crate::check::{Check, Datasource};
use crate::error::ConfigError;
use crate::plugins;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory history (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database file (default)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./algoguard.db")
}

/// Declaration of a plugin backend (algorithmer or actioner)
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PluginConfig {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub params: HashMap<String, String>,

    /// Extra environment variables for spawned processes
    #[serde(default)]
    pub env_override: HashMap<String, String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub datasources: Vec<Datasource>,

    #[serde(default)]
    pub algorithmers: Vec<PluginConfig>,

    #[serde(default)]
    pub actioners: Vec<PluginConfig>,

    #[serde(default)]
    pub checks: Vec<Check>,

    /// Storage configuration (defaults to SQLite)
    #[serde(default)]
    pub storage: StorageConfig,

    /// Read API bind address
    #[serde(default = "crate::util::get_api_addr")]
    pub api_listen_addr: SocketAddr,

    /// Parent of the per-run working directories (system temp dir if unset)
    pub base_working_dir: Option<PathBuf>,

    /// How long the API may drain connections on shutdown
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

impl Config {
    /// Apply environment overrides on top of the loaded file
    pub fn apply_overrides(&mut self, api_addr: Option<SocketAddr>) {
        if let Some(addr) = api_addr {
            self.api_listen_addr = addr;
        }
    }

    /// Reject configurations that reference undeclared inventory
    ///
    /// Every check's algorithmer type, input datasources and actioner types
    /// must resolve, and every declared plugin type must be buildable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut datasources = HashSet::new();
        for datasource in &self.datasources {
            if datasource.name.is_empty() {
                return Err(ConfigError::EmptyDatasourceName);
            }
            datasources.insert(datasource.name.as_str());
        }

        let algorithmers = collect_plugin_types(
            "algorithmer",
            &self.algorithmers,
            plugins::is_supported_algorithmer,
        )?;
        let actioners =
            collect_plugin_types("actioner", &self.actioners, plugins::is_supported_actioner)?;

        let mut names = HashSet::new();
        for check in &self.checks {
            if check.name.is_empty() {
                return Err(ConfigError::EmptyCheckName);
            }
            if !names.insert(check.name.as_str()) {
                return Err(ConfigError::DuplicateCheck(check.name.clone()));
            }
            if check.interval.is_zero() {
                return Err(ConfigError::ZeroInterval(check.name.clone()));
            }
            if !algorithmers.contains(check.algorithmer_type.as_str()) {
                return Err(ConfigError::UndefinedAlgorithmer {
                    check: check.name.clone(),
                    algorithmer: check.algorithmer_type.clone(),
                });
            }
            for input in &check.inputs {
                if !datasources.contains(input.datasource.as_str()) {
                    return Err(ConfigError::UndefinedDatasource {
                        check: check.name.clone(),
                        datasource: input.datasource.clone(),
                    });
                }
            }
            for action in &check.actions {
                if !actioners.contains(action.actioner.as_str()) {
                    return Err(ConfigError::UndefinedActioner {
                        check: check.name.clone(),
                        actioner: action.actioner.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn collect_plugin_types<'a>(
    kind: &'static str,
    declared: &'a [PluginConfig],
    supported: fn(&str) -> bool,
) -> Result<HashSet<&'a str>, ConfigError> {
    let mut types = HashSet::new();
    for plugin in declared {
        if plugin.kind.is_empty() {
            return Err(ConfigError::EmptyPluginType(kind));
        }
        if !supported(&plugin.kind) {
            return Err(ConfigError::UnsupportedPluginType {
                kind,
                plugin: plugin.kind.clone(),
            });
        }
        types.insert(plugin.kind.as_str());
    }
    Ok(types)
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
