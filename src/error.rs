//! Error types for check runs and configuration
//!
//! Configuration errors are fatal at startup. Everything else is recovered
//! per run: the runner logs it, counts the run as failed and re-arms for the
//! next tick. No run error ever crosses over into another check.

use thiserror::Error;

use crate::storage::StorageError;

/// Convenience alias for results of a single check run.
pub type RunResult<T> = std::result::Result<T, RunError>;

/// Coarse classification of a [`RunError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced plugin is not registered
    Resolution,
    /// Gathering inputs from a datasource failed
    Input,
    /// The algorithm or action itself failed
    Execution,
    /// The history store failed
    Storage,
}

/// Why a check run did not complete normally
#[derive(Error, Debug)]
pub enum RunError {
    #[error("algorithmer type '{0}' not found")]
    AlgorithmerNotFound(String),

    #[error("actioner type '{0}' not found")]
    ActionerNotFound(String),

    #[error("datasource '{0}' not found")]
    DatasourceNotFound(String),

    #[error("failed to create client for datasource '{datasource}': {reason}")]
    ClientConstruction { datasource: String, reason: String },

    #[error("query for measurement '{measurement}' failed: {reason}")]
    QueryFailed { measurement: String, reason: String },

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("unable to create working directory: {0}")]
    WorkingDirectory(#[from] std::io::Error),

    #[error("run cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::AlgorithmerNotFound(_) | RunError::ActionerNotFound(_) => {
                ErrorKind::Resolution
            }
            RunError::DatasourceNotFound(_)
            | RunError::ClientConstruction { .. }
            | RunError::QueryFailed { .. } => ErrorKind::Input,
            RunError::Execution(_) | RunError::WorkingDirectory(_) | RunError::Cancelled => {
                ErrorKind::Execution
            }
            RunError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Semantic problems in the configuration file
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("datasource name cannot be empty")]
    EmptyDatasourceName,

    #[error("{0} type cannot be empty")]
    EmptyPluginType(&'static str),

    #[error("{kind} type '{plugin}' is not supported")]
    UnsupportedPluginType { kind: &'static str, plugin: String },

    #[error("check name cannot be empty")]
    EmptyCheckName,

    #[error("check '{0}' is declared more than once")]
    DuplicateCheck(String),

    #[error("check '{0}' must have a non-zero interval")]
    ZeroInterval(String),

    #[error("check '{check}' uses undefined algorithmer type '{algorithmer}'")]
    UndefinedAlgorithmer { check: String, algorithmer: String },

    #[error("check '{check}' uses undefined datasource '{datasource}'")]
    UndefinedDatasource { check: String, datasource: String },

    #[error("check '{check}' uses undefined actioner type '{actioner}'")]
    UndefinedActioner { check: String, actioner: String },
}
