//! History store for check and action outputs
//!
//! This module provides a trait-based abstraction for persisting the outcome
//! of every check run and every action invocation.
//!
//! ## Design
//!
//! - **Trait-based**: `HistoryStore` trait allows swapping implementations
//! - **Async**: All operations are async for compatibility with the runners
//! - **Partitioned**: One ordered partition per check, keyed by timestamp
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database file, survives restarts
//! - **In-Memory** (fallback): No persistence, for testing
//!
//! ## Usage
//!
//! ```no_run
//! use algoguard::storage::{HistoryStore, sqlite::SqliteHistoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SqliteHistoryStore::new("./algoguard.db").await?;
//!     let statuses = store.get_checks_status().await?;
//!     println!("{} checks", statuses.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

use std::sync::Arc;

pub use backend::HistoryStore;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryHistoryStore;

use crate::config::StorageConfig;

/// Open the history store selected by the configuration
pub async fn open(config: &StorageConfig) -> anyhow::Result<Arc<dyn HistoryStore>> {
    match config {
        StorageConfig::None => {
            tracing::warn!("history store is in-memory, history will not survive restarts");
            Ok(Arc::new(MemoryHistoryStore::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => Ok(Arc::new(sqlite::SqliteHistoryStore::new(path).await?)),
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite storage requested but the storage-sqlite feature is disabled")
        }
    }
}
