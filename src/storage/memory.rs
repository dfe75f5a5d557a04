//! In-memory history store (no persistence)
//!
//! Mirrors the on-disk layout with ordered maps: one `BTreeMap` per check
//! keyed by timestamp key, plus a flat map of action outputs. Useful for
//! tests and for running without a database (`backend: "none"`).
//!
//! ## Limitations
//!
//! - **No persistence**: All history is lost on restart
//! - **Unbounded**: Nothing is ever evicted

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::backend::HistoryStore;
use super::error::{StorageError, StorageResult};
use super::schema::{action_key, timestamp_key};
use crate::check::{ActionMeta, ActionOutput, Check, CheckOutput, CheckStatus};

#[derive(Default)]
struct Partitions {
    checks: BTreeMap<String, BTreeMap<String, CheckOutput>>,
    /// key -> (owning check, output)
    actions: HashMap<String, (String, ActionOutput)>,
}

/// In-memory history store
#[derive(Default)]
pub struct MemoryHistoryStore {
    inner: RwLock<Partitions>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn newest_first(
        &self,
        name: &str,
        limit: usize,
        status: Option<CheckStatus>,
    ) -> StorageResult<Vec<CheckOutput>> {
        let inner = self.inner.read().await;
        let partition = inner
            .checks
            .get(name)
            .ok_or_else(|| StorageError::NotFound(format!("check '{name}'")))?;

        Ok(partition
            .values()
            .rev()
            .filter(|output| status.is_none_or(|s| output.status == s))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn put_check(&self, check: &Check, output: &CheckOutput) -> StorageResult<String> {
        let key = timestamp_key(&output.timestamp);
        trace!("storing output of {} under {}", check.name, key);

        self.inner
            .write()
            .await
            .checks
            .entry(check.name.clone())
            .or_default()
            .insert(key.clone(), output.clone());

        Ok(key)
    }

    async fn put_action(
        &self,
        check_name: &str,
        action: &ActionMeta,
        output: &ActionOutput,
    ) -> StorageResult<String> {
        let key = action_key(check_name, &action.name, &output.timestamp);
        self.inner
            .write()
            .await
            .actions
            .insert(key.clone(), (check_name.to_string(), output.clone()));
        Ok(key)
    }

    async fn get_check(&self, name: &str, key: &str) -> StorageResult<CheckOutput> {
        self.inner
            .read()
            .await
            .checks
            .get(name)
            .and_then(|partition| partition.get(key))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("check '{name}' key '{key}'")))
    }

    async fn get_action(&self, key: &str) -> StorageResult<ActionOutput> {
        self.inner
            .read()
            .await
            .actions
            .get(key)
            .map(|(_, output)| output.clone())
            .ok_or_else(|| StorageError::NotFound(format!("action '{key}'")))
    }

    async fn get_check_action(&self, check_name: &str, key: &str) -> StorageResult<ActionOutput> {
        self.inner
            .read()
            .await
            .actions
            .get(key)
            .filter(|(owner, _)| owner == check_name)
            .map(|(_, output)| output.clone())
            .ok_or_else(|| {
                StorageError::NotFound(format!("action '{key}' of check '{check_name}'"))
            })
    }

    async fn get_all_check_names(&self) -> StorageResult<Vec<String>> {
        Ok(self.inner.read().await.checks.keys().cloned().collect())
    }

    async fn get_check_status(&self, name: &str) -> StorageResult<Option<CheckOutput>> {
        Ok(self
            .inner
            .read()
            .await
            .checks
            .get(name)
            .and_then(|partition| partition.values().next_back())
            .cloned())
    }

    async fn get_named_check(&self, name: &str, limit: usize) -> StorageResult<Vec<CheckOutput>> {
        self.newest_first(name, limit, None).await
    }

    async fn get_named_check_failures(
        &self,
        name: &str,
        limit: usize,
    ) -> StorageResult<Vec<CheckOutput>> {
        self.newest_first(name, limit, Some(CheckStatus::Failed))
            .await
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory history store (no-op)");
        Ok(())
    }
}
