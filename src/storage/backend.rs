//! History store trait definition
//!
//! This module defines the core `HistoryStore` trait that all
//! storage implementations must implement.

use async_trait::async_trait;

use super::error::StorageResult;
use crate::check::{ActionMeta, ActionOutput, Check, CheckOutput};

/// Trait for history store backends
///
/// Check outputs are partitioned per check name and ordered by their
/// timestamp key inside a partition (see [`super::schema`]). Action outputs
/// are stored flat under a composite key.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`: every check runner writes through
/// the same store while the read API queries it. Reads must not wait on
/// unrelated writes for long; a single write serialization point is fine.
///
/// ## Error Handling
///
/// A missing check or key is reported as `StorageError::NotFound`, never as
/// an I/O or query failure, so callers can tell "nothing there" from
/// "the store is broken".
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist a check output under its timestamp key and return that key
    ///
    /// Creates the check's partition if needed. A second output for the
    /// same check within the same second replaces the first.
    async fn put_check(&self, check: &Check, output: &CheckOutput) -> StorageResult<String>;

    /// Persist an action output under `{check}_{action}_{timestamp}` and
    /// return that key
    async fn put_action(
        &self,
        check_name: &str,
        action: &ActionMeta,
        output: &ActionOutput,
    ) -> StorageResult<String>;

    /// Exact lookup of a check output
    async fn get_check(&self, name: &str, key: &str) -> StorageResult<CheckOutput>;

    /// Exact lookup of an action output
    async fn get_action(&self, key: &str) -> StorageResult<ActionOutput>;

    /// Lookup of an action output stored by `check_name`
    ///
    /// `NotFound` if the key is absent or was written by another check.
    async fn get_check_action(&self, check_name: &str, key: &str) -> StorageResult<ActionOutput>;

    /// Names of every check with at least one stored output
    async fn get_all_check_names(&self) -> StorageResult<Vec<String>>;

    /// Most recently stored output of a check, `None` if it has none
    async fn get_check_status(&self, name: &str) -> StorageResult<Option<CheckOutput>>;

    /// Latest output of every known check, in name enumeration order
    async fn get_checks_status(&self) -> StorageResult<Vec<CheckOutput>> {
        let mut statuses = Vec::new();
        for name in self.get_all_check_names().await? {
            if let Some(output) = self.get_check_status(&name).await? {
                statuses.push(output);
            }
        }
        Ok(statuses)
    }

    /// The `limit` most recent outputs of a check, newest first
    ///
    /// Fails with `NotFound` if the check has no partition.
    async fn get_named_check(&self, name: &str, limit: usize) -> StorageResult<Vec<CheckOutput>>;

    /// The `limit` most recent FAILED outputs of a check, newest first
    ///
    /// Fails with `NotFound` if the check has no partition.
    async fn get_named_check_failures(
        &self,
        name: &str,
        limit: usize,
    ) -> StorageResult<Vec<CheckOutput>>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
