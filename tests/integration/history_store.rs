//! SQLite history store: ordering, limits, failure filtering, persistence

use std::collections::HashMap;
use std::time::Duration;

use algoguard::check::{ActionMeta, ActionOutput, Check, CheckOutput, CheckStatus};
use algoguard::storage::sqlite::SqliteHistoryStore;
use algoguard::storage::{HistoryStore, StorageError};
use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

const BASE: i64 = 1_700_000_000;

fn check(name: &str) -> Check {
    Check {
        name: name.to_string(),
        inputs: Vec::new(),
        algorithmer_type: "python".to_string(),
        algorithm: "threshold".to_string(),
        algorithm_params: HashMap::new(),
        actions: Vec::new(),
        interval: Duration::from_secs(60),
        immediate: false,
        debug: false,
    }
}

fn output(name: &str, offset: i64, return_code: i32) -> CheckOutput {
    let mut output = CheckOutput::from_return_code(
        Utc.timestamp_opt(BASE + offset, 0).unwrap(),
        format!("run {offset}"),
        return_code,
        None,
    );
    output.name = name.to_string();
    output
}

async fn seeded_store(dir: &std::path::Path) -> SqliteHistoryStore {
    let store = SqliteHistoryStore::new(dir.join("history.db")).await.unwrap();
    let disk = check("disk");

    // Written out of order on purpose
    for (offset, rc) in [(120, 0), (0, 0), (240, 3), (60, 1), (180, 0)] {
        store.put_check(&disk, &output("disk", offset, rc)).await.unwrap();
    }
    store
        .put_check(&check("cpu"), &output("cpu", 30, 0))
        .await
        .unwrap();

    store
}

#[tokio::test]
async fn test_named_check_is_newest_first_and_limited() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path()).await;

    let recent = store.get_named_check("disk", 3).await.unwrap();
    let runs: Vec<_> = recent.iter().map(|o| o.combined_output.as_str()).collect();
    assert_eq!(runs, vec!["run 240", "run 180", "run 120"]);

    let all = store.get_named_check("disk", 100).await.unwrap();
    assert_eq!(all.len(), 5);
}

#[tokio::test]
async fn test_failures_are_filtered() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path()).await;

    let failures = store.get_named_check_failures("disk", 10).await.unwrap();
    let codes: Vec<_> = failures.iter().map(|o| o.return_code).collect();
    assert_eq!(codes, vec![3, 1]);
    assert!(failures.iter().all(|o| o.status == CheckStatus::Failed));

    assert!(store.get_named_check_failures("cpu", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_matches_most_recent_output() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path()).await;

    for name in ["disk", "cpu"] {
        let status = store.get_check_status(name).await.unwrap().unwrap();
        let newest = store.get_named_check(name, 1).await.unwrap();
        assert_eq!(vec![status], newest);
    }

    let mut names = store.get_all_check_names().await.unwrap();
    names.sort();
    assert_eq!(names, vec!["cpu", "disk"]);

    let statuses = store.get_checks_status().await.unwrap();
    assert_eq!(statuses.len(), 2);
}

#[tokio::test]
async fn test_unknown_check() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path()).await;

    assert_matches!(
        store.get_named_check("memory", 5).await,
        Err(StorageError::NotFound(_))
    );
    assert_matches!(
        store.get_named_check_failures("memory", 5).await,
        Err(StorageError::NotFound(_))
    );
    assert!(store.get_check_status("memory").await.unwrap().is_none());
}

#[tokio::test]
async fn test_action_outputs_round_trip_and_survive_reopen() {
    let dir = tempdir().unwrap();
    let action = ActionMeta {
        name: "restart".to_string(),
        actioner: "python".to_string(),
        action: "restart_service".to_string(),
        params: HashMap::new(),
    };
    let action_output = ActionOutput {
        timestamp: Utc.timestamp_opt(BASE, 0).unwrap(),
        combined_output: "restarted".to_string(),
        return_code: 0,
        error: String::new(),
    };

    let key = {
        let store = seeded_store(dir.path()).await;
        let key = store
            .put_action("disk", &action, &action_output)
            .await
            .unwrap();
        store.close().await.unwrap();
        key
    };
    assert!(key.starts_with("disk_restart_"));

    let reopened = SqliteHistoryStore::new(dir.path().join("history.db"))
        .await
        .unwrap();
    assert_eq!(reopened.get_action(&key).await.unwrap(), action_output);
    assert_eq!(
        reopened.get_check_action("disk", &key).await.unwrap(),
        action_output
    );
    assert_matches!(
        reopened.get_check_action("cpu", &key).await,
        Err(StorageError::NotFound(_))
    );
    assert_eq!(reopened.get_named_check("disk", 10).await.unwrap().len(), 5);
    assert_matches!(
        reopened.get_action("disk_restart_missing").await,
        Err(StorageError::NotFound(_))
    );
}

#[tokio::test]
async fn test_action_owner_is_exact() {
    let dir = tempdir().unwrap();
    let store = seeded_store(dir.path()).await;
    let page = ActionMeta {
        name: "page".to_string(),
        actioner: "python".to_string(),
        action: "alert".to_string(),
        params: HashMap::new(),
    };
    let paged = ActionOutput {
        timestamp: Utc.timestamp_opt(BASE, 0).unwrap(),
        combined_output: "paged".to_string(),
        return_code: 0,
        error: String::new(),
    };

    let key = store.put_action("disk_x", &page, &paged).await.unwrap();
    assert!(key.starts_with("disk_"));

    assert_matches!(
        store.get_check_action("disk", &key).await,
        Err(StorageError::NotFound(_))
    );
    assert_eq!(store.get_check_action("disk_x", &key).await.unwrap(), paged);
}
