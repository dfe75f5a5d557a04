//! Integration tests for API endpoints
//!
//! These tests run real check runs through the scheduler and read the
//! results back over HTTP.

use std::sync::Arc;
use std::time::Duration;

use algoguard::actors::Scheduler;
use algoguard::api::{ApiConfig, ApiServer, ApiState, spawn_api_server};
use algoguard::check::{ActionOutput, CheckOutput, CheckStatus};
use reqwest::StatusCode;
use serde_json::Value;

use super::helpers::{
    StaticConnector, StubAlgorithmer, TestHarness, create_harness, create_test_check, prom,
};

async fn spawn_test_api(harness: &TestHarness) -> ApiServer {
    let state = ApiState::new(harness.store.clone(), harness.metrics.clone());

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        enable_cors: true,
    };

    spawn_api_server(config, state).await.unwrap()
}

/// Run `check` once through the scheduler so the store has history
async fn run_once(harness: &TestHarness, name: &str, actions: &[&str]) {
    let mut check = create_test_check(name, actions);
    check.immediate = false;

    let scheduler = Scheduler::start(vec![check], harness.executor.clone());
    scheduler.handle(name).unwrap().run_now().await.unwrap();
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = create_harness(
        Arc::new(StubAlgorithmer::returning(0)),
        Arc::new(StaticConnector),
        prom("http://localhost:9090"),
    );
    let server = spawn_test_api(&harness).await;

    let url = format!("http://{}/api/v1/health", server.local_addr());
    let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");

    server.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_check_history_and_actions() {
    let harness = create_harness(
        Arc::new(StubAlgorithmer::returning(2)),
        Arc::new(StaticConnector),
        prom("http://localhost:9090"),
    );
    run_once(&harness, "disk", &["restart"]).await;

    let server = spawn_test_api(&harness).await;
    let base = format!("http://{}", server.local_addr());

    let checks: Vec<CheckOutput> = reqwest::get(format!("{base}/api/v1/checks"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].name, "disk");
    assert_eq!(checks[0].status, CheckStatus::Failed);

    let failures: Vec<CheckOutput> = reqwest::get(format!("{base}/api/v1/checks/disk/failures"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(failures, checks);

    let key = &checks[0].action_keys[0];
    let action: ActionOutput = reqwest::get(format!("{base}/api/v1/checks/disk/actions/{key}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(action.combined_output, "restart handled: threshold exited with 2");

    let metrics = reqwest::get(format!("{base}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains(r#"algoguard_checks_failed_total{check="disk"} 1"#));

    server.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_unknown_check_returns_404() {
    let harness = create_harness(
        Arc::new(StubAlgorithmer::returning(0)),
        Arc::new(StaticConnector),
        prom("http://localhost:9090"),
    );
    let server = spawn_test_api(&harness).await;

    let response = reqwest::get(format!("http://{}/api/v1/checks/ghost", server.local_addr()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("ghost"));

    server.stop(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_empty_store_lists_no_checks() {
    let harness = create_harness(
        Arc::new(StubAlgorithmer::returning(0)),
        Arc::new(StaticConnector),
        prom("http://localhost:9090"),
    );
    let server = spawn_test_api(&harness).await;

    let checks: Vec<Value> = reqwest::get(format!("http://{}/api/v1/checks", server.local_addr()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(checks.is_empty());

    server.stop(Duration::from_secs(1)).await;
}
