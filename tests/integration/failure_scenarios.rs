//! Runs against real Prometheus endpoints (mocked) and broken inventory

use std::sync::Arc;

use algoguard::check::CheckStatus;
use algoguard::datasource::PrometheusConnector;
use algoguard::error::{ErrorKind, RunError};
use algoguard::storage::HistoryStore;
use assert_matches::assert_matches;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::helpers::{StubAlgorithmer, create_harness, create_test_check, prom};

#[tokio::test]
async fn test_inputs_are_collected_from_prometheus() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .and(query_param("query", "errors_total"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    { "metric": { "__name__": "errors_total", "job": "api" }, "value": [1700000000, "3"] }
                ]
            }
        })))
        .mount(&server)
        .await;

    let algorithmer = Arc::new(StubAlgorithmer::returning(0));
    let harness = create_harness(
        algorithmer.clone(),
        Arc::new(PrometheusConnector::new().unwrap()),
        prom(&server.uri()),
    );

    let report = harness
        .executor
        .run(&create_test_check("api-errors", &[]))
        .await;
    assert!(report.error.is_none(), "{:?}", report.error);

    let seen = algorithmer.inputs_seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0]["errors"].get(r#"errors_total{job="api"}"#).map(String::as_str),
        Some("3")
    );
}

#[tokio::test]
async fn test_unreachable_datasource_records_failed_output() {
    let harness = create_harness(
        Arc::new(StubAlgorithmer::returning(0)),
        Arc::new(PrometheusConnector::new().unwrap()),
        // Nothing listens on the discard port
        prom("http://127.0.0.1:9"),
    );

    let report = harness
        .executor
        .run(&create_test_check("unreachable", &["restart"]))
        .await;

    let error = report.error.expect("run should fail");
    assert_eq!(error.kind(), ErrorKind::Input);
    assert_matches!(error, RunError::QueryFailed { .. });

    let stored = harness
        .store
        .get_check_status("unreachable")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, CheckStatus::Failed);
    assert_eq!(stored.return_code, -1);
    assert!(!stored.error.is_empty());

    // Input failures never reach the actioners
    assert!(harness.actioner.calls.lock().unwrap().is_empty());
    assert_eq!(harness.metrics.snapshot("unreachable").failed, 1);
}

#[tokio::test]
async fn test_prometheus_error_status_fails_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "parse error"
        })))
        .mount(&server)
        .await;

    let harness = create_harness(
        Arc::new(StubAlgorithmer::returning(0)),
        Arc::new(PrometheusConnector::new().unwrap()),
        prom(&server.uri()),
    );

    let report = harness
        .executor
        .run(&create_test_check("bad-query", &[]))
        .await;

    assert_matches!(report.error, Some(RunError::QueryFailed { ref measurement, .. }) if measurement == "errors");
    assert_eq!(report.status(), CheckStatus::Failed);
}

#[tokio::test]
async fn test_invalid_datasource_url_is_client_construction_error() {
    let harness = create_harness(
        Arc::new(StubAlgorithmer::returning(0)),
        Arc::new(PrometheusConnector::new().unwrap()),
        prom("not a url"),
    );

    let report = harness
        .executor
        .run(&create_test_check("bad-url", &[]))
        .await;

    assert_matches!(report.error, Some(RunError::ClientConstruction { ref datasource, .. }) if datasource == "prom");
}

#[tokio::test]
async fn test_unknown_algorithmer_persists_nothing() {
    let harness = create_harness(
        Arc::new(StubAlgorithmer::returning(0)),
        Arc::new(PrometheusConnector::new().unwrap()),
        prom("http://127.0.0.1:9"),
    );

    let mut check = create_test_check("orphan", &[]);
    check.algorithmer_type = "r".to_string();

    let report = harness.executor.run(&check).await;

    assert_matches!(report.error, Some(RunError::AlgorithmerNotFound(ref t)) if t == "r");
    assert!(report.output.is_none());
    assert!(harness.store.get_all_check_names().await.unwrap().is_empty());

    let counters = harness.metrics.snapshot("orphan");
    assert_eq!((counters.processed, counters.failed), (1, 1));
}
