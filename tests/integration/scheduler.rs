//! Scheduler lifecycle: immediate runs, action dispatch, concurrency,
//! on-demand runs and shutdown

use std::sync::Arc;
use std::time::Duration;

use algoguard::actors::{CheckRunEvent, Scheduler};
use algoguard::check::CheckStatus;
use algoguard::storage::HistoryStore;
use pretty_assertions::assert_eq;
use tokio::sync::{Barrier, broadcast};
use tokio::time::{Instant, sleep, timeout};

use super::helpers::{StaticConnector, StubAlgorithmer, create_harness, create_test_check, prom};

async fn next_event(rx: &mut broadcast::Receiver<CheckRunEvent>) -> CheckRunEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a run")
        .expect("event channel closed")
}

#[tokio::test]
async fn test_immediate_successful_run() {
    let harness = create_harness(
        Arc::new(StubAlgorithmer::returning(0)),
        Arc::new(StaticConnector),
        prom("http://localhost:9090"),
    );

    let scheduler = Scheduler::start(
        vec![create_test_check("api-errors", &["restart"])],
        harness.executor.clone(),
    );
    let mut events = scheduler.subscribe();

    let event = next_event(&mut events).await;
    assert_eq!(event.check_name, "api-errors");
    assert_eq!(event.status, CheckStatus::Successful);
    assert!(event.error.is_none());

    let status = harness
        .store
        .get_check_status("api-errors")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, CheckStatus::Successful);
    assert_eq!(status.combined_output, "threshold exited with 0");
    assert!(harness.actioner.calls.lock().unwrap().is_empty());

    let counters = harness.metrics.snapshot("api-errors");
    assert_eq!((counters.processed, counters.succeeded, counters.failed), (1, 1, 0));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_failing_run_dispatches_all_actions_in_order() {
    let harness = create_harness(
        Arc::new(StubAlgorithmer::returning(7)),
        Arc::new(StaticConnector),
        prom("http://localhost:9090"),
    );

    let scheduler = Scheduler::start(
        vec![create_test_check("disk", &["restart", "notify", "page"])],
        harness.executor.clone(),
    );
    let mut events = scheduler.subscribe();

    let event = next_event(&mut events).await;
    assert_eq!(event.status, CheckStatus::Failed);

    assert_eq!(
        harness.actioner.calls.lock().unwrap().clone(),
        vec!["restart", "notify", "page"]
    );

    let output = harness
        .store
        .get_check("disk", &event.storage_key.unwrap())
        .await
        .unwrap();
    assert_eq!(output.return_code, 7);
    assert_eq!(output.action_keys.len(), 3);

    let page = harness.store.get_action(&output.action_keys[2]).await.unwrap();
    assert_eq!(page.combined_output, "page handled: threshold exited with 7");

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_checks_run_concurrently() {
    // Both runs must be inside the algorithm at the same time to pass the barrier
    let algorithmer = StubAlgorithmer {
        barrier: Some(Arc::new(Barrier::new(2))),
        ..StubAlgorithmer::returning(0)
    };
    let harness = create_harness(
        Arc::new(algorithmer),
        Arc::new(StaticConnector),
        prom("http://localhost:9090"),
    );

    let scheduler = Scheduler::start(
        vec![create_test_check("a", &[]), create_test_check("b", &[])],
        harness.executor.clone(),
    );
    let mut events = scheduler.subscribe();

    let mut finished = vec![next_event(&mut events).await, next_event(&mut events).await];
    finished.sort_by(|x, y| x.check_name.cmp(&y.check_name));

    assert_eq!(finished[0].check_name, "a");
    assert_eq!(finished[1].check_name, "b");
    assert!(finished.iter().all(|e| e.status == CheckStatus::Successful));

    // Each partition holds only its own check's run
    for name in ["a", "b"] {
        let history = harness.store.get_named_check(name, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history.iter().all(|o| o.name == name));
    }

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_interval_runs_never_overlap() {
    // Each run outlasts the interval, so ticks are missed and must not pile up
    let algorithmer = Arc::new(StubAlgorithmer {
        delay: Some(Duration::from_millis(150)),
        ..StubAlgorithmer::returning(0)
    });
    let harness = create_harness(
        algorithmer.clone(),
        Arc::new(StaticConnector),
        prom("http://localhost:9090"),
    );

    let mut check = create_test_check("busy", &[]);
    check.interval = Duration::from_millis(100);
    check.immediate = false;

    let scheduler = Scheduler::start(vec![check], harness.executor.clone());
    sleep(Duration::from_millis(1200)).await;
    scheduler.shutdown().await;

    let runs = algorithmer.runs();
    assert!(runs >= 3, "only {runs} runs in 1.2s");
    assert!(runs <= 9, "{runs} runs of 150ms each in 1.2s");
    assert_eq!(algorithmer.max_in_flight(), 1);
    assert_eq!(harness.metrics.snapshot("busy").processed, runs as u64);
}

#[tokio::test]
async fn test_first_tick_follows_immediate_run_by_an_interval() {
    let harness = create_harness(
        Arc::new(StubAlgorithmer::returning(0)),
        Arc::new(StaticConnector),
        prom("http://localhost:9090"),
    );

    let mut check = create_test_check("ticking", &[]);
    check.interval = Duration::from_millis(300);

    let scheduler = Scheduler::start(vec![check], harness.executor.clone());
    let mut events = scheduler.subscribe();

    next_event(&mut events).await;
    let immediate_done = Instant::now();
    next_event(&mut events).await;
    let gap = immediate_done.elapsed();

    // stagger in [0, interval) plus one full interval
    assert!(gap >= Duration::from_millis(290), "ticked after {gap:?}");
    assert!(gap < Duration::from_secs(2), "ticked after {gap:?}");

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_run_now_returns_report() {
    let harness = create_harness(
        Arc::new(StubAlgorithmer::returning(0)),
        Arc::new(StaticConnector),
        prom("http://localhost:9090"),
    );

    let mut check = create_test_check("on-demand", &[]);
    check.immediate = false;

    let scheduler = Scheduler::start(vec![check], harness.executor.clone());

    let report = scheduler
        .handle("on-demand")
        .unwrap()
        .run_now()
        .await
        .unwrap();

    assert_eq!(report.status(), CheckStatus::Successful);
    assert!(report.storage_key.is_some());
    assert_eq!(harness.metrics.snapshot("on-demand").processed, 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_run() {
    let algorithmer = StubAlgorithmer {
        block_until_cancelled: true,
        ..StubAlgorithmer::returning(0)
    };
    let harness = create_harness(
        Arc::new(algorithmer),
        Arc::new(StaticConnector),
        prom("http://localhost:9090"),
    );

    let scheduler = Scheduler::start(
        vec![create_test_check("stuck", &["restart"])],
        harness.executor.clone(),
    );
    let mut events = scheduler.subscribe();

    // Wait until the run is registered as in flight
    let registry = harness.executor.cancellations().clone();
    timeout(Duration::from_secs(5), async {
        while registry.active().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("run never started");

    timeout(Duration::from_secs(5), scheduler.shutdown())
        .await
        .expect("shutdown did not complete");

    let event = next_event(&mut events).await;
    assert_eq!(event.status, CheckStatus::Failed);
    assert_eq!(event.error.as_deref(), Some("run cancelled"));

    // Cancelled runs skip their actions
    assert!(harness.actioner.calls.lock().unwrap().is_empty());
    assert!(registry.active().is_empty());
}
