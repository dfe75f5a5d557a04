//! Per-check run counters
//!
//! Three monotonically increasing counters per check: processed, succeeded
//! and failed. They live in a private Prometheus registry; the scheduler
//! only ever increments them and the `/metrics` endpoint encodes the
//! registry in the text exposition format.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters of a single check
#[derive(Debug, Clone)]
pub struct CheckCounters {
    processed: IntCounter,
    succeeded: IntCounter,
    failed: IntCounter,
}

impl CheckCounters {
    pub fn inc_processed(&self) {
        self.processed.inc();
    }

    pub fn inc_succeeded(&self) {
        self.succeeded.inc();
    }

    pub fn inc_failed(&self) {
        self.failed.inc();
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            processed: self.processed.get(),
            succeeded: self.succeeded.get(),
            failed: self.failed.get(),
        }
    }
}

/// Point-in-time copy of a check's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Counters of every check, labelled by check name
pub struct CheckMetrics {
    registry: Registry,
    processed: IntCounterVec,
    succeeded: IntCounterVec,
    failed: IntCounterVec,
}

impl CheckMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let processed = IntCounterVec::new(
            Opts::new(
                "algoguard_checks_processed_total",
                "The total number of check runs performed",
            ),
            &["check"],
        )?;
        let succeeded = IntCounterVec::new(
            Opts::new(
                "algoguard_checks_succeeded_total",
                "The total number of check runs that succeeded",
            ),
            &["check"],
        )?;
        let failed = IntCounterVec::new(
            Opts::new(
                "algoguard_checks_failed_total",
                "The total number of check runs that failed",
            ),
            &["check"],
        )?;

        registry.register(Box::new(processed.clone()))?;
        registry.register(Box::new(succeeded.clone()))?;
        registry.register(Box::new(failed.clone()))?;

        Ok(Self {
            registry,
            processed,
            succeeded,
            failed,
        })
    }

    /// Counters for `check`, creating its series at zero if needed
    pub fn counters(&self, check: &str) -> CheckCounters {
        CheckCounters {
            processed: self.processed.with_label_values(&[check]),
            succeeded: self.succeeded.with_label_values(&[check]),
            failed: self.failed.with_label_values(&[check]),
        }
    }

    pub fn snapshot(&self, check: &str) -> CounterSnapshot {
        self.counters(check).snapshot()
    }

    /// Encode every series in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for CheckMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckMetrics").finish_non_exhaustive()
    }
}
