//! API shared state

use std::sync::Arc;

use crate::metrics::CheckMetrics;
use crate::storage::HistoryStore;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// History store, read-only from the API's side
    pub store: Arc<dyn HistoryStore>,

    /// Run counters exposed on `/metrics`
    pub metrics: Arc<CheckMetrics>,
}

impl ApiState {
    pub fn new(store: Arc<dyn HistoryStore>, metrics: Arc<CheckMetrics>) -> Self {
        Self { store, metrics }
    }
}
