//! API request and response types

use serde::{Deserialize, Serialize};

/// Number of outputs returned when no `limit` is given
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Largest accepted `limit`
pub const MAX_HISTORY_LIMIT: usize = 1000;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Query parameters of the history endpoints
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Max results (default: 5, capped at 1000)
    pub limit: Option<usize>,
}

impl HistoryQuery {
    /// Effective limit, `None` if the requested one is unusable
    pub fn effective_limit(&self) -> Option<usize> {
        match self.limit {
            None => Some(DEFAULT_HISTORY_LIMIT),
            Some(0) => None,
            Some(limit) => Some(limit.min(MAX_HISTORY_LIMIT)),
        }
    }
}
