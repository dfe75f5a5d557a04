//! Check history endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::trace;

use crate::{
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::{HistoryQuery, MAX_HISTORY_LIMIT},
    },
    check::{ActionOutput, CheckOutput},
};

/// GET /api/v1/checks
///
/// Latest output of every check that has one
pub async fn list_checks(State(state): State<ApiState>) -> ApiResult<Json<Vec<CheckOutput>>> {
    let statuses = state.store.get_checks_status().await?;
    Ok(Json(statuses))
}

/// GET /api/v1/checks/:name
///
/// Most recent outputs of one check, newest first
pub async fn get_check_history(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<CheckOutput>>> {
    let limit = limit(&query)?;
    trace!("history of {name}, limit {limit}");

    let outputs = state.store.get_named_check(&name, limit).await?;
    Ok(Json(outputs))
}

/// GET /api/v1/checks/:name/failures
///
/// Most recent FAILED outputs of one check, newest first
pub async fn get_check_failures(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<CheckOutput>>> {
    let limit = limit(&query)?;

    let outputs = state.store.get_named_check_failures(&name, limit).await?;
    Ok(Json(outputs))
}

/// GET /api/v1/checks/:name/actions/:key
///
/// Only actions stored by `name` are served.
pub async fn get_action(
    State(state): State<ApiState>,
    Path((name, key)): Path<(String, String)>,
) -> ApiResult<Json<ActionOutput>> {
    let output = state.store.get_check_action(&name, &key).await?;
    Ok(Json(output))
}

fn limit(query: &HistoryQuery) -> ApiResult<usize> {
    query.effective_limit().ok_or_else(|| {
        ApiError::InvalidRequest(format!("limit must be between 1 and {MAX_HISTORY_LIMIT}"))
    })
}
