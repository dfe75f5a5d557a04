//! Prometheus exposition endpoint

use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};

use crate::api::{error::ApiResult, state::ApiState};

/// GET /metrics
pub async fn render_metrics(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    let body = state.metrics.render()?;
    let content_type = TextEncoder::new().format_type().to_string();

    Ok(([(header::CONTENT_TYPE, content_type)], body))
}
