//! Read-only HTTP API over the history store
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware (trace, CORS)
//! - **HistoryStore** trait object for all reads; the API never writes
//! - **Graceful shutdown** bounded by a grace period
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/checks` - Latest output of every check
//! - `GET /api/v1/checks/{name}?limit=N` - Recent outputs of a check
//! - `GET /api/v1/checks/{name}/failures?limit=N` - Recent failed outputs
//! - `GET /api/v1/checks/{name}/actions/{key}` - One action output
//! - `GET /metrics` - Run counters in Prometheus text format

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{HealthResponse, HistoryQuery};

use std::net::SocketAddr;
use std::time::Duration;

use axum::{Router, routing::get};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "127.0.0.1:9967")
    pub bind_addr: SocketAddr,

    /// Enable CORS for dashboards on other origins
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: crate::util::get_api_addr(),
            enable_cors: true,
        }
    }
}

/// Build the router with all routes
pub fn router(state: ApiState, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/checks", get(routes::checks::list_checks))
        .route("/api/v1/checks/:name", get(routes::checks::get_check_history))
        .route(
            "/api/v1/checks/:name/failures",
            get(routes::checks::get_check_failures),
        )
        .route(
            "/api/v1/checks/:name/actions/:key",
            get(routes::checks::get_action),
        )
        .route("/metrics", get(routes::metrics::render_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// A running API server
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl ApiServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and let open ones drain for up to `grace`
    pub async fn stop(self, grace: Duration) {
        self.shutdown.cancel();

        let abort = self.task.abort_handle();
        if tokio::time::timeout(grace, self.task).await.is_err() {
            warn!("API server did not drain within {grace:?}, aborting");
            abort.abort();
        }
    }
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<ApiServer> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state, config.enable_cors);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
        {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(ApiServer {
        addr,
        shutdown,
        task,
    })
}
