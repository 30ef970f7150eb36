//! Network-facing Read/Write API and cache-service endpoint
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Shared state** holds the storage backend and the cache
//! - Labels leave the process narrowed to strings ([`crate::models::WireMetric`])
//!
//! ## Endpoints
//!
//! - `GET  /api/v1/health` - Liveness plus storage health
//! - `GET  /api/v1/stats` - Storage statistics
//! - `POST /api/v1/metrics` - Ingest a batch (202 / 207 / 500)
//! - `GET  /api/v1/metrics/{source}/{name}?limit=N` - Raw points, newest first
//! - `GET  /api/v1/metrics/{source}/{name}/latest` - Most recent raw point
//! - `GET  /api/v1/aggregates/{source}/{name}?limit=N` - Hourly summaries
//! - `GET  /api/v1/cache/{source}/{name}` - Cache lookup

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiConfig;

/// Router with every endpoint, without CORS
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route("/api/v1/metrics", post(routes::metrics::ingest_metrics))
        .route(
            "/api/v1/metrics/:source/:name",
            get(routes::metrics::get_metrics),
        )
        .route(
            "/api/v1/metrics/:source/:name/latest",
            get(routes::metrics::get_latest_metric),
        )
        .route(
            "/api/v1/aggregates/:source/:name",
            get(routes::aggregates::get_aggregates),
        )
        .route("/api/v1/cache/:source/:name", get(routes::cache::get_cached))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// Binds before returning, so startup errors surface to the caller. The
/// server shuts down gracefully once `cancel` fires.
pub async fn spawn_api_server(
    config: &ApiConfig,
    state: ApiState,
    cancel: CancellationToken,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    info!("starting API server on {}", config.bind_addr);

    let mut app = router(state);

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    let task = tokio::spawn(async move {
        let shutdown = async move { cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok((addr, task))
}
