pub mod routes;
pub mod state;

use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

pub use state::{AdminState, ModelSummary, SharedState, TarpitMetrics};

/// Build the admin API router.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/metrics", get(routes::metrics::get_metrics))
        .route("/api/stats", get(routes::stats::get_stats))
        .route("/api/config", get(routes::config::get_config))
        .route("/api/sessions", get(routes::sessions::list_sessions))
        .route("/api/sessions/{ip}", get(routes::sessions::get_session))
        .with_state(state)
        .layer(cors)
}

/// Serve the admin API until `shutdown` is cancelled.
pub async fn run_admin_server(
    state: SharedState,
    listen_addr: &str,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "admin API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
