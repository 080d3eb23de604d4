use axum::extract::State;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::server::LexiclashServer;

use super::handler::websocket_handler;
use super::metrics::{metrics_handler, prometheus_metrics_handler};

/// Builds the Axum router: the WebSocket endpoint plus health/metrics.
pub fn create_router() -> axum::Router<Arc<LexiclashServer>> {
    use tower_http::trace::TraceLayer;

    axum::Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/metrics/prom", get(prometheus_metrics_handler))
        .layer(TraceLayer::new_for_http())
}

async fn health_check(
    State(server): State<Arc<LexiclashServer>>,
) -> axum::response::Result<&'static str> {
    if server.persistence.is_degraded().await {
        Err(axum::http::StatusCode::SERVICE_UNAVAILABLE.into())
    } else {
        Ok("OK")
    }
}

/// Builds and runs the server: starts the room sweeper/presence sampler (via
/// `LexiclashServer::new`) and serves the router until the process is killed.
pub async fn run_server(addr: SocketAddr, config: Config) -> anyhow::Result<()> {
    let server = LexiclashServer::new(config).await?;
    let app = create_router().with_state(server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "starting LexiClash server");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
