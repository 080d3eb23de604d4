// WebSocket transport: the axum upgrade handler, the per-connection read/write
// loop, and the small set of HTTP routes (health, metrics) that sit next to
// the `/ws` endpoint.
//
// - handler: WebSocket upgrade handler (entry point)
// - connection: per-connection read/write loop, wired to `LexiclashServer::dispatch`
// - sending: JSON frame serialization
// - routes: HTTP route setup (health, metrics)
// - metrics: metrics endpoints

mod connection;
mod handler;
mod metrics;
mod routes;
mod sending;

pub use handler::websocket_handler;
pub use metrics::{metrics_handler, prometheus_metrics_handler};
pub use routes::{create_router, run_server};
