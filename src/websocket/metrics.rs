use axum::extract::State;
use std::sync::Arc;

use crate::metrics::MetricsSnapshot;
use crate::server::LexiclashServer;

/// Metrics endpoint: the full `ServerMetrics` snapshot as JSON.
pub async fn metrics_handler(
    State(server): State<Arc<LexiclashServer>>,
) -> axum::response::Json<MetricsSnapshot> {
    axum::response::Json(server.metrics.snapshot().await)
}

/// Prometheus text-format (v0.0.4) rendering of the same snapshot.
pub async fn prometheus_metrics_handler(
    State(server): State<Arc<LexiclashServer>>,
) -> axum::response::Response {
    use axum::http::header::{HeaderValue, CONTENT_TYPE};
    use axum::response::IntoResponse;

    let snapshot = server.metrics.snapshot().await;
    let body = render_prometheus_metrics(&snapshot);
    let headers = [(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    )];

    (headers, body).into_response()
}

/// Flattens a `MetricsSnapshot` into Prometheus exposition format. Gauges
/// only; none of these counters reset between scrapes, so Prometheus'
/// `rate()` does the work a resettable counter would otherwise need to.
fn render_prometheus_metrics(snapshot: &MetricsSnapshot) -> String {
    let mut lines = Vec::new();

    let mut counter = |name: &str, help: &str, value: u64| {
        lines.push(format!("# HELP {name} {help}"));
        lines.push(format!("# TYPE {name} counter"));
        lines.push(format!("{name} {value}"));
    };

    counter(
        "lexiclash_connections_active",
        "currently open websocket connections",
        snapshot.connections.active_connections,
    );
    counter(
        "lexiclash_connections_total",
        "total websocket connections accepted",
        snapshot.connections.total_connections,
    );
    counter(
        "lexiclash_rooms_created_total",
        "rooms created",
        snapshot.rooms.rooms_created,
    );
    counter(
        "lexiclash_rooms_deleted_total",
        "rooms deleted",
        snapshot.rooms.rooms_deleted,
    );
    counter(
        "lexiclash_words_submitted_total",
        "words submitted across all rooms",
        snapshot.words.words_submitted,
    );
    counter(
        "lexiclash_words_accepted_total",
        "words accepted across all rooms",
        snapshot.words.words_accepted,
    );
    counter(
        "lexiclash_host_transfers_total",
        "host authority transfers after grace expiry",
        snapshot.reconnection.host_transfers,
    );
    counter(
        "lexiclash_persistence_degraded_events_total",
        "persistence mirror circuit-breaker trips",
        snapshot.persistence.degraded_events,
    );
    counter(
        "lexiclash_rate_limit_rejections_total",
        "requests rejected by the per-connection rate limiter",
        snapshot.rate_limiting.rate_limit_rejections,
    );
    counter(
        "lexiclash_errors_total",
        "internal and websocket errors",
        snapshot.errors.total_errors,
    );

    lines.push(String::new());
    lines.join("\n")
}
