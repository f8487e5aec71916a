//! Prometheus metrics helpers.
//!
//! Centralized recorder initialization and metric descriptions. The
//! `/metrics` endpoint runs on its own port, separate from the API server.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// Must be called once at startup before any metrics are recorded.
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_common_metrics();

    handle
}

/// Like [`init_metrics`] but returns `None` if a recorder is already
/// installed. Useful for tests.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Serve the `/metrics` endpoint on the given port.
///
/// Spawns a background task and returns immediately.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server exited");
        }
    });

    Ok(())
}

/// Register descriptions for the bridge's metrics.
fn register_common_metrics() {
    describe_counter!(
        "feed_fetches_total",
        "Scheduled feed fetch attempts (label: result)"
    );
    describe_counter!(
        "batch_runs_total",
        "Scheduled batch executions (label: kind)"
    );
    describe_counter!(
        "items_published_total",
        "Feed items turned into published notes"
    );
    describe_counter!(
        "publish_deliveries_total",
        "Successful per-destination event deliveries"
    );
    describe_counter!(
        "publish_failures_total",
        "Failed per-destination event deliveries"
    );
    describe_gauge!("feeds_total", "Registered feeds at the last batch run");
    describe_gauge!("jobs_tracked", "Jobs currently in the add-job table");
}
