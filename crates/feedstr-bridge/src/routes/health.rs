//! Liveness check.

/// Plain-text health check.
pub async fn health_check() -> &'static str {
    "ok"
}
