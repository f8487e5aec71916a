//! HTTP API route definitions.
//!
//! # Route Structure
//!
//! - `GET /health` - liveness check
//! - `GET /feeds` - registered feeds with their identities and health
//! - `POST /add-async` - submit an add-feed job, returns a job id
//! - `GET /add-status/{id}` - poll an add-feed job
//! - `GET /.well-known/nostr.json` - NIP-05 identity lookup

mod feeds;
mod health;
mod jobs;
mod nip05;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the complete API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/feeds", get(feeds::list_feeds))
        .route("/add-async", post(jobs::add_async))
        .route("/add-status/{id}", get(jobs::add_status))
        .route("/.well-known/nostr.json", get(nip05::nostr_json))
        .with_state(state)
}
