//! NIP-05 identity lookup.
//!
//! Maps a registered feed URL (the "name") to its public key and the
//! configured relay set. Empty or wildcard names, and names with no
//! registration, yield empty maps.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Well-known NIP-05 response document.
#[derive(Debug, Default, Serialize)]
pub struct WellKnownResponse {
    pub names: HashMap<String, String>,
    pub relays: HashMap<String, Vec<String>>,
}

/// `GET /.well-known/nostr.json?name=<feed url>`
pub async fn nostr_json(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<WellKnownResponse> {
    let name = params.get("name").map(String::as_str).unwrap_or_default();

    let mut response = WellKnownResponse::default();

    if !name.is_empty() && name != "_" {
        match state.store.get(name) {
            Ok(Some(record)) => {
                response
                    .names
                    .insert(name.to_string(), record.public_key.clone());
                response
                    .relays
                    .insert(record.public_key, state.config.relays.clone());
            }
            Ok(None) => {
                tracing::debug!(name = %name, "nip05 lookup for unknown feed");
            }
            Err(e) => {
                tracing::error!(name = %name, error = %e, "nip05 lookup failed");
            }
        }
    }

    Json(response)
}
